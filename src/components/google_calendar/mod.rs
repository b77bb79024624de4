pub mod auth;
pub mod client;
pub mod models;
pub mod report;
pub mod scopes;
pub mod secrets;
pub mod time;
pub mod token;

pub use auth::{flow_for, AuthorizationFlow, DeviceCodeFlow, LocalServerFlow};
pub use client::CalendarClient;
pub use models::{CreatedEvent, EventInstance, EventTemplate, ListedEvent, UpcomingEvents};
pub use scopes::Capability;
pub use token::{Credential, TokenManager, TokenStore};

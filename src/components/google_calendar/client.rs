use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::{error, info};
use url::Url;

use super::auth::AuthorizationFlow;
use super::models::{CreatedEvent, EventInstance, EventsPage, ListedEvent, UpcomingEvents};
use super::scopes::Capability;
use super::token::{Credential, TokenManager};
use crate::config::Config;
use crate::error::{google_calendar_error, CalResult, Error, FailureMode};

/// Upper bound on listed events
pub const MAX_RESULTS: usize = 10;
/// The only calendar this client addresses
pub const PRIMARY_CALENDAR: &str = "primary";

/// Google's error envelope, `{"error": {"code": .., "message": ..}}`
#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Client for the primary calendar of the authorized user
pub struct CalendarClient {
    client: Client,
    api_base: String,
    capability: Capability,
    credential: Credential,
    token_manager: TokenManager,
}

impl CalendarClient {
    /// Acquire a credential for the configured capability and build the client
    pub async fn connect(config: &Config, flow: &dyn AuthorizationFlow) -> CalResult<Self> {
        let token_manager = TokenManager::new(
            config.token_path.clone(),
            config.credentials_path.clone(),
            config.capability.scopes(),
        );
        let credential = token_manager.acquire(flow).await?;

        Ok(Self::new(
            token_manager,
            credential,
            config.capability,
            &config.api_base,
        ))
    }

    /// Build a client around an already acquired credential
    pub fn new(
        token_manager: TokenManager,
        credential: Credential,
        capability: Capability,
        api_base: &str,
    ) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            capability,
            credential,
            token_manager,
        }
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// List upcoming events. A failed list call is logged and returned as
    /// `UpcomingEvents::Failed`; refresh and token file errors still propagate.
    pub async fn list_upcoming_events(&mut self) -> CalResult<UpcomingEvents> {
        self.list_events(FailureMode::Soft).await
    }

    /// List upcoming events with an explicit failure mode.
    ///
    /// The mode covers the remote call only. Credential refresh always fails hard.
    pub async fn list_events(&mut self, mode: FailureMode) -> CalResult<UpcomingEvents> {
        let access_token = self.bearer_token().await?;

        match self.fetch_upcoming(&access_token, Utc::now()).await {
            Ok(events) => Ok(UpcomingEvents::from_events(events)),
            Err(e) if mode == FailureMode::Soft => {
                error!("Failed to list upcoming events: {}", e);
                Ok(UpcomingEvents::Failed(e))
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_upcoming(
        &self,
        access_token: &str,
        now: DateTime<Utc>,
    ) -> CalResult<Vec<ListedEvent>> {
        let mut url = self.events_url()?;
        url.query_pairs_mut()
            .append_pair("timeMin", &now.to_rfc3339_opts(SecondsFormat::Micros, true))
            .append_pair("maxResults", &MAX_RESULTS.to_string())
            .append_pair("singleEvents", "true")
            .append_pair("orderBy", "startTime");

        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to fetch events: {}", e)))?;
        let response = check_status(response).await?;

        let page: EventsPage = response
            .json()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to parse events response: {}", e)))?;

        page.items
            .into_iter()
            .take(MAX_RESULTS)
            .map(ListedEvent::try_from)
            .collect()
    }

    /// Create an event on the primary calendar
    pub async fn create_event(&mut self, event: &EventInstance) -> CalResult<CreatedEvent> {
        if !self.capability.can_write() {
            return Err(Error::PermissionDenied(
                "creating events requires write access to the calendar".to_string(),
            ));
        }
        event.validate()?;

        let access_token = self.bearer_token().await?;
        let payload = event.payload();

        let response = self
            .client
            .post(self.events_url()?)
            .bearer_auth(access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to create event: {}", e)))?;
        let response = check_status(response).await?;

        let created: CreatedEvent = response
            .json()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to parse created event: {}", e)))?;

        info!("Created event {} ({})", created.id, payload.summary);
        Ok(created)
    }

    /// Access token for the next call, refreshing the credential if it expired
    async fn bearer_token(&mut self) -> CalResult<String> {
        self.token_manager.ensure_fresh(&mut self.credential).await?;
        Ok(self.credential.access_token()?.to_string())
    }

    fn events_url(&self) -> CalResult<Url> {
        let url_str = format!(
            "{}/calendars/{}/events",
            self.api_base, PRIMARY_CALENDAR
        );
        Url::parse(&url_str)
            .map_err(|e| google_calendar_error(&format!("Failed to parse URL: {}", e)))
    }
}

/// Turn non-2xx replies into `Error::Api`
async fn check_status(response: Response) -> CalResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Could not read error response".to_string());
    let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
        .map(|envelope| envelope.error.message)
        .unwrap_or(body);

    Err(Error::Api {
        status: status.as_u16(),
        message,
    })
}

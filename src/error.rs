use miette::Diagnostic;
use thiserror::Error;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Environment error: {0}")]
    #[diagnostic(code(gcal_sender::environment))]
    Environment(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(gcal_sender::config))]
    Config(String),

    #[error("Authorization error: {0}")]
    #[diagnostic(
        code(gcal_sender::auth),
        help("Delete the token file and run get_calendar_token to authorize again")
    )]
    Auth(String),

    #[error("Authorization timed out after {0} seconds")]
    #[diagnostic(code(gcal_sender::auth_timeout))]
    AuthTimeout(u64),

    #[error("Authorization cancelled")]
    #[diagnostic(code(gcal_sender::cancelled))]
    Cancelled,

    #[error("Permission denied: {0}")]
    #[diagnostic(
        code(gcal_sender::permission),
        help("Set CALENDAR_ACCESS=write and authorize again to create events")
    )]
    PermissionDenied(String),

    #[error("Invalid time range: end {end} is not after start {start}")]
    #[diagnostic(code(gcal_sender::time_range))]
    InvalidTimeRange { start: String, end: String },

    #[error("Google Calendar rejected the request: HTTP {status} - {message}")]
    #[diagnostic(code(gcal_sender::api))]
    Api { status: u16, message: String },

    #[error("Google Calendar API error: {0}")]
    #[diagnostic(code(gcal_sender::google_calendar))]
    GoogleCalendar(String),

    #[error(transparent)]
    #[diagnostic(code(gcal_sender::io))]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    #[diagnostic(code(gcal_sender::http))]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(gcal_sender::serialization))]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type CalResult<T> = Result<T, Error>;

/// How a failing operation reports its error.
///
/// Listing upcoming events is `Soft`: the failure is logged and recorded in the
/// returned value and the run goes on. Every other operation is `Hard` and
/// propagates to the process boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    Soft,
    Hard,
}

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Invalid value for environment variable: {}", var))
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create authorization errors
pub fn auth_error(message: &str) -> Error {
    Error::Auth(message.to_string())
}

/// Helper to create Google Calendar errors
pub fn google_calendar_error(message: &str) -> Error {
    Error::GoogleCalendar(message.to_string())
}

use crate::components::google_calendar::models::{EventInstance, EventTemplate};
use crate::components::google_calendar::scopes::Capability;
use crate::components::google_calendar::time::{parse_event_time, parse_time_zone};
use crate::error::{config_error, env_error, CalResult};
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Default location of the persisted credential
pub const DEFAULT_TOKEN_PATH: &str = "token.json";
/// Default location of the OAuth client registration
pub const DEFAULT_CREDENTIALS_PATH: &str = "credentials.json";
/// Default location of the template and booking file
pub const DEFAULT_CALENDAR_CONFIG: &str = "config/calendar.toml";
/// Default time zone for created events
pub const DEFAULT_TIMEZONE: &str = "Europe/Berlin";
/// Default Google Calendar REST endpoint
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
/// Default bound on interactive authorization, in seconds
pub const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 300;

/// Which interactive flow obtains a fresh credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFlowKind {
    /// Browser consent with a loopback callback listener
    LocalServer,
    /// Device authorization grant for machines without a browser
    DeviceCode,
}

impl AuthFlowKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" | "browser" => Some(Self::LocalServer),
            "device" => Some(Self::DeviceCode),
            _ => None,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone)]
pub struct Config {
    /// Persisted credential file
    pub token_path: PathBuf,
    /// OAuth client registration file
    pub credentials_path: PathBuf,
    /// Read-only or read-write calendar access
    pub capability: Capability,
    /// Flow used when no usable credential exists
    pub auth_flow: AuthFlowKind,
    /// Bound on the interactive flow
    pub auth_timeout: Duration,
    /// Time zone attached to created events unless a booking overrides it
    pub timezone: String,
    /// Base URL of the calendar REST API
    pub api_base: String,
    /// Reusable event content
    pub templates: Vec<EventTemplate>,
    /// Event to create on this run, if any
    pub booking: Option<Booking>,
}

/// One event to book, as written in the calendar file
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Booking {
    /// Name of the template to instantiate
    pub template: String,
    #[serde(default)]
    pub attendees: Vec<String>,
    /// Local start time, `YYYY-MM-DDTHH:MM:SS`
    pub start: String,
    /// Local end time, `YYYY-MM-DDTHH:MM:SS`
    pub end: String,
    pub time_zone: Option<String>,
}

/// Layout of the calendar TOML file
#[derive(Debug, Default, Deserialize)]
struct CalendarFile {
    #[serde(default)]
    templates: Vec<EventTemplate>,
    booking: Option<Booking>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token_path: PathBuf::from(DEFAULT_TOKEN_PATH),
            credentials_path: PathBuf::from(DEFAULT_CREDENTIALS_PATH),
            capability: Capability::ReadWrite,
            auth_flow: AuthFlowKind::LocalServer,
            auth_timeout: Duration::from_secs(DEFAULT_AUTH_TIMEOUT_SECS),
            timezone: DEFAULT_TIMEZONE.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            templates: Vec::new(),
            booking: None,
        }
    }
}

impl Config {
    /// Load configuration from environment and the calendar file
    pub fn load() -> CalResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let mut config = Config::default();

        if let Ok(path) = env::var("GOOGLE_TOKEN_PATH") {
            config.token_path = PathBuf::from(path);
        }
        if let Ok(path) = env::var("GOOGLE_CREDENTIALS_PATH") {
            config.credentials_path = PathBuf::from(path);
        }
        if let Ok(access) = env::var("CALENDAR_ACCESS") {
            config.capability =
                Capability::parse(&access).ok_or_else(|| env_error("CALENDAR_ACCESS"))?;
        }
        if let Ok(flow) = env::var("GOOGLE_AUTH_FLOW") {
            config.auth_flow =
                AuthFlowKind::parse(&flow).ok_or_else(|| env_error("GOOGLE_AUTH_FLOW"))?;
        }
        if let Ok(secs) = env::var("AUTH_TIMEOUT_SECS") {
            let secs = secs
                .parse::<u64>()
                .map_err(|_| env_error("AUTH_TIMEOUT_SECS"))?;
            config.auth_timeout = Duration::from_secs(secs);
        }
        if let Ok(timezone) = env::var("TIMEZONE") {
            config.timezone = timezone;
        }
        if let Ok(api_base) = env::var("GOOGLE_CALENDAR_API_BASE") {
            config.api_base = api_base;
        }
        parse_time_zone(&config.timezone)?;

        let calendar_path = env::var("CALENDAR_CONFIG")
            .unwrap_or_else(|_| String::from(DEFAULT_CALENDAR_CONFIG));
        config.load_calendar_file(Path::new(&calendar_path))?;

        info!(
            "Configuration loaded: access={}, flow={:?}, templates={}",
            config.capability,
            config.auth_flow,
            config.templates.len()
        );

        Ok(config)
    }

    /// Merge templates and booking from a TOML file. A missing file is not an error.
    pub fn load_calendar_file(&mut self, path: &Path) -> CalResult<()> {
        if !path.exists() {
            debug!("No calendar file at {}", path.display());
            return Ok(());
        }

        let content = fs::read_to_string(path)?;
        self.apply_calendar_toml(&content)
    }

    /// Parse the calendar file contents and validate the booking against the templates
    pub fn apply_calendar_toml(&mut self, content: &str) -> CalResult<()> {
        let file: CalendarFile = toml::from_str(content)
            .map_err(|e| config_error(&format!("Malformed calendar file: {}", e)))?;
        self.templates = file.templates;
        self.booking = file.booking;

        // Fail on a bad booking now rather than after authorization
        if self.booking.is_some() {
            self.booking_instance()?;
        }

        Ok(())
    }

    /// Find a template by name
    pub fn template(&self, name: &str) -> Option<&EventTemplate> {
        self.templates.iter().find(|t| t.name == name)
    }

    /// Build the event instance described by the configured booking
    pub fn booking_instance(&self) -> CalResult<Option<EventInstance>> {
        let Some(booking) = &self.booking else {
            return Ok(None);
        };

        let template = self.template(&booking.template).ok_or_else(|| {
            config_error(&format!("Booking refers to unknown template '{}'", booking.template))
        })?;

        let start = parse_event_time(&booking.start)?;
        let end = parse_event_time(&booking.end)?;
        let time_zone = booking.time_zone.as_deref().unwrap_or(&self.timezone);
        parse_time_zone(time_zone)?;

        let instance = EventInstance::new(template.clone(), start, end)
            .with_attendees(booking.attendees.clone())
            .with_time_zone(time_zone);
        instance.validate()?;

        Ok(Some(instance))
    }
}

use crate::config::DEFAULT_TIMEZONE;
use crate::error::{google_calendar_error, CalResult, Error};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::time::{format_event_time, parse_event_start, parse_time_zone};

/// Minutes before the event for the e-mail reminder
pub const EMAIL_REMINDER_MINUTES: u32 = 24 * 60;
/// Minutes before the event for the popup reminder
pub const POPUP_REMINDER_MINUTES: u32 = 10;

/// Reusable event content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTemplate {
    /// Key used to pick the template from configuration
    pub name: String,
    pub summary: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
}

/// A concrete event to create from a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventInstance {
    pub template: EventTemplate,
    pub attendees: Vec<String>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// IANA zone the local start/end are expressed in
    pub time_zone: String,
}

impl EventInstance {
    pub fn new(template: EventTemplate, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            template,
            attendees: Vec::new(),
            start,
            end,
            time_zone: DEFAULT_TIMEZONE.to_string(),
        }
    }

    pub fn with_attendees(mut self, attendees: Vec<String>) -> Self {
        self.attendees = attendees;
        self
    }

    pub fn with_time_zone(mut self, time_zone: &str) -> Self {
        self.time_zone = time_zone.to_string();
        self
    }

    /// Reject ranges where the end is not strictly after the start, and unknown zones
    pub fn validate(&self) -> CalResult<()> {
        if self.end <= self.start {
            return Err(Error::InvalidTimeRange {
                start: format_event_time(&self.start),
                end: format_event_time(&self.end),
            });
        }
        parse_time_zone(&self.time_zone)?;
        Ok(())
    }

    /// Compose the request body for an event insert
    pub fn payload(&self) -> EventPayload {
        EventPayload {
            summary: self.template.summary.clone(),
            location: self.template.location.clone(),
            description: self.template.description.clone(),
            start: EventDateTime {
                date_time: format_event_time(&self.start),
                time_zone: self.time_zone.clone(),
            },
            end: EventDateTime {
                date_time: format_event_time(&self.end),
                time_zone: self.time_zone.clone(),
            },
            attendees: self
                .attendees
                .iter()
                .map(|email| Attendee {
                    email: email.clone(),
                })
                .collect(),
            reminders: Reminders::fixed(),
        }
    }
}

/// Request body for `events.insert`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub summary: String,
    pub location: String,
    pub description: String,
    pub start: EventDateTime,
    pub end: EventDateTime,
    pub attendees: Vec<Attendee>,
    pub reminders: Reminders,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    pub date_time: String,
    pub time_zone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attendee {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminders {
    pub use_default: bool,
    pub overrides: Vec<ReminderOverride>,
}

impl Reminders {
    /// One e-mail a day before, one popup ten minutes before, calendar defaults off
    pub fn fixed() -> Self {
        Self {
            use_default: false,
            overrides: vec![
                ReminderOverride {
                    method: ReminderMethod::Email,
                    minutes: EMAIL_REMINDER_MINUTES,
                },
                ReminderOverride {
                    method: ReminderMethod::Popup,
                    minutes: POPUP_REMINDER_MINUTES,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderOverride {
    pub method: ReminderMethod,
    pub minutes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderMethod {
    Email,
    Popup,
}

/// `start`/`end` object as returned by the API
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEventTime {
    pub date_time: Option<String>,
    pub date: Option<String>,
    pub time_zone: Option<String>,
}

/// Event resource as returned by the API, reduced to the fields we read
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEvent {
    pub id: Option<String>,
    pub summary: Option<String>,
    pub start: Option<ApiEventTime>,
    pub html_link: Option<String>,
}

/// Page of `events.list`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsPage {
    #[serde(default)]
    pub items: Vec<ApiEvent>,
}

/// Start of a listed event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventStart {
    /// Timed event. `raw` is the `dateTime` string exactly as the API sent it.
    DateTime {
        at: DateTime<FixedOffset>,
        raw: String,
    },
    /// All-day event
    Date(NaiveDate),
}

impl fmt::Display for EventStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DateTime { raw, .. } => f.write_str(raw),
            Self::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

/// Read-only view of an upcoming event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedEvent {
    pub start: EventStart,
    pub summary: Option<String>,
}

impl TryFrom<ApiEvent> for ListedEvent {
    type Error = Error;

    fn try_from(event: ApiEvent) -> CalResult<Self> {
        let start = event
            .start
            .as_ref()
            .map(parse_event_start)
            .transpose()?
            .flatten()
            .ok_or_else(|| {
                google_calendar_error(&format!(
                    "Event {} has no start time",
                    event.id.as_deref().unwrap_or("<unknown>")
                ))
            })?;

        Ok(Self {
            start,
            summary: event.summary,
        })
    }
}

/// Result of listing upcoming events
#[derive(Debug)]
pub enum UpcomingEvents {
    Found(Vec<ListedEvent>),
    /// The calendar has nothing coming up
    NoEvents,
    /// The call failed; the error was logged and recorded here instead of propagated
    Failed(Error),
}

impl UpcomingEvents {
    pub fn from_events(events: Vec<ListedEvent>) -> Self {
        if events.is_empty() {
            Self::NoEvents
        } else {
            Self::Found(events)
        }
    }

    /// Events found, empty for `NoEvents` and `Failed`
    pub fn events(&self) -> &[ListedEvent] {
        match self {
            Self::Found(events) => events,
            _ => &[],
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Event record returned by `events.insert`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedEvent {
    #[serde(default)]
    pub id: String,
    pub html_link: Option<String>,
    pub status: Option<String>,
}

use crate::error::{config_error, google_calendar_error, CalResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use chrono_tz::Tz;

use super::models::{ApiEventTime, EventStart};

/// Wall-clock format sent to the API. The zone travels separately as `timeZone`.
pub const EVENT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Format a local event time without any UTC offset
pub fn format_event_time(time: &NaiveDateTime) -> String {
    time.format(EVENT_TIME_FORMAT).to_string()
}

/// Parse a local event time in `YYYY-MM-DDTHH:MM:SS` form
pub fn parse_event_time(value: &str) -> CalResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, EVENT_TIME_FORMAT)
        .map_err(|e| config_error(&format!("Invalid event time '{}': {}", value, e)))
}

/// Check that a time zone identifier is a known IANA zone
pub fn parse_time_zone(name: &str) -> CalResult<Tz> {
    name.parse::<Tz>()
        .map_err(|_| config_error(&format!("Unknown time zone '{}'", name)))
}

/// Get event start from the API's dateTime/date pair
pub fn parse_event_start(time: &ApiEventTime) -> CalResult<Option<EventStart>> {
    if let Some(date_time) = &time.date_time {
        let at = DateTime::parse_from_rfc3339(date_time)
            .map_err(|e| google_calendar_error(&format!("Failed to parse datetime: {}", e)))?;
        Ok(Some(EventStart::DateTime {
            at,
            raw: date_time.clone(),
        }))
    } else if let Some(date) = &time.date {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| google_calendar_error(&format!("Failed to parse date: {}", e)))?;
        Ok(Some(EventStart::Date(date)))
    } else {
        Ok(None)
    }
}

use std::io::{self, Write};

use super::client::MAX_RESULTS;
use super::models::{CreatedEvent, ListedEvent, UpcomingEvents};

/// Line printed before listing
pub fn write_listing_header(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Getting the upcoming {} events", MAX_RESULTS)
}

/// One line per event: start, then summary
pub fn format_event_line(event: &ListedEvent) -> String {
    let summary = event.summary.as_deref().unwrap_or("(no title)");
    format!("{} {}", event.start, summary)
}

/// Print the result of a listing
pub fn write_upcoming(out: &mut impl Write, upcoming: &UpcomingEvents) -> io::Result<()> {
    match upcoming {
        UpcomingEvents::Found(events) => {
            for event in events {
                writeln!(out, "{}", format_event_line(event))?;
            }
        }
        UpcomingEvents::NoEvents => writeln!(out, "No upcoming events found.")?,
        UpcomingEvents::Failed(e) => writeln!(out, "An error occurred: {}", e)?,
    }
    Ok(())
}

/// Confirmation for a created event
pub fn write_created(out: &mut impl Write, event: &CreatedEvent) -> io::Result<()> {
    match &event.html_link {
        Some(link) => writeln!(out, "Event created: {}", link),
        None => writeln!(out, "Event created: {}", event.id),
    }
}

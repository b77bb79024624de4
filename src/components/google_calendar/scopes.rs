use std::fmt;

/// Full read-write access to the user's calendars
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";
/// Read-only access to the user's calendars
pub const CALENDAR_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";

/// What the client is allowed to do with the primary calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ReadOnly,
    ReadWrite,
}

impl Capability {
    /// Parse `read` / `write` style values from configuration
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "read" | "readonly" | "read-only" => Some(Self::ReadOnly),
            "write" | "readwrite" | "read-write" => Some(Self::ReadWrite),
            _ => None,
        }
    }

    /// OAuth scopes that must be granted for this capability
    pub fn scopes(&self) -> Vec<String> {
        match self {
            Self::ReadOnly => vec![CALENDAR_READONLY_SCOPE.to_string()],
            Self::ReadWrite => vec![CALENDAR_SCOPE.to_string()],
        }
    }

    pub fn can_write(&self) -> bool {
        matches!(self, Self::ReadWrite)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "read"),
            Self::ReadWrite => write!(f, "write"),
        }
    }
}

/// Whether `granted` covers `required`. The full calendar scope implies the read-only one.
pub fn scope_satisfied(granted: &[String], required: &str) -> bool {
    granted.iter().any(|g| {
        g == required || (required == CALENDAR_READONLY_SCOPE && g == CALENDAR_SCOPE)
    })
}

/// Whether every required scope is covered by the granted set
pub fn scopes_satisfied(granted: &[String], required: &[String]) -> bool {
    required.iter().all(|r| scope_satisfied(granted, r))
}

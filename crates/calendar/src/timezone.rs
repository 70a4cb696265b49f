use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Offset, SecondsFormat, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown IANA time zone '{0}'")]
pub struct UnknownTimeZone(pub String);

/// The single process-wide zone used for every calendar payload.
///
/// The UTC offset written into `dateTime` is looked up for each instant, so
/// zones with daylight saving render the offset in force at that moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarTimeZone {
    tz: Tz,
}

impl CalendarTimeZone {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn utc() -> Self {
        Self::new(Tz::UTC)
    }

    /// IANA name sent to the provider.
    pub fn name(&self) -> &'static str {
        self.tz.name()
    }

    pub fn offset_at(&self, instant: DateTime<Utc>) -> FixedOffset {
        instant.with_timezone(&self.tz).offset().fix()
    }

    /// Render `instant` as the provider's `{dateTime, timeZone}` pair.
    pub fn event_time(&self, instant: DateTime<Utc>) -> EventTime {
        EventTime {
            date_time: instant
                .with_timezone(&self.offset_at(instant))
                .to_rfc3339_opts(SecondsFormat::Secs, false),
            time_zone: self.name().to_string(),
        }
    }
}

impl Default for CalendarTimeZone {
    fn default() -> Self {
        Self::new(Tz::Asia__Bangkok)
    }
}

impl FromStr for CalendarTimeZone {
    type Err = UnknownTimeZone;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<Tz>()
            .map(Self::new)
            .map_err(|_| UnknownTimeZone(s.to_string()))
    }
}

/// Start or end of an event as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    pub date_time: String,
    pub time_zone: String,
}

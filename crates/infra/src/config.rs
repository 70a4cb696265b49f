//! Process configuration loaded from environment variables.
//!
//! | Env Var                                  | Default                         |
//! |------------------------------------------|---------------------------------|
//! | `LABDESK_BIND`                           | `0.0.0.0:8080`                  |
//! | `JWT_SECRET`                             | unset (caller picks dev secret) |
//! | `DATABASE_URL`                           | unset: in-memory stores         |
//! | `LABDESK_LOW_STOCK_THRESHOLD`            | `3`                             |
//! | `LABDESK_MAX_RESERVATION_HOURS`          | `4`                             |
//! | `LABDESK_TIME_ZONE`                      | `Asia/Bangkok`                  |
//! | `LABDESK_ROOMS_FILE`                     | unset: `room1`..`room5`         |
//! | `LABDESK_INITIAL_STATUS`                 | `confirmed`                     |
//! | `LABDESK_CATEGORY_ADMINS`                | unset: no category admins       |
//! | `GOOGLE_CALENDAR_CREDENTIALS`            | unset: in-memory calendar       |
//! | `LABDESK_CALENDAR_TIMEOUT_SECS`          | `10`                            |
//! | `LABDESK_CALENDAR_CONNECT_TIMEOUT_SECS`  | `5`                             |
//!
//! `GOOGLE_CALENDAR_CREDENTIALS` holds either the service-account JSON itself
//! or a path to it. `LABDESK_TIME_ZONE` is an IANA name; calendar offsets are
//! derived from it per instant. `LABDESK_CATEGORY_ADMINS` is a comma-separated
//! list of user ids allowed to create and delete categories.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use labdesk_calendar::{CalendarTimeZone, ServiceAccountKey};
use labdesk_core::UserId;
use labdesk_inventory::DEFAULT_LOW_STOCK_THRESHOLD;
use labdesk_reservations::{BookingRules, DEFAULT_MAX_DURATION_HOURS, ReservationStatus, RoomRegistry};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{var}: cannot read {path}: {source}")]
    Io {
        var: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    fn invalid(var: &'static str, value: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub jwt_secret: Option<String>,
    pub database_url: Option<String>,
    pub low_stock_threshold: u32,
    pub booking: BookingRules,
    pub time_zone: CalendarTimeZone,
    pub rooms: RoomRegistry,
    pub category_admins: Vec<UserId>,
    pub calendar_credentials: Option<ServiceAccountKey>,
    pub calendar_timeout: Duration,
    pub calendar_connect_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: None,
            database_url: None,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            booking: BookingRules::default(),
            time_zone: CalendarTimeZone::default(),
            rooms: RoomRegistry::default_rooms(),
            category_admins: Vec::new(),
            calendar_credentials: None,
            calendar_timeout: Duration::from_secs(10),
            calendar_connect_timeout: Duration::from_secs(5),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let bind = match var("LABDESK_BIND") {
            Some(v) => v
                .parse()
                .map_err(|e| ConfigError::invalid("LABDESK_BIND", &v, format!("{e}")))?,
            None => defaults.bind,
        };

        let low_stock_threshold = match var("LABDESK_LOW_STOCK_THRESHOLD") {
            Some(v) => v.parse::<u32>().map_err(|e| {
                ConfigError::invalid("LABDESK_LOW_STOCK_THRESHOLD", &v, format!("{e}"))
            })?,
            None => defaults.low_stock_threshold,
        };

        let max_hours = match var("LABDESK_MAX_RESERVATION_HOURS") {
            Some(v) => {
                let hours = v.parse::<i64>().map_err(|e| {
                    ConfigError::invalid("LABDESK_MAX_RESERVATION_HOURS", &v, format!("{e}"))
                })?;
                if !(1..=24 * 7).contains(&hours) {
                    return Err(ConfigError::invalid(
                        "LABDESK_MAX_RESERVATION_HOURS",
                        &v,
                        "must be between 1 and 168",
                    ));
                }
                hours
            }
            None => DEFAULT_MAX_DURATION_HOURS,
        };

        let initial_status = match var("LABDESK_INITIAL_STATUS") {
            Some(v) => match v.parse::<ReservationStatus>() {
                Ok(s @ (ReservationStatus::Pending | ReservationStatus::Confirmed)) => s,
                _ => {
                    return Err(ConfigError::invalid(
                        "LABDESK_INITIAL_STATUS",
                        &v,
                        "expected pending or confirmed",
                    ));
                }
            },
            None => defaults.booking.initial_status,
        };

        let time_zone = match var("LABDESK_TIME_ZONE") {
            Some(v) => v
                .parse::<CalendarTimeZone>()
                .map_err(|e| ConfigError::invalid("LABDESK_TIME_ZONE", &v, e.to_string()))?,
            None => defaults.time_zone,
        };

        let rooms = match var("LABDESK_ROOMS_FILE") {
            Some(path) => load_rooms(&path)?,
            None => defaults.rooms,
        };

        let category_admins = match var("LABDESK_CATEGORY_ADMINS") {
            Some(v) => v
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(|id| {
                    id.parse::<UserId>().map_err(|_| {
                        ConfigError::invalid("LABDESK_CATEGORY_ADMINS", id, "expected a user id")
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => defaults.category_admins,
        };

        let calendar_credentials = match var("GOOGLE_CALENDAR_CREDENTIALS") {
            Some(v) => Some(load_credentials(&v)?),
            None => None,
        };

        let calendar_timeout = seconds(&var, "LABDESK_CALENDAR_TIMEOUT_SECS", defaults.calendar_timeout)?;
        let calendar_connect_timeout = seconds(
            &var,
            "LABDESK_CALENDAR_CONNECT_TIMEOUT_SECS",
            defaults.calendar_connect_timeout,
        )?;

        Ok(Self {
            bind,
            jwt_secret: var("JWT_SECRET"),
            database_url: var("DATABASE_URL"),
            low_stock_threshold,
            booking: BookingRules {
                max_duration: chrono::Duration::hours(max_hours),
                initial_status,
            },
            time_zone,
            rooms,
            category_admins,
            calendar_credentials,
            calendar_timeout,
            calendar_connect_timeout,
        })
    }
}

fn seconds(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match var(key) {
        Some(v) => match v.parse::<u64>() {
            Ok(0) => Err(ConfigError::invalid(key, &v, "must be positive")),
            Ok(secs) => Ok(Duration::from_secs(secs)),
            Err(e) => Err(ConfigError::invalid(key, &v, format!("{e}"))),
        },
        None => Ok(default),
    }
}

fn load_rooms(path: &str) -> Result<RoomRegistry, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        var: "LABDESK_ROOMS_FILE",
        path: path.to_string(),
        source,
    })?;
    let rooms: RoomRegistry = serde_json::from_str(&raw)
        .map_err(|e| ConfigError::invalid("LABDESK_ROOMS_FILE", path, format!("{e}")))?;
    if rooms.is_empty() {
        return Err(ConfigError::invalid("LABDESK_ROOMS_FILE", path, "no rooms defined"));
    }
    Ok(rooms)
}

fn load_credentials(value: &str) -> Result<ServiceAccountKey, ConfigError> {
    let json = if value.starts_with('{') {
        value.to_string()
    } else {
        std::fs::read_to_string(value).map_err(|source| ConfigError::Io {
            var: "GOOGLE_CALENDAR_CREDENTIALS",
            path: value.to_string(),
            source,
        })?
    };
    ServiceAccountKey::from_json(&json)
        .map_err(|e| ConfigError::invalid("GOOGLE_CALENDAR_CREDENTIALS", "<redacted>", e.to_string()))
}

use chrono::Duration;
use thiserror::Error;

use labdesk_core::ReservationId;

use crate::reservation::ReservationStatus;

/// Why a reservation was rejected.
///
/// Every variant except [`ReservationError::Conflict`] and
/// [`ReservationError::InvalidTransition`] is a static input check; those two
/// depend on stored data and may succeed on retry with different input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReservationError {
    #[error("end time must be after start time")]
    InvalidTimeRange,

    #[error("cannot create reservations in the past")]
    PastReservation,

    #[error("reservation duration cannot exceed {} hours", .max.num_minutes() as f64 / 60.0)]
    DurationExceeded { max: Duration },

    #[error("purpose cannot be empty")]
    EmptyPurpose,

    #[error("unknown lab room '{0}'")]
    UnknownRoom(String),

    #[error("room is already reserved during this time period")]
    Conflict { conflicting: Option<ReservationId> },

    #[error("cannot {action} a {from} reservation")]
    InvalidTransition {
        from: ReservationStatus,
        action: &'static str,
    },
}

impl ReservationError {
    /// Stable name of the rule that failed, for field- or form-level messages.
    pub fn rule(&self) -> &'static str {
        match self {
            ReservationError::InvalidTimeRange => "invalid_time_range",
            ReservationError::PastReservation => "past_reservation",
            ReservationError::DurationExceeded { .. } => "duration_exceeded",
            ReservationError::EmptyPurpose => "empty_purpose",
            ReservationError::UnknownRoom(_) => "unknown_room",
            ReservationError::Conflict { .. } => "conflict",
            ReservationError::InvalidTransition { .. } => "invalid_transition",
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ReservationError::Conflict { .. })
    }
}

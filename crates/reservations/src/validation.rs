//! Booking rule pipeline.
//!
//! Checks run in a fixed order and stop at the first failure:
//! time range, past start, maximum duration, purpose, room lookup, conflict.
//! Static checks come first so a malformed request never touches stored data.

use chrono::{DateTime, Duration, Utc};

use labdesk_core::ReservationId;

use crate::error::ReservationError;
use crate::reservation::{Reservation, ReservationStatus};
use crate::room::RoomRegistry;
use crate::slot::TimeSlot;

/// Longest bookable slot unless configured otherwise.
pub const DEFAULT_MAX_DURATION_HOURS: i64 = 4;

/// Policy knobs for the pipeline and for newly created reservations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRules {
    pub max_duration: Duration,
    /// Status given to reservations at creation.
    pub initial_status: ReservationStatus,
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            max_duration: Duration::hours(DEFAULT_MAX_DURATION_HOURS),
            initial_status: ReservationStatus::Confirmed,
        }
    }
}

/// Input to [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest<'a> {
    /// Reservation being edited; it never conflicts with itself.
    pub exclude: Option<ReservationId>,
    pub room_key: &'a str,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub purpose: &'a str,
    /// Off for edits that keep the original start time.
    pub check_past: bool,
}

/// Run the full pipeline and return the accepted slot.
///
/// `existing` may contain any reservations; only confirmed ones of the same
/// room take part in the conflict check.
pub fn validate<'r>(
    req: &BookingRequest<'_>,
    rooms: &RoomRegistry,
    existing: impl IntoIterator<Item = &'r Reservation>,
    now: DateTime<Utc>,
    rules: &BookingRules,
) -> Result<TimeSlot, ReservationError> {
    let slot = TimeSlot::new(req.start, req.end)?;

    if req.check_past && slot.start() < now {
        return Err(ReservationError::PastReservation);
    }

    if slot.duration() > rules.max_duration {
        return Err(ReservationError::DurationExceeded {
            max: rules.max_duration,
        });
    }

    if req.purpose.trim().is_empty() {
        return Err(ReservationError::EmptyPurpose);
    }

    if !rooms.contains(req.room_key) {
        return Err(ReservationError::UnknownRoom(req.room_key.to_string()));
    }

    if let Some(hit) = find_conflict(existing, req.room_key, &slot, req.exclude) {
        return Err(ReservationError::Conflict {
            conflicting: Some(hit.id),
        });
    }

    Ok(slot)
}

/// First confirmed reservation of `room_key` overlapping `slot`, skipping `exclude`.
pub fn find_conflict<'r>(
    existing: impl IntoIterator<Item = &'r Reservation>,
    room_key: &str,
    slot: &TimeSlot,
    exclude: Option<ReservationId>,
) -> Option<&'r Reservation> {
    existing.into_iter().find(|r| {
        r.status == ReservationStatus::Confirmed
            && r.room_key == room_key
            && Some(r.id) != exclude
            && r.slot.overlaps(slot)
    })
}

pub fn is_room_available<'r>(
    existing: impl IntoIterator<Item = &'r Reservation>,
    room_key: &str,
    slot: &TimeSlot,
    exclude: Option<ReservationId>,
) -> bool {
    find_conflict(existing, room_key, slot, exclude).is_none()
}

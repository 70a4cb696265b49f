//! Room reservation domain module.
//!
//! Rooms come from configuration; reservations are validated against a fixed
//! rule pipeline and move through a small state machine. Everything here is
//! deterministic: callers pass `now` and the existing reservations explicitly.

pub mod error;
pub mod reservation;
pub mod room;
pub mod slot;
pub mod validation;

pub use error::ReservationError;
pub use reservation::{CalendarAction, NewReservation, Reservation, ReservationStatus};
pub use room::{LabRoom, RoomRegistry};
pub use slot::TimeSlot;
pub use validation::{
    BookingRequest, BookingRules, DEFAULT_MAX_DURATION_HOURS, find_conflict, is_room_available,
    validate,
};

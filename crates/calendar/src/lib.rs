//! External calendar synchronization.
//!
//! [`CalendarApi`] is the port the reservation services call; it has a Google
//! Calendar v3 implementation over HTTP and an in-memory one for tests and
//! local development.

pub mod api;
pub mod error;
pub mod event;
pub mod google;
pub mod memory;
pub mod timezone;

pub use api::CalendarApi;
pub use error::CalendarError;
pub use event::EventDetails;
pub use google::{GoogleCalendarClient, GoogleCalendarConfig, ServiceAccountKey};
pub use memory::{CalendarCall, InMemoryCalendar};
pub use timezone::{CalendarTimeZone, EventTime, UnknownTimeZone};

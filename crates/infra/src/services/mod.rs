//! Application services: the operations the HTTP layer exposes, composed from
//! domain rules, a store and the calendar port.

use std::sync::Arc;

use thiserror::Error;

use labdesk_calendar::CalendarError;
use labdesk_core::DomainError;
use labdesk_reservations::ReservationError;

use crate::store::{CategoryStore, ItemStore, ReservationStore, StoreError, UserStore};

pub mod account;
pub mod inventory;
pub mod reservations;

pub use account::AccountService;
pub use inventory::{InventoryService, ItemChanges, ItemListing, NewItem};
pub use reservations::{
    CancelOutcome, ConfirmOutcome, DeleteOutcome, ReservationChanges, ReservationRequest,
    ReservationService, RoomAvailability, RoomDetail,
};

/// Every store trait behind one object, so services share a single backend.
pub trait LabStore: UserStore + CategoryStore + ItemStore + ReservationStore {}

impl<T> LabStore for T where T: UserStore + CategoryStore + ItemStore + ReservationStore {}

pub type SharedStore = Arc<dyn LabStore>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Input broke a rule; `rule` names it for the client.
    #[error("{message}")]
    Validation { rule: &'static str, message: String },

    #[error("{0}")]
    Conflict(String),

    /// Unknown id, or a record owned by someone else.
    #[error("not found")]
    NotFound,

    #[error("{0}")]
    InvalidTransition(String),

    /// The caller may not perform this operation.
    #[error("{0}")]
    Forbidden(String),

    /// The external calendar rejected a create or update; nothing was saved.
    #[error("calendar sync failed: {0}")]
    CalendarSyncFailed(String),

    #[error("storage failure: {0}")]
    Store(String),
}

impl ServiceError {
    pub fn validation(rule: &'static str, message: impl Into<String>) -> Self {
        ServiceError::Validation {
            rule,
            message: message.into(),
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => ServiceError::validation("invalid_input", msg),
            DomainError::InvalidId(msg) => ServiceError::validation("invalid_id", msg),
            DomainError::NotFound => ServiceError::NotFound,
        }
    }
}

impl From<ReservationError> for ServiceError {
    fn from(err: ReservationError) -> Self {
        match &err {
            ReservationError::Conflict { .. } => ServiceError::Conflict(err.to_string()),
            ReservationError::InvalidTransition { .. } => {
                ServiceError::InvalidTransition(err.to_string())
            }
            ReservationError::UnknownRoom(_) => ServiceError::NotFound,
            _ => ServiceError::validation(err.rule(), err.to_string()),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ServiceError::NotFound,
            StoreError::Duplicate(msg) => ServiceError::validation("duplicate_name", msg),
            StoreError::Conflict(_) => {
                ServiceError::Conflict("room is already reserved during this time period".into())
            }
            StoreError::Storage(msg) => ServiceError::Store(msg),
        }
    }
}

impl From<CalendarError> for ServiceError {
    fn from(err: CalendarError) -> Self {
        ServiceError::CalendarSyncFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn reservation_errors_keep_their_rule() {
        let err: ServiceError = ReservationError::DurationExceeded {
            max: Duration::hours(4),
        }
        .into();
        assert!(matches!(err, ServiceError::Validation { rule: "duration_exceeded", .. }));

        let err: ServiceError = ReservationError::UnknownRoom("attic".into()).into();
        assert_eq!(err, ServiceError::NotFound);

        let err: ServiceError = ReservationError::Conflict { conflicting: None }.into();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn store_duplicates_are_validation_failures() {
        let err: ServiceError = StoreError::Duplicate("uq_inventory_items_owner_name".into()).into();
        assert!(matches!(err, ServiceError::Validation { rule: "duplicate_name", .. }));
    }
}

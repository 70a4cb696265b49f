use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use labdesk_core::{DomainError, Entity, ReservationId, UserId};

use crate::error::ReservationError;
use crate::slot::TimeSlot;

/// Reservation lifecycle state. `Cancelled` is terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(DomainError::validation(format!(
                "unknown reservation status '{other}'"
            ))),
        }
    }
}

/// A booking of one lab room for one time slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub owner: UserId,
    pub room_key: String,
    pub slot: TimeSlot,
    pub purpose: String,
    pub status: ReservationStatus,
    /// External calendar event id; only meaningful while `Confirmed`.
    pub event_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Reservation {
    type Id = ReservationId;

    fn id(&self) -> ReservationId {
        self.id
    }
}

/// Command: create a reservation from an already validated slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReservation {
    pub owner: UserId,
    pub room_key: String,
    pub slot: TimeSlot,
    pub purpose: String,
    pub status: ReservationStatus,
    pub occurred_at: DateTime<Utc>,
}

/// External calendar work implied by a state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarAction {
    None,
    Create,
    Update { event_id: String },
    Delete { event_id: String },
}

impl Reservation {
    pub fn create(cmd: NewReservation) -> Self {
        Self {
            id: ReservationId::new(),
            owner: cmd.owner,
            room_key: cmd.room_key,
            slot: cmd.slot,
            purpose: cmd.purpose.trim().to_string(),
            status: cmd.status,
            event_id: None,
            created_at: cmd.occurred_at,
            updated_at: cmd.occurred_at,
        }
    }

    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owner == user
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == ReservationStatus::Confirmed
    }

    /// Confirmed and `start <= now <= end`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.is_confirmed() && self.slot.contains(now)
    }

    pub fn duration_hours(&self) -> f64 {
        self.slot.duration().num_seconds() as f64 / 3600.0
    }

    /// Calendar work needed to bring the external event in line with this record.
    pub fn sync_action(&self) -> CalendarAction {
        match (self.status, &self.event_id) {
            (ReservationStatus::Confirmed, None) => CalendarAction::Create,
            (ReservationStatus::Confirmed, Some(id)) => CalendarAction::Update {
                event_id: id.clone(),
            },
            (_, Some(id)) => CalendarAction::Delete {
                event_id: id.clone(),
            },
            (_, None) => CalendarAction::None,
        }
    }

    /// Move to `Cancelled`. Returns `false` when already cancelled.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == ReservationStatus::Cancelled {
            return false;
        }
        self.status = ReservationStatus::Cancelled;
        self.updated_at = now;
        true
    }

    /// Move `Pending` to `Confirmed`. Returns `false` when already confirmed.
    pub fn confirm(&mut self, now: DateTime<Utc>) -> Result<bool, ReservationError> {
        match self.status {
            ReservationStatus::Confirmed => Ok(false),
            ReservationStatus::Cancelled => Err(ReservationError::InvalidTransition {
                from: self.status,
                action: "confirm",
            }),
            ReservationStatus::Pending => {
                self.status = ReservationStatus::Confirmed;
                self.updated_at = now;
                Ok(true)
            }
        }
    }

    /// Replace slot and purpose. Cancelled reservations cannot be edited.
    pub fn reschedule(
        &mut self,
        slot: TimeSlot,
        purpose: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ReservationError> {
        if self.status == ReservationStatus::Cancelled {
            return Err(ReservationError::InvalidTransition {
                from: self.status,
                action: "update",
            });
        }
        self.slot = slot;
        self.purpose = purpose.trim().to_string();
        self.updated_at = now;
        Ok(())
    }

    pub fn attach_event(&mut self, event_id: impl Into<String>) {
        self.event_id = Some(event_id.into());
    }

    pub fn clear_event(&mut self) -> Option<String> {
        self.event_id.take()
    }
}

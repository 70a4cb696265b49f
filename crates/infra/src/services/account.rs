use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use labdesk_calendar::CalendarApi;
use labdesk_core::UserId;
use labdesk_reservations::RoomRegistry;

use super::{ServiceError, SharedStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountRemoval {
    /// `false` when the store held nothing for the user.
    pub removed: bool,
    pub calendar_warnings: Vec<String>,
}

/// Account-wide operations.
#[derive(Clone)]
pub struct AccountService {
    store: SharedStore,
    calendar: Arc<dyn CalendarApi>,
    rooms: Arc<RoomRegistry>,
}

impl AccountService {
    pub fn new(store: SharedStore, calendar: Arc<dyn CalendarApi>, rooms: Arc<RoomRegistry>) -> Self {
        Self {
            store,
            calendar,
            rooms,
        }
    }

    /// Delete the user's items and reservations.
    ///
    /// Calendar events still attached to their reservations are removed first,
    /// best-effort; failures are reported and do not stop the removal.
    #[instrument(skip(self), fields(user_id = %user), err)]
    pub async fn remove_user(&self, user: UserId) -> Result<AccountRemoval, ServiceError> {
        let mut calendar_warnings = Vec::new();
        for reservation in self.store.with_events_for_owner(user).await? {
            let Some(event_id) = reservation.event_id.as_deref() else {
                continue;
            };
            let Some(room) = self.rooms.get(&reservation.room_key) else {
                calendar_warnings.push(format!(
                    "room '{}' is no longer configured; event {event_id} left in place",
                    reservation.room_key
                ));
                continue;
            };
            if let Err(err) = self.calendar.delete_event(&room.calendar_id, event_id).await {
                warn!(error = %err, %event_id, "calendar delete failed during account removal");
                calendar_warnings.push(format!("calendar event {event_id} could not be removed: {err}"));
            }
        }

        let removed = self.store.delete_user(user).await?;
        info!(removed, warnings = calendar_warnings.len(), "account removed");
        Ok(AccountRemoval {
            removed,
            calendar_warnings,
        })
    }
}

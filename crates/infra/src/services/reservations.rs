//! Reservation lifecycle with calendar synchronisation.
//!
//! Saves follow one order: validate, call the calendar, then commit. A
//! calendar failure aborts the save before anything is written. When the
//! commit itself fails after the calendar accepted the change (for example a
//! concurrent booking won the slot at the storage constraint), the calendar
//! change is undone best-effort and the store error is returned.
//!
//! Removing calendar events on cancel and delete never blocks the operation;
//! failures come back as `calendar_warning`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use labdesk_calendar::{CalendarApi, EventDetails};
use labdesk_core::{Clock, ReservationId, UserId};
use labdesk_reservations::{
    BookingRequest, BookingRules, CalendarAction, LabRoom, NewReservation, Reservation,
    ReservationError, ReservationStatus, RoomRegistry, TimeSlot, is_room_available, validate,
};

use super::{ServiceError, SharedStore};
use crate::query::{Page, PageWindow, ReservationQuery};

/// Upcoming reservations shown on a room's detail view.
pub const UPCOMING_LIMIT: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationRequest {
    pub room_key: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub purpose: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationChanges {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub purpose: String,
}

/// A room with its availability for the requested window, if one was given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomAvailability {
    #[serde(flatten)]
    pub room: LabRoom,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomDetail {
    pub room: LabRoom,
    pub upcoming: Vec<Reservation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancelOutcome {
    /// `false` when the reservation was already cancelled.
    pub cancelled: bool,
    pub reservation: Reservation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmOutcome {
    /// `false` when the reservation was already confirmed.
    pub confirmed: bool,
    pub reservation: Reservation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_warning: Option<String>,
}

/// What the calendar accepted before the commit, so it can be undone.
enum Synced {
    Nothing,
    Created { event_id: String },
    Updated { event_id: String },
}

#[derive(Clone)]
pub struct ReservationService {
    store: SharedStore,
    calendar: Arc<dyn CalendarApi>,
    clock: Arc<dyn Clock>,
    rooms: Arc<RoomRegistry>,
    rules: BookingRules,
}

impl ReservationService {
    pub fn new(
        store: SharedStore,
        calendar: Arc<dyn CalendarApi>,
        clock: Arc<dyn Clock>,
        rooms: Arc<RoomRegistry>,
        rules: BookingRules,
    ) -> Self {
        Self {
            store,
            calendar,
            clock,
            rooms,
            rules,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn rules(&self) -> &BookingRules {
        &self.rules
    }

    pub fn rooms(&self) -> Vec<LabRoom> {
        self.rooms.iter().cloned().collect()
    }

    fn room(&self, key: &str) -> Result<&LabRoom, ServiceError> {
        self.rooms.get(key).ok_or(ServiceError::NotFound)
    }

    /// Every room, with availability for `[start, end)` when a window is given.
    pub async fn room_overview(
        &self,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<RoomAvailability>, ServiceError> {
        let booked = match window {
            Some((start, end)) => {
                let slot = TimeSlot::new(start, end)?;
                Some(
                    self.store
                        .confirmed_overlapping(None, slot.start(), slot.end())
                        .await?,
                )
            }
            None => None,
        };

        Ok(self
            .rooms
            .iter()
            .map(|room| RoomAvailability {
                room: room.clone(),
                available: booked
                    .as_ref()
                    .map(|b| !b.iter().any(|r| r.room_key == room.key)),
            })
            .collect())
    }

    pub async fn room_detail(&self, key: &str) -> Result<RoomDetail, ServiceError> {
        let room = self.room(key)?.clone();
        let upcoming = self
            .store
            .upcoming_for_room(key, self.clock.now(), UPCOMING_LIMIT)
            .await?;
        Ok(RoomDetail { room, upcoming })
    }

    /// Whether `[start, end)` is free in the room, ignoring `exclude`.
    pub async fn availability(
        &self,
        key: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<ReservationId>,
    ) -> Result<bool, ServiceError> {
        self.room(key)?;
        let slot = TimeSlot::new(start, end)?;
        let existing = self
            .store
            .confirmed_overlapping(Some(key), slot.start(), slot.end())
            .await?;
        Ok(is_room_available(&existing, key, &slot, exclude))
    }

    pub async fn get(&self, owner: UserId, id: ReservationId) -> Result<Reservation, ServiceError> {
        match self.store.get_reservation(id).await? {
            Some(r) if r.is_owned_by(owner) => Ok(r),
            _ => Err(ServiceError::NotFound),
        }
    }

    pub async fn list(
        &self,
        owner: UserId,
        query: &ReservationQuery,
        page: u32,
    ) -> Result<Page<Reservation>, ServiceError> {
        let now = self.clock.now();
        let total = self.store.count_for_owner(owner, query, now).await?;
        let window = PageWindow::resolve(page, total);
        let items = self
            .store
            .list_for_owner(owner, query, now, window.offset, window.limit)
            .await?;
        Ok(Page::new(items, window, total))
    }

    #[instrument(skip(self, req), fields(owner_id = %owner, room_key = %req.room_key), err)]
    pub async fn create(
        &self,
        owner: UserId,
        req: ReservationRequest,
    ) -> Result<Reservation, ServiceError> {
        let now = self.clock.now();
        let existing = self
            .store
            .confirmed_overlapping(Some(&req.room_key), req.start, req.end)
            .await?;
        let slot = validate(
            &BookingRequest {
                exclude: None,
                room_key: &req.room_key,
                start: req.start,
                end: req.end,
                purpose: &req.purpose,
                check_past: true,
            },
            &self.rooms,
            &existing,
            now,
            &self.rules,
        )?;

        let room = self.room(&req.room_key)?;
        let mut reservation = Reservation::create(NewReservation {
            owner,
            room_key: req.room_key.clone(),
            slot,
            purpose: req.purpose,
            status: self.rules.initial_status,
            occurred_at: now,
        });

        self.store.ensure_user(owner).await?;
        let synced = self.sync(room, &mut reservation, None).await?;
        if let Err(err) = self.store.insert_reservation(&reservation).await {
            self.undo(room, synced, None).await;
            return Err(err.into());
        }

        info!(
            reservation_id = %reservation.id,
            status = %reservation.status,
            event_id = reservation.event_id.as_deref().unwrap_or(""),
            "reservation created"
        );
        Ok(reservation)
    }

    #[instrument(skip(self, changes), fields(owner_id = %owner, reservation_id = %id), err)]
    pub async fn update(
        &self,
        owner: UserId,
        id: ReservationId,
        changes: ReservationChanges,
    ) -> Result<Reservation, ServiceError> {
        let now = self.clock.now();
        let current = self.get(owner, id).await?;
        if current.status == ReservationStatus::Cancelled {
            return Err(ReservationError::InvalidTransition {
                from: current.status,
                action: "update",
            }
            .into());
        }

        let room = self.room(&current.room_key)?;
        let existing = self
            .store
            .confirmed_overlapping(Some(&current.room_key), changes.start, changes.end)
            .await?;
        let slot = validate(
            &BookingRequest {
                exclude: Some(id),
                room_key: &current.room_key,
                start: changes.start,
                end: changes.end,
                purpose: &changes.purpose,
                check_past: changes.start != current.slot.start(),
            },
            &self.rooms,
            &existing,
            now,
            &self.rules,
        )?;

        let mut updated = current.clone();
        updated.reschedule(slot, &changes.purpose, now)?;

        let synced = self.sync(room, &mut updated, Some(&current)).await?;
        if let Err(err) = self.store.update_reservation(&updated).await {
            self.undo(room, synced, Some(&current)).await;
            return Err(err.into());
        }

        info!(start = %updated.slot.start(), end = %updated.slot.end(), "reservation updated");
        Ok(updated)
    }

    /// Cancel the reservation and remove its calendar event best-effort.
    ///
    /// The cancellation is committed before the calendar is touched. The event
    /// id is kept when the delete fails, leaving a record of the orphaned
    /// event; once the cancellation is stored, later failures are warnings.
    #[instrument(skip(self), fields(owner_id = %owner, reservation_id = %id), err)]
    pub async fn cancel(
        &self,
        owner: UserId,
        id: ReservationId,
    ) -> Result<CancelOutcome, ServiceError> {
        let mut reservation = self.get(owner, id).await?;
        if !reservation.cancel(self.clock.now()) {
            return Ok(CancelOutcome {
                cancelled: false,
                reservation,
                calendar_warning: None,
            });
        }
        self.store.update_reservation(&reservation).await?;

        let mut calendar_warning = None;
        if let CalendarAction::Delete { event_id } = reservation.sync_action() {
            match self.remove_event(&reservation.room_key, &event_id).await {
                Ok(()) => {
                    let mut cleared = reservation.clone();
                    cleared.clear_event();
                    match self.store.update_reservation(&cleared).await {
                        Ok(()) => reservation = cleared,
                        Err(err) => {
                            warn!(error = %err, %event_id, "calendar event removed but its id was not cleared");
                            calendar_warning = Some(format!(
                                "calendar event {event_id} was removed but the reservation still references it"
                            ));
                        }
                    }
                }
                Err(warning) => calendar_warning = Some(warning),
            }
        }

        info!("reservation cancelled");
        Ok(CancelOutcome {
            cancelled: true,
            reservation,
            calendar_warning,
        })
    }

    /// Promote a pending reservation, re-checking it against confirmed bookings.
    #[instrument(skip(self), fields(owner_id = %owner, reservation_id = %id), err)]
    pub async fn confirm(
        &self,
        owner: UserId,
        id: ReservationId,
    ) -> Result<ConfirmOutcome, ServiceError> {
        let now = self.clock.now();
        let current = self.get(owner, id).await?;
        let mut confirmed = current.clone();
        if !confirmed.confirm(now)? {
            return Ok(ConfirmOutcome {
                confirmed: false,
                reservation: current,
            });
        }

        let room = self.room(&current.room_key)?;
        let existing = self
            .store
            .confirmed_overlapping(
                Some(&current.room_key),
                current.slot.start(),
                current.slot.end(),
            )
            .await?;
        validate(
            &BookingRequest {
                exclude: Some(id),
                room_key: &current.room_key,
                start: current.slot.start(),
                end: current.slot.end(),
                purpose: &current.purpose,
                check_past: false,
            },
            &self.rooms,
            &existing,
            now,
            &self.rules,
        )?;

        let synced = self.sync(room, &mut confirmed, Some(&current)).await?;
        if let Err(err) = self.store.update_reservation(&confirmed).await {
            self.undo(room, synced, Some(&current)).await;
            return Err(err.into());
        }

        info!("reservation confirmed");
        Ok(ConfirmOutcome {
            confirmed: true,
            reservation: confirmed,
        })
    }

    /// Delete the record, then its calendar event best-effort.
    #[instrument(skip(self), fields(owner_id = %owner, reservation_id = %id), err)]
    pub async fn delete(
        &self,
        owner: UserId,
        id: ReservationId,
    ) -> Result<DeleteOutcome, ServiceError> {
        let reservation = self.get(owner, id).await?;
        if !self.store.delete_reservation(id).await? {
            return Err(ServiceError::NotFound);
        }

        let calendar_warning = match &reservation.event_id {
            Some(event_id) => self
                .remove_event(&reservation.room_key, event_id)
                .await
                .err(),
            None => None,
        };

        info!("reservation deleted");
        Ok(DeleteOutcome {
            deleted: true,
            calendar_warning,
        })
    }

    /// Push the reservation's state to the calendar before it is committed.
    async fn sync(
        &self,
        room: &LabRoom,
        reservation: &mut Reservation,
        previous: Option<&Reservation>,
    ) -> Result<Synced, ServiceError> {
        let result = match reservation.sync_action() {
            CalendarAction::None => return Ok(Synced::Nothing),
            CalendarAction::Create => {
                let details = EventDetails::for_reservation(room, reservation);
                self.calendar
                    .create_event(&room.calendar_id, &details)
                    .await
                    .map(|event_id| {
                        reservation.attach_event(event_id.clone());
                        Synced::Created { event_id }
                    })
            }
            CalendarAction::Update { event_id } => {
                let details = EventDetails::for_reservation(room, reservation);
                if previous.is_some_and(|p| EventDetails::for_reservation(room, p) == details) {
                    return Ok(Synced::Nothing);
                }
                self.calendar
                    .update_event(&room.calendar_id, &event_id, &details)
                    .await
                    .map(|()| Synced::Updated { event_id })
            }
            CalendarAction::Delete { event_id } => {
                if let Err(warning) = self.remove_event(&room.key, &event_id).await {
                    warn!(%warning, "stale calendar event left in place");
                } else {
                    reservation.clear_event();
                }
                return Ok(Synced::Nothing);
            }
        };

        result.map_err(|err| {
            warn!(error = %err, calendar_id = %room.calendar_id, "calendar sync failed");
            ServiceError::from(err)
        })
    }

    /// Roll back a calendar change whose commit failed.
    async fn undo(&self, room: &LabRoom, synced: Synced, previous: Option<&Reservation>) {
        match synced {
            Synced::Nothing => {}
            Synced::Created { event_id } => {
                if let Err(warning) = self.remove_event(&room.key, &event_id).await {
                    warn!(%warning, "orphaned calendar event after failed commit");
                }
            }
            Synced::Updated { event_id } => {
                let Some(previous) = previous else { return };
                let details = EventDetails::for_reservation(room, previous);
                if let Err(err) = self
                    .calendar
                    .update_event(&room.calendar_id, &event_id, &details)
                    .await
                {
                    warn!(error = %err, %event_id, "calendar event not reverted after failed commit");
                }
            }
        }
    }

    /// Best-effort event removal; the error text is returned as a warning.
    async fn remove_event(&self, room_key: &str, event_id: &str) -> Result<(), String> {
        let Some(room) = self.rooms.get(room_key) else {
            let warning = format!("room '{room_key}' is no longer configured; event {event_id} left in place");
            warn!(%warning, "calendar cleanup skipped");
            return Err(warning);
        };
        self.calendar
            .delete_event(&room.calendar_id, event_id)
            .await
            .map_err(|err| {
                warn!(error = %err, %event_id, calendar_id = %room.calendar_id, "calendar delete failed");
                format!("calendar event could not be removed: {err}")
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, Ordering};

    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use labdesk_calendar::{CalendarCall, InMemoryCalendar};
    use labdesk_core::{CategoryId, FixedClock, ItemId};
    use labdesk_inventory::{Category, InventoryItem, ItemFilter};

    use crate::store::{
        CategoryStore, InMemoryStore, ItemStore, ReservationStore, StoreError, UserStore,
    };

    struct Harness {
        svc: ReservationService,
        store: Arc<InMemoryStore>,
        calendar: Arc<InMemoryCalendar>,
        clock: Arc<FixedClock>,
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn tomorrow(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 3, hour, minute, 0).unwrap()
    }

    fn harness_with(rules: BookingRules) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let calendar = Arc::new(InMemoryCalendar::new());
        let clock = Arc::new(FixedClock::new(now()));
        let svc = ReservationService::new(
            store.clone(),
            calendar.clone(),
            clock.clone(),
            Arc::new(RoomRegistry::default_rooms()),
            rules,
        );
        Harness {
            svc,
            store,
            calendar,
            clock,
        }
    }

    fn harness() -> Harness {
        harness_with(BookingRules::default())
    }

    fn request(room: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> ReservationRequest {
        ReservationRequest {
            room_key: room.to_string(),
            start,
            end,
            purpose: "PCR run".to_string(),
        }
    }

    #[tokio::test]
    async fn confirmed_create_gets_an_event_and_cancel_clears_it() {
        let h = harness();
        let owner = UserId::new();

        let r = h
            .svc
            .create(owner, request("room1", tomorrow(14, 0), tomorrow(15, 0)))
            .await
            .unwrap();
        assert_eq!(r.status, ReservationStatus::Confirmed);
        let event_id = r.event_id.clone().unwrap();
        assert!(!event_id.is_empty());
        let event = h.calendar.event("room1@calendar.labdesk.local", &event_id).unwrap();
        assert_eq!(event.summary, "Lab Room 1: PCR run");

        let outcome = h.svc.cancel(owner, r.id).await.unwrap();
        assert!(outcome.cancelled);
        assert_eq!(outcome.reservation.event_id, None);
        assert_eq!(outcome.calendar_warning, None);
        assert_eq!(h.calendar.delete_calls(), 1);

        let stored = h.store.get_reservation(r.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReservationStatus::Cancelled);
        assert_eq!(stored.event_id, None);

        let again = h.svc.cancel(owner, r.id).await.unwrap();
        assert!(!again.cancelled);
        assert_eq!(h.calendar.delete_calls(), 1);
    }

    #[tokio::test]
    async fn afternoon_booking_scenario() {
        let h = harness();
        let owner = UserId::new();
        h.svc
            .create(owner, request("room1", tomorrow(14, 0), tomorrow(15, 0)))
            .await
            .unwrap();

        let err = h
            .svc
            .create(owner, request("room1", tomorrow(14, 30), tomorrow(15, 30)))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        h.svc
            .create(owner, request("room1", tomorrow(15, 0), tomorrow(16, 0)))
            .await
            .unwrap();
        assert!(h
            .svc
            .availability("room1", tomorrow(9, 0), tomorrow(14, 0), None)
            .await
            .unwrap());
        h.svc
            .create(owner, request("room1", tomorrow(10, 0), tomorrow(14, 0)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn calendar_failure_persists_nothing() {
        let h = harness();
        let owner = UserId::new();
        h.calendar.fail_next(1);

        let err = h
            .svc
            .create(owner, request("room2", tomorrow(10, 0), tomorrow(11, 0)))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::CalendarSyncFailed(_)));

        let page = h.svc.list(owner, &ReservationQuery::default(), 1).await.unwrap();
        assert_eq!(page.total, 0);
        assert_eq!(h.calendar.event_count(), 0);
    }

    #[tokio::test]
    async fn validation_failures_never_reach_the_calendar() {
        let h = harness();
        let owner = UserId::new();

        let err = h
            .svc
            .create(owner, request("room1", now() - Duration::hours(2), now() - Duration::hours(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { rule: "past_reservation", .. }));

        let err = h
            .svc
            .create(owner, request("room1", tomorrow(8, 0), tomorrow(13, 0)))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { rule: "duration_exceeded", .. }));

        let err = h
            .svc
            .create(owner, request("attic", tomorrow(8, 0), tomorrow(9, 0)))
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::NotFound);

        assert!(h.calendar.calls().is_empty());
    }

    #[tokio::test]
    async fn update_moves_the_event_and_skips_past_check_for_unchanged_start() {
        let h = harness();
        let owner = UserId::new();
        let r = h
            .svc
            .create(owner, request("room3", tomorrow(9, 0), tomorrow(10, 0)))
            .await
            .unwrap();

        h.clock.set(tomorrow(9, 30));
        let updated = h
            .svc
            .update(
                owner,
                r.id,
                ReservationChanges {
                    start: tomorrow(9, 0),
                    end: tomorrow(11, 0),
                    purpose: "PCR run, extended".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.slot.end(), tomorrow(11, 0));
        let event_id = updated.event_id.clone().unwrap();
        let event = h.calendar.event("room3@calendar.labdesk.local", &event_id).unwrap();
        assert_eq!(event.end, tomorrow(11, 0));

        let err = h
            .svc
            .update(
                owner,
                r.id,
                ReservationChanges {
                    start: tomorrow(8, 0),
                    end: tomorrow(9, 0),
                    purpose: "earlier".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { rule: "past_reservation", .. }));
    }

    #[tokio::test]
    async fn update_excludes_itself_from_the_conflict_check() {
        let h = harness();
        let owner = UserId::new();
        let r = h
            .svc
            .create(owner, request("room1", tomorrow(14, 0), tomorrow(15, 0)))
            .await
            .unwrap();

        assert!(h
            .svc
            .availability("room1", tomorrow(14, 30), tomorrow(15, 30), Some(r.id))
            .await
            .unwrap());
        h.svc
            .update(
                owner,
                r.id,
                ReservationChanges {
                    start: tomorrow(14, 30),
                    end: tomorrow(15, 30),
                    purpose: "shifted".into(),
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_reservations_cannot_be_updated_or_confirmed() {
        let h = harness();
        let owner = UserId::new();
        let r = h
            .svc
            .create(owner, request("room1", tomorrow(14, 0), tomorrow(15, 0)))
            .await
            .unwrap();
        h.svc.cancel(owner, r.id).await.unwrap();

        let err = h
            .svc
            .update(
                owner,
                r.id,
                ReservationChanges {
                    start: tomorrow(16, 0),
                    end: tomorrow(17, 0),
                    purpose: "again".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition(_)));
        let err = h.svc.confirm(owner, r.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn pending_reservations_sync_on_confirm() {
        let h = harness_with(BookingRules {
            initial_status: ReservationStatus::Pending,
            ..BookingRules::default()
        });
        let owner = UserId::new();
        let r = h
            .svc
            .create(owner, request("room4", tomorrow(10, 0), tomorrow(11, 0)))
            .await
            .unwrap();
        assert_eq!(r.status, ReservationStatus::Pending);
        assert_eq!(r.event_id, None);
        assert!(h.calendar.calls().is_empty());

        let outcome = h.svc.confirm(owner, r.id).await.unwrap();
        assert!(outcome.confirmed);
        assert!(outcome.reservation.event_id.is_some());
        assert_eq!(
            h.calendar.calls(),
            [CalendarCall::Create {
                calendar_id: "room4@calendar.labdesk.local".into()
            }]
        );

        let again = h.svc.confirm(owner, r.id).await.unwrap();
        assert!(!again.confirmed);
    }

    #[tokio::test]
    async fn failed_cancel_cleanup_is_a_warning() {
        let h = harness();
        let owner = UserId::new();
        let r = h
            .svc
            .create(owner, request("room1", tomorrow(14, 0), tomorrow(15, 0)))
            .await
            .unwrap();

        h.calendar.fail_next(1);
        let outcome = h.svc.cancel(owner, r.id).await.unwrap();
        assert!(outcome.cancelled);
        assert!(outcome.calendar_warning.is_some());
        assert_eq!(outcome.reservation.event_id, r.event_id);
    }

    #[tokio::test]
    async fn delete_removes_record_even_when_calendar_is_down() {
        let h = harness();
        let owner = UserId::new();
        let r = h
            .svc
            .create(owner, request("room5", tomorrow(14, 0), tomorrow(15, 0)))
            .await
            .unwrap();

        h.calendar.fail_next(1);
        let outcome = h.svc.delete(owner, r.id).await.unwrap();
        assert!(outcome.deleted);
        assert!(outcome.calendar_warning.is_some());
        assert_eq!(h.store.get_reservation(r.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn other_users_reservations_are_not_found() {
        let h = harness();
        let owner = UserId::new();
        let r = h
            .svc
            .create(owner, request("room1", tomorrow(14, 0), tomorrow(15, 0)))
            .await
            .unwrap();

        let stranger = UserId::new();
        assert_eq!(h.svc.get(stranger, r.id).await.unwrap_err(), ServiceError::NotFound);
        assert_eq!(h.svc.cancel(stranger, r.id).await.unwrap_err(), ServiceError::NotFound);
        assert_eq!(h.svc.delete(stranger, r.id).await.unwrap_err(), ServiceError::NotFound);
    }

    #[tokio::test]
    async fn listing_filters_and_pages() {
        let h = harness();
        let owner = UserId::new();
        for day in 0..12 {
            let start = tomorrow(10, 0) + Duration::days(day);
            h.svc
                .create(owner, request("room1", start, start + Duration::hours(1)))
                .await
                .unwrap();
        }

        let page = h.svc.list(owner, &ReservationQuery::default(), 1).await.unwrap();
        assert_eq!(page.total, 12);
        assert_eq!(page.num_pages, 2);
        assert!(page.is_paginated);
        assert_eq!(page.items.len(), 10);
        assert!(page.items[0].slot.start() > page.items[1].slot.start());

        let last = h.svc.list(owner, &ReservationQuery::default(), 7).await.unwrap();
        assert_eq!(last.page, 2);
        assert_eq!(last.items.len(), 2);

        h.clock.set(tomorrow(12, 0) + Duration::days(5));
        let upcoming = h.svc.list(owner, &ReservationQuery::default(), 1).await.unwrap();
        assert_eq!(upcoming.total, 6);
        let all = ReservationQuery {
            show_past: true,
            ..Default::default()
        };
        assert_eq!(h.svc.list(owner, &all, 1).await.unwrap().total, 12);
        let cancelled = ReservationQuery {
            status: Some(ReservationStatus::Cancelled),
            show_past: true,
        };
        assert_eq!(h.svc.list(owner, &cancelled, 1).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn room_overview_marks_booked_rooms() {
        let h = harness();
        h.svc
            .create(UserId::new(), request("room2", tomorrow(14, 0), tomorrow(15, 0)))
            .await
            .unwrap();

        let rooms = h
            .svc
            .room_overview(Some((tomorrow(14, 30), tomorrow(16, 0))))
            .await
            .unwrap();
        assert_eq!(rooms.len(), 5);
        for r in &rooms {
            assert_eq!(r.available, Some(r.room.key != "room2"));
        }

        let plain = h.svc.room_overview(None).await.unwrap();
        assert!(plain.iter().all(|r| r.available.is_none()));

        let detail = h.svc.room_detail("room2").await.unwrap();
        assert_eq!(detail.upcoming.len(), 1);
        assert_eq!(h.svc.room_detail("attic").await.unwrap_err(), ServiceError::NotFound);
    }

    /// In-memory store with scripted faults.
    ///
    /// With `stale_reads` the overlap query sees nothing, so a competing
    /// booking is only caught by the commit. `update_budget` is the number of
    /// reservation updates that succeed before the rest fail; negative means
    /// unlimited.
    struct ScriptedStore {
        inner: InMemoryStore,
        stale_reads: bool,
        update_budget: AtomicI64,
    }

    impl ScriptedStore {
        fn new(stale_reads: bool) -> Self {
            Self {
                inner: InMemoryStore::new(),
                stale_reads,
                update_budget: AtomicI64::new(-1),
            }
        }

        fn allow_updates(&self, n: i64) {
            self.update_budget.store(n, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl UserStore for ScriptedStore {
        async fn ensure_user(&self, user: UserId) -> Result<(), StoreError> {
            self.inner.ensure_user(user).await
        }

        async fn delete_user(&self, user: UserId) -> Result<bool, StoreError> {
            self.inner.delete_user(user).await
        }
    }

    #[async_trait]
    impl CategoryStore for ScriptedStore {
        async fn insert_category(&self, category: &Category) -> Result<(), StoreError> {
            self.inner.insert_category(category).await
        }

        async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
            self.inner.get_category(id).await
        }

        async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
            self.inner.list_categories().await
        }

        async fn delete_category(&self, id: CategoryId) -> Result<bool, StoreError> {
            self.inner.delete_category(id).await
        }
    }

    #[async_trait]
    impl ItemStore for ScriptedStore {
        async fn insert_item(&self, item: &InventoryItem) -> Result<(), StoreError> {
            self.inner.insert_item(item).await
        }

        async fn update_item(&self, item: &InventoryItem) -> Result<(), StoreError> {
            self.inner.update_item(item).await
        }

        async fn get_item(&self, id: ItemId) -> Result<Option<InventoryItem>, StoreError> {
            self.inner.get_item(id).await
        }

        async fn delete_item(&self, id: ItemId) -> Result<bool, StoreError> {
            self.inner.delete_item(id).await
        }

        async fn list_items(
            &self,
            owner: UserId,
            filter: &ItemFilter,
        ) -> Result<Vec<InventoryItem>, StoreError> {
            self.inner.list_items(owner, filter).await
        }
    }

    #[async_trait]
    impl ReservationStore for ScriptedStore {
        async fn insert_reservation(&self, r: &Reservation) -> Result<(), StoreError> {
            self.inner.insert_reservation(r).await
        }

        async fn update_reservation(&self, r: &Reservation) -> Result<(), StoreError> {
            let remaining = self.update_budget.load(Ordering::SeqCst);
            if remaining == 0 {
                return Err(StoreError::Storage("connection reset".into()));
            }
            if remaining > 0 {
                self.update_budget.fetch_sub(1, Ordering::SeqCst);
            }
            self.inner.update_reservation(r).await
        }

        async fn get_reservation(
            &self,
            id: ReservationId,
        ) -> Result<Option<Reservation>, StoreError> {
            self.inner.get_reservation(id).await
        }

        async fn delete_reservation(&self, id: ReservationId) -> Result<bool, StoreError> {
            self.inner.delete_reservation(id).await
        }

        async fn confirmed_overlapping(
            &self,
            room_key: Option<&str>,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<Reservation>, StoreError> {
            if self.stale_reads {
                return Ok(Vec::new());
            }
            self.inner.confirmed_overlapping(room_key, start, end).await
        }

        async fn upcoming_for_room(
            &self,
            room_key: &str,
            now: DateTime<Utc>,
            limit: u32,
        ) -> Result<Vec<Reservation>, StoreError> {
            self.inner.upcoming_for_room(room_key, now, limit).await
        }

        async fn count_for_owner(
            &self,
            owner: UserId,
            query: &ReservationQuery,
            now: DateTime<Utc>,
        ) -> Result<u64, StoreError> {
            self.inner.count_for_owner(owner, query, now).await
        }

        async fn list_for_owner(
            &self,
            owner: UserId,
            query: &ReservationQuery,
            now: DateTime<Utc>,
            offset: u64,
            limit: u32,
        ) -> Result<Vec<Reservation>, StoreError> {
            self.inner.list_for_owner(owner, query, now, offset, limit).await
        }

        async fn with_events_for_owner(
            &self,
            owner: UserId,
        ) -> Result<Vec<Reservation>, StoreError> {
            self.inner.with_events_for_owner(owner).await
        }
    }

    fn scripted_harness(
        stale_reads: bool,
    ) -> (ReservationService, Arc<ScriptedStore>, Arc<InMemoryCalendar>) {
        let store = Arc::new(ScriptedStore::new(stale_reads));
        let calendar = Arc::new(InMemoryCalendar::new());
        let svc = ReservationService::new(
            store.clone(),
            calendar.clone(),
            Arc::new(FixedClock::new(now())),
            Arc::new(RoomRegistry::default_rooms()),
            BookingRules::default(),
        );
        (svc, store, calendar)
    }

    fn racing_harness() -> (ReservationService, Arc<InMemoryCalendar>) {
        let (svc, _, calendar) = scripted_harness(true);
        (svc, calendar)
    }

    #[tokio::test]
    async fn cancel_stays_committed_when_clearing_the_event_id_fails() {
        let (svc, store, calendar) = scripted_harness(false);
        let owner = UserId::new();
        let r = svc
            .create(owner, request("room1", tomorrow(14, 0), tomorrow(15, 0)))
            .await
            .unwrap();
        let event_id = r.event_id.clone().unwrap();

        store.allow_updates(1);
        let outcome = svc.cancel(owner, r.id).await.unwrap();
        assert!(outcome.cancelled);
        assert_eq!(outcome.reservation.status, ReservationStatus::Cancelled);
        assert_eq!(outcome.reservation.event_id.as_deref(), Some(event_id.as_str()));
        assert!(outcome.calendar_warning.unwrap().contains(&event_id));
        assert_eq!(calendar.delete_calls(), 1);
        assert_eq!(calendar.event_count(), 0);

        let stored = store.get_reservation(r.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReservationStatus::Cancelled);
        assert_eq!(stored.event_id.as_deref(), Some(event_id.as_str()));
    }

    #[tokio::test]
    async fn losing_a_race_at_commit_removes_the_new_event() {
        let (svc, calendar) = racing_harness();
        let owner = UserId::new();
        svc.create(owner, request("room1", tomorrow(14, 0), tomorrow(15, 0)))
            .await
            .unwrap();

        let err = svc
            .create(owner, request("room1", tomorrow(14, 30), tomorrow(15, 30)))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(calendar.event_count(), 1);
        assert_eq!(calendar.delete_calls(), 1);
    }

    #[tokio::test]
    async fn losing_a_race_on_update_reverts_the_event() {
        let (svc, calendar) = racing_harness();
        let owner = UserId::new();
        svc.create(owner, request("room1", tomorrow(14, 0), tomorrow(15, 0)))
            .await
            .unwrap();
        let moving = svc
            .create(owner, request("room1", tomorrow(16, 0), tomorrow(17, 0)))
            .await
            .unwrap();

        let err = svc
            .update(
                owner,
                moving.id,
                ReservationChanges {
                    start: tomorrow(14, 30),
                    end: tomorrow(15, 30),
                    purpose: "PCR run".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let event_id = moving.event_id.unwrap();
        let event = calendar.event("room1@calendar.labdesk.local", &event_id).unwrap();
        assert_eq!(event.start, tomorrow(16, 0));
    }
}

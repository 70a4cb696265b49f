use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use labdesk_reservations::{LabRoom, Reservation};

use crate::timezone::{CalendarTimeZone, EventTime};

/// Provider-neutral content of a calendar event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDetails {
    pub summary: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl EventDetails {
    /// Event mirroring a reservation: `"<room name>: <first line of purpose>"`.
    pub fn for_reservation(room: &LabRoom, reservation: &Reservation) -> Self {
        let headline = reservation.purpose.lines().next().unwrap_or_default().trim();
        Self {
            summary: format!("{}: {}", room.name, headline),
            description: format!("Reserved by {}\n\n{}", reservation.owner, reservation.purpose),
            start: reservation.slot.start(),
            end: reservation.slot.end(),
        }
    }

    pub fn to_body(&self, tz: &CalendarTimeZone) -> EventBody {
        EventBody {
            summary: self.summary.clone(),
            description: self.description.clone(),
            start: tz.event_time(self.start),
            end: tz.event_time(self.end),
        }
    }
}

/// JSON body of an events insert/update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBody {
    pub summary: String,
    pub description: String,
    pub start: EventTime,
    pub end: EventTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use labdesk_core::UserId;
    use labdesk_reservations::{NewReservation, ReservationStatus, RoomRegistry, TimeSlot};

    #[test]
    fn reservation_event_uses_room_name_and_owner() {
        let rooms = RoomRegistry::default_rooms();
        let room = rooms.get("room2").unwrap();
        let start = Utc.with_ymd_and_hms(2030, 2, 1, 3, 0, 0).unwrap();
        let owner = UserId::new();
        let reservation = Reservation::create(NewReservation {
            owner,
            room_key: "room2".into(),
            slot: TimeSlot::new(start, start + chrono::Duration::hours(2)).unwrap(),
            purpose: "PCR run\nbring own reagents".into(),
            status: ReservationStatus::Confirmed,
            occurred_at: start,
        });

        let details = EventDetails::for_reservation(room, &reservation);
        assert_eq!(details.summary, "Lab Room 2: PCR run");
        assert!(details.description.starts_with(&format!("Reserved by {owner}")));
        assert!(details.description.ends_with("bring own reagents"));

        let tz = CalendarTimeZone::default();
        let body = details.to_body(&tz);
        assert_eq!(body.start.date_time, "2030-02-01T10:00:00+07:00");
        assert_eq!(body.end.date_time, "2030-02-01T12:00:00+07:00");
        assert_eq!(body.start.time_zone, body.end.time_zone);
    }
}

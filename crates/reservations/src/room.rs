use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A bookable lab room, defined by configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabRoom {
    /// Stable key used to join reservations to the room (e.g. `room1`).
    pub key: String,
    pub name: String,
    /// Identifier of the room's calendar on the external calendar service.
    pub calendar_id: String,
    pub capacity: u32,
    /// Display flag; reservations are not blocked by it.
    pub is_available: bool,
    pub description: String,
}

/// Room attributes as they appear in the registry file (keyed by room key).
#[derive(Debug, Clone, Deserialize)]
struct RoomEntry {
    name: String,
    calendar_id: String,
    #[serde(default = "default_capacity")]
    capacity: u32,
    #[serde(default = "default_available")]
    is_available: bool,
    #[serde(default)]
    description: String,
}

fn default_capacity() -> u32 {
    1
}

fn default_available() -> bool {
    true
}

/// Read-only set of configured rooms, loaded once at startup.
///
/// Deserializes from a map of room key to attributes:
///
/// ```json
/// { "room1": { "name": "Lab Room 1", "calendar_id": "abc@group.calendar.google.com" } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, RoomEntry>", into = "BTreeMap<String, LabRoom>")]
pub struct RoomRegistry {
    rooms: BTreeMap<String, LabRoom>,
}

impl From<BTreeMap<String, RoomEntry>> for RoomRegistry {
    fn from(entries: BTreeMap<String, RoomEntry>) -> Self {
        let rooms = entries
            .into_iter()
            .map(|(key, e)| {
                let room = LabRoom {
                    key: key.clone(),
                    name: e.name,
                    calendar_id: e.calendar_id,
                    capacity: e.capacity,
                    is_available: e.is_available,
                    description: e.description,
                };
                (key, room)
            })
            .collect();
        Self { rooms }
    }
}

impl From<RoomRegistry> for BTreeMap<String, LabRoom> {
    fn from(registry: RoomRegistry) -> Self {
        registry.rooms
    }
}

impl RoomRegistry {
    pub fn new(rooms: impl IntoIterator<Item = LabRoom>) -> Self {
        Self {
            rooms: rooms.into_iter().map(|r| (r.key.clone(), r)).collect(),
        }
    }

    /// The five rooms the lab ships with (`room1`..`room5`).
    pub fn default_rooms() -> Self {
        Self::new((1..=5).map(|n| LabRoom {
            key: format!("room{n}"),
            name: format!("Lab Room {n}"),
            calendar_id: format!("room{n}@calendar.labdesk.local"),
            capacity: 1,
            is_available: true,
            description: String::new(),
        }))
    }

    pub fn get(&self, key: &str) -> Option<&LabRoom> {
        self.rooms.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.rooms.contains_key(key)
    }

    /// Rooms ordered by key.
    pub fn iter(&self) -> impl Iterator<Item = &LabRoom> {
        self.rooms.values()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

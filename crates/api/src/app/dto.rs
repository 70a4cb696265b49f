use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use labdesk_core::{CategoryId, ReservationId, UserId};
use labdesk_infra::Page;
use labdesk_inventory::{ItemFilter, QuantitySort};
use labdesk_reservations::{LabRoom, Reservation, ReservationStatus};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct ItemRequest {
    pub name: String,
    pub quantity: i64,
    #[serde(default)]
    pub category: Option<CategoryId>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ReservationRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub purpose: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ItemListParams {
    pub q: Option<String>,
    pub category: Option<String>,
    pub sort: Option<String>,
}

impl ItemListParams {
    /// Blank values mean "no filter", as an empty form field would.
    pub fn into_filter(self) -> Result<ItemFilter, axum::response::Response> {
        let category = match self.category.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                raw.parse::<CategoryId>()
                    .map_err(|_| errors::invalid_id("category"))?,
            ),
        };
        let sort = match self.sort.as_deref().map(str::trim) {
            None => QuantitySort::default(),
            Some(raw) => raw.parse().map_err(|e: labdesk_core::DomainError| {
                errors::json_error(
                    axum::http::StatusCode::BAD_REQUEST,
                    "invalid_sort",
                    e.to_string(),
                )
            })?,
        };
        Ok(ItemFilter {
            search: self.q,
            category,
            sort,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LowStockParams {
    pub threshold: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SuggestionParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct WindowParams {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityParams {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub exclude: Option<ReservationId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReservationListParams {
    pub status: Option<String>,
    pub show_past: Option<String>,
    pub page: Option<String>,
}

impl ReservationListParams {
    pub fn show_past(&self) -> bool {
        matches!(
            self.show_past.as_deref().map(str::trim),
            Some("true" | "1" | "on")
        )
    }

    /// Unparseable page numbers fall back to the first page.
    pub fn page(&self) -> u32 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(1)
    }
}

// -------------------------
// Response DTOs
// -------------------------

/// Flat reservation representation with derived display fields.
#[derive(Debug, Clone, Serialize)]
pub struct ReservationView {
    pub id: ReservationId,
    pub owner: UserId,
    pub room_key: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub purpose: String,
    pub status: ReservationStatus,
    pub event_id: Option<String>,
    pub is_active: bool,
    pub duration_hours: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReservationView {
    pub fn new(r: &Reservation, now: DateTime<Utc>) -> Self {
        Self {
            id: r.id,
            owner: r.owner,
            room_key: r.room_key.clone(),
            start: r.slot.start(),
            end: r.slot.end(),
            purpose: r.purpose.clone(),
            status: r.status,
            event_id: r.event_id.clone(),
            is_active: r.is_active(now),
            duration_hours: r.duration_hours(),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

pub fn reservation_page(page: Page<Reservation>, now: DateTime<Utc>) -> Page<ReservationView> {
    page.map(|r| ReservationView::new(&r, now))
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomDetailView {
    pub room: LabRoom,
    pub upcoming: Vec<ReservationView>,
}

//! Service wiring: picks the store and calendar backends from configuration.

use std::sync::Arc;

use thiserror::Error;

use labdesk_calendar::{
    CalendarApi, CalendarError, GoogleCalendarClient, GoogleCalendarConfig, InMemoryCalendar,
};
use labdesk_core::{Clock, SystemClock};
use labdesk_infra::{
    AccountService, AppConfig, InMemoryStore, InventoryService, PostgresStore, ReservationService,
    SharedStore, StoreError,
};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("calendar: {0}")]
    Calendar(#[from] CalendarError),
}

/// The application services shared by every handler.
#[derive(Clone)]
pub struct AppServices {
    pub inventory: InventoryService,
    pub reservations: ReservationService,
    pub account: AccountService,
}

impl AppServices {
    pub fn new(
        store: SharedStore,
        calendar: Arc<dyn CalendarApi>,
        clock: Arc<dyn Clock>,
        config: &AppConfig,
    ) -> Self {
        let rooms = Arc::new(config.rooms.clone());
        Self {
            inventory: InventoryService::new(store.clone(), clock.clone(), config.low_stock_threshold)
                .with_category_admins(config.category_admins.iter().copied()),
            reservations: ReservationService::new(
                store.clone(),
                calendar.clone(),
                clock,
                rooms.clone(),
                config.booking.clone(),
            ),
            account: AccountService::new(store, calendar, rooms),
        }
    }

    /// In-memory store and calendar, for development and tests.
    pub fn in_memory(config: &AppConfig) -> Self {
        Self::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryCalendar::new()),
            Arc::new(SystemClock),
            config,
        )
    }

    /// Postgres when `DATABASE_URL` is set and Google Calendar when credentials
    /// are set; in-memory fallbacks otherwise.
    pub async fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        let store: SharedStore = match &config.database_url {
            Some(url) => {
                let store = PostgresStore::connect(url).await?;
                store.migrate().await?;
                tracing::info!("using postgres store");
                Arc::new(store)
            }
            None => {
                tracing::warn!("DATABASE_URL not set; data is kept in memory only");
                Arc::new(InMemoryStore::new())
            }
        };

        let calendar: Arc<dyn CalendarApi> = match &config.calendar_credentials {
            Some(key) => {
                let mut cfg = GoogleCalendarConfig::new(key.clone(), config.time_zone);
                cfg.timeout = config.calendar_timeout;
                cfg.connect_timeout = config.calendar_connect_timeout;
                tracing::info!(client_email = %key.client_email, "using google calendar");
                Arc::new(GoogleCalendarClient::new(cfg)?)
            }
            None => {
                tracing::warn!("GOOGLE_CALENDAR_CREDENTIALS not set; calendar events are not published");
                Arc::new(InMemoryCalendar::new())
            }
        };

        Ok(Self::new(store, calendar, Arc::new(SystemClock), config))
    }
}

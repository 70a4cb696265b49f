//! Infrastructure layer: configuration, persistence, listing queries and the
//! application services that tie them to the calendar.

pub mod config;
pub mod query;
pub mod services;
pub mod store;

pub use config::{AppConfig, ConfigError};
pub use query::{Page, PageWindow, ReservationQuery};
pub use services::{
    AccountService, InventoryService, LabStore, ReservationService, ServiceError, SharedStore,
};
pub use store::{InMemoryStore, PostgresStore, StoreError};

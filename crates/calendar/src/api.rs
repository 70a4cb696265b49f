use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CalendarError;
use crate::event::EventDetails;

/// Create/update/delete operations against one provider account.
///
/// Implementations serialize times in their configured zone; callers pass UTC.
#[async_trait]
pub trait CalendarApi: Send + Sync {
    /// Returns the provider-assigned event id.
    async fn create_event(
        &self,
        calendar_id: &str,
        event: &EventDetails,
    ) -> Result<String, CalendarError>;

    async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        event: &EventDetails,
    ) -> Result<(), CalendarError>;

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), CalendarError>;
}

#[async_trait]
impl<C> CalendarApi for Arc<C>
where
    C: CalendarApi + ?Sized,
{
    async fn create_event(
        &self,
        calendar_id: &str,
        event: &EventDetails,
    ) -> Result<String, CalendarError> {
        (**self).create_event(calendar_id, event).await
    }

    async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        event: &EventDetails,
    ) -> Result<(), CalendarError> {
        (**self).update_event(calendar_id, event_id, event).await
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), CalendarError> {
        (**self).delete_event(calendar_id, event_id).await
    }
}

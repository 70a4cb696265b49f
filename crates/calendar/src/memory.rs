use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::api::CalendarApi;
use crate::error::CalendarError;
use crate::event::EventDetails;

/// One call received by [`InMemoryCalendar`], in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarCall {
    Create { calendar_id: String },
    Update { calendar_id: String, event_id: String },
    Delete { calendar_id: String, event_id: String },
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    events: HashMap<(String, String), EventDetails>,
    calls: Vec<CalendarCall>,
    fail_next: usize,
}

/// In-process calendar that records every call.
///
/// Used in tests and as the fallback when no provider credentials are set.
/// [`InMemoryCalendar::fail_next`] makes the next calls fail with
/// [`CalendarError::Unavailable`]; failed calls are still recorded.
#[derive(Debug, Default)]
pub struct InMemoryCalendar {
    state: Mutex<State>,
}

impl InMemoryCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, calls: usize) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_next = calls;
        }
    }

    pub fn calls(&self) -> Vec<CalendarCall> {
        self.state.lock().map(|s| s.calls.clone()).unwrap_or_default()
    }

    pub fn delete_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, CalendarCall::Delete { .. }))
            .count()
    }

    pub fn event(&self, calendar_id: &str, event_id: &str) -> Option<EventDetails> {
        let state = self.state.lock().ok()?;
        state
            .events
            .get(&(calendar_id.to_string(), event_id.to_string()))
            .cloned()
    }

    pub fn event_count(&self) -> usize {
        self.state.lock().map(|s| s.events.len()).unwrap_or(0)
    }

    fn record(&self, call: CalendarCall) -> Result<std::sync::MutexGuard<'_, State>, CalendarError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| CalendarError::Unavailable("lock poisoned".to_string()))?;
        state.calls.push(call);
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(CalendarError::Unavailable("injected failure".to_string()));
        }
        Ok(state)
    }
}

#[async_trait]
impl CalendarApi for InMemoryCalendar {
    async fn create_event(
        &self,
        calendar_id: &str,
        event: &EventDetails,
    ) -> Result<String, CalendarError> {
        let mut state = self.record(CalendarCall::Create {
            calendar_id: calendar_id.to_string(),
        })?;
        state.next_id += 1;
        let event_id = format!("evt-{}", state.next_id);
        state
            .events
            .insert((calendar_id.to_string(), event_id.clone()), event.clone());
        Ok(event_id)
    }

    async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        event: &EventDetails,
    ) -> Result<(), CalendarError> {
        let mut state = self.record(CalendarCall::Update {
            calendar_id: calendar_id.to_string(),
            event_id: event_id.to_string(),
        })?;
        match state
            .events
            .get_mut(&(calendar_id.to_string(), event_id.to_string()))
        {
            Some(stored) => {
                *stored = event.clone();
                Ok(())
            }
            None => Err(CalendarError::Api {
                status: 404,
                body: format!("event {event_id} not found"),
            }),
        }
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), CalendarError> {
        let mut state = self.record(CalendarCall::Delete {
            calendar_id: calendar_id.to_string(),
            event_id: event_id.to_string(),
        })?;
        state
            .events
            .remove(&(calendar_id.to_string(), event_id.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn details(summary: &str) -> EventDetails {
        let start = Utc::now();
        EventDetails {
            summary: summary.to_string(),
            description: String::new(),
            start,
            end: start + Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn records_calls_and_stores_events() {
        let cal = InMemoryCalendar::new();
        let id = cal.create_event("room1", &details("a")).await.unwrap();
        cal.update_event("room1", &id, &details("b")).await.unwrap();
        assert_eq!(cal.event("room1", &id).unwrap().summary, "b");

        cal.delete_event("room1", &id).await.unwrap();
        assert_eq!(cal.event_count(), 0);
        assert_eq!(cal.delete_calls(), 1);
        assert_eq!(cal.calls().len(), 3);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_in_order() {
        let cal = InMemoryCalendar::new();
        cal.fail_next(1);
        assert!(cal.create_event("room1", &details("a")).await.is_err());
        assert!(cal.create_event("room1", &details("a")).await.is_ok());
        assert_eq!(cal.event_count(), 1);
    }

    #[tokio::test]
    async fn updating_unknown_event_fails() {
        let cal = InMemoryCalendar::new();
        let err = cal.update_event("room1", "nope", &details("a")).await.unwrap_err();
        assert!(matches!(err, CalendarError::Api { status: 404, .. }));
    }
}

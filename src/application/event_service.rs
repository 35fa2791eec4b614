use crate::domain::models::CalendarEvent;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::local_store::LocalStore;
use crate::infrastructure::log::CommandLog;
use std::sync::{Arc, Mutex, MutexGuard};

const EVENTS_KEY: &str = "events";

/// Calendar events live entirely in the local store; the persisted copy is
/// the source of truth and is rewritten in full after every mutation.
pub struct EventService<P>
where
    P: LocalStore,
{
    store: Arc<P>,
    events: Mutex<Vec<CalendarEvent>>,
    log: Arc<CommandLog>,
}

impl<P> EventService<P>
where
    P: LocalStore,
{
    pub fn new(store: Arc<P>, log: Arc<CommandLog>) -> Self {
        let events = Self::load(&store, &log);
        Self {
            store,
            events: Mutex::new(events),
            log,
        }
    }

    fn load(store: &Arc<P>, log: &Arc<CommandLog>) -> Vec<CalendarEvent> {
        let raw = match store.read(EVENTS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(error) => {
                log.warn("load_events", &format!("failed reading stored events: {error}"));
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(events) => events,
            Err(error) => {
                log.warn(
                    "load_events",
                    &format!("malformed stored events, starting empty: {error}"),
                );
                Vec::new()
            }
        }
    }

    pub fn events(&self) -> Result<Vec<CalendarEvent>, InfraError> {
        Ok(self.lock_events()?.clone())
    }

    pub fn add_event(&self, event: CalendarEvent) -> Result<Vec<CalendarEvent>, InfraError> {
        event.validate().map_err(InfraError::InvalidConfig)?;

        let snapshot = {
            let mut events = self.lock_events()?;
            events.push(event);
            events.clone()
        };
        self.persist(&snapshot)?;
        self.log
            .info("add_event", &format!("stored {} events", snapshot.len()));
        Ok(snapshot)
    }

    pub fn delete_event(&self, event_id: &str) -> Result<Vec<CalendarEvent>, InfraError> {
        let snapshot = {
            let mut events = self.lock_events()?;
            events.retain(|event| event.id != event_id);
            events.clone()
        };
        self.persist(&snapshot)?;
        self.log
            .info("delete_event", &format!("deleted event_id={event_id}"));
        Ok(snapshot)
    }

    /// Adjusts the date range only; every other field is left untouched.
    /// Unknown ids are ignored without touching the store.
    pub fn update_event_dates(
        &self,
        event_id: &str,
        start: String,
        end: String,
    ) -> Result<Vec<CalendarEvent>, InfraError> {
        let (snapshot, updated) = {
            let mut events = self.lock_events()?;
            let updated = match events.iter_mut().find(|event| event.id == event_id) {
                Some(event) => {
                    event.start = start;
                    event.end = end;
                    true
                }
                None => false,
            };
            (events.clone(), updated)
        };

        if updated {
            self.persist(&snapshot)?;
            self.log.info(
                "update_event_dates",
                &format!("moved event_id={event_id}"),
            );
        }
        Ok(snapshot)
    }

    fn persist(&self, events: &[CalendarEvent]) -> Result<(), InfraError> {
        let payload = serde_json::to_string(events)?;
        self.store.write(EVENTS_KEY, &payload)
    }

    fn lock_events(&self) -> Result<MutexGuard<'_, Vec<CalendarEvent>>, InfraError> {
        self.events
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("event list lock poisoned: {error}")))
    }
}

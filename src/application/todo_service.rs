use crate::domain::models::TodoItem;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::local_store::LocalStore;
use crate::infrastructure::log::CommandLog;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

const TODO_KEY: &str = "todo-tasks";

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TodoFilter {
    #[default]
    All,
    Active,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    pub id: u64,
    pub buffer: String,
}

#[derive(Debug, Default)]
struct TodoState {
    items: Vec<TodoItem>,
    input: String,
    filter: TodoFilter,
    search_query: String,
    editing: Option<EditSession>,
}

/// To-do list with stable item ids. All mutation goes through id lookup on
/// the unfiltered backing list, so an active filter or search can never
/// redirect an edit to the wrong element.
pub struct TodoService<P>
where
    P: LocalStore,
{
    store: Arc<P>,
    state: Mutex<TodoState>,
    next_id: AtomicU64,
    log: Arc<CommandLog>,
    now_provider: NowProvider,
}

impl<P> TodoService<P>
where
    P: LocalStore,
{
    pub fn new(store: Arc<P>, log: Arc<CommandLog>) -> Self {
        let items = Self::load(&store, &log);
        let next_id = items.iter().map(|item| item.id).max().unwrap_or(0) + 1;
        Self {
            store,
            state: Mutex::new(TodoState {
                items,
                ..TodoState::default()
            }),
            next_id: AtomicU64::new(next_id),
            log,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    fn load(store: &Arc<P>, log: &Arc<CommandLog>) -> Vec<TodoItem> {
        let raw = match store.read(TODO_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(error) => {
                log.warn("load_todos", &format!("failed reading stored todos: {error}"));
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(items) => items,
            Err(error) => {
                log.warn(
                    "load_todos",
                    &format!("malformed stored todos, starting empty: {error}"),
                );
                Vec::new()
            }
        }
    }

    pub fn items(&self) -> Result<Vec<TodoItem>, InfraError> {
        Ok(self.lock_state()?.items.clone())
    }

    pub fn set_input(&self, text: &str) -> Result<(), InfraError> {
        self.lock_state()?.input = text.to_string();
        Ok(())
    }

    /// Appends a task from the input buffer. A buffer that trims to nothing
    /// leaves the list unchanged and writes nothing to the store.
    pub fn add_task(&self) -> Result<Vec<TodoItem>, InfraError> {
        let snapshot = {
            let mut state = self.lock_state()?;
            if state.input.trim().is_empty() {
                return Ok(state.items.clone());
            }

            let item = TodoItem {
                id: self.next_id.fetch_add(1, Ordering::Relaxed),
                text: std::mem::take(&mut state.input),
                completed: false,
                created_at: (self.now_provider)(),
            };
            state.items.push(item);
            state.items.clone()
        };
        self.persist(&snapshot)?;
        Ok(snapshot)
    }

    pub fn remove_task(&self, id: u64) -> Result<Vec<TodoItem>, InfraError> {
        let (snapshot, removed) = {
            let mut state = self.lock_state()?;
            let before = state.items.len();
            state.items.retain(|item| item.id != id);
            (state.items.clone(), state.items.len() != before)
        };
        if removed {
            self.persist(&snapshot)?;
        }
        Ok(snapshot)
    }

    pub fn toggle_task(&self, id: u64) -> Result<Vec<TodoItem>, InfraError> {
        let (snapshot, toggled) = {
            let mut state = self.lock_state()?;
            let toggled = match state.items.iter_mut().find(|item| item.id == id) {
                Some(item) => {
                    item.completed = !item.completed;
                    true
                }
                None => false,
            };
            (state.items.clone(), toggled)
        };
        if toggled {
            self.persist(&snapshot)?;
        }
        Ok(snapshot)
    }

    pub fn start_editing(&self, id: u64) -> Result<(), InfraError> {
        let mut state = self.lock_state()?;
        if let Some(item) = state.items.iter().find(|item| item.id == id) {
            let buffer = item.text.clone();
            state.editing = Some(EditSession { id, buffer });
        }
        Ok(())
    }

    pub fn set_edit_buffer(&self, text: &str) -> Result<(), InfraError> {
        let mut state = self.lock_state()?;
        if let Some(session) = state.editing.as_mut() {
            session.buffer = text.to_string();
        }
        Ok(())
    }

    /// Commits the edit buffer only when it trims to something; an empty
    /// buffer keeps the session open. A committed edit exits edit mode and
    /// persists.
    pub fn save_edit(&self) -> Result<Vec<TodoItem>, InfraError> {
        let (snapshot, committed) = {
            let mut state = self.lock_state()?;
            let Some(session) = state.editing.clone() else {
                return Ok(state.items.clone());
            };
            let trimmed = session.buffer.trim();
            if trimmed.is_empty() {
                return Ok(state.items.clone());
            }

            let committed = match state.items.iter_mut().find(|item| item.id == session.id) {
                Some(item) => {
                    item.text = trimmed.to_string();
                    true
                }
                None => false,
            };
            state.editing = None;
            (state.items.clone(), committed)
        };
        if committed {
            self.persist(&snapshot)?;
        }
        Ok(snapshot)
    }

    pub fn cancel_edit(&self) -> Result<(), InfraError> {
        self.lock_state()?.editing = None;
        Ok(())
    }

    pub fn editing(&self) -> Result<Option<EditSession>, InfraError> {
        Ok(self.lock_state()?.editing.clone())
    }

    pub fn set_filter(&self, filter: TodoFilter) -> Result<(), InfraError> {
        self.lock_state()?.filter = filter;
        Ok(())
    }

    pub fn set_search_query(&self, query: &str) -> Result<(), InfraError> {
        self.lock_state()?.search_query = query.to_string();
        Ok(())
    }

    /// Pure view: filter selector first, then a case-insensitive substring
    /// match when a search query is set. Recomputed on every read.
    pub fn filtered_tasks(&self) -> Result<Vec<TodoItem>, InfraError> {
        let state = self.lock_state()?;
        let query = state.search_query.to_lowercase();
        Ok(state
            .items
            .iter()
            .filter(|item| match state.filter {
                TodoFilter::All => true,
                TodoFilter::Active => !item.completed,
                TodoFilter::Completed => item.completed,
            })
            .filter(|item| query.is_empty() || item.text.to_lowercase().contains(&query))
            .cloned()
            .collect())
    }

    pub fn completed_tasks(&self) -> Result<Vec<TodoItem>, InfraError> {
        let state = self.lock_state()?;
        Ok(state.items.iter().filter(|item| item.completed).cloned().collect())
    }

    pub fn active_tasks(&self) -> Result<Vec<TodoItem>, InfraError> {
        let state = self.lock_state()?;
        Ok(state.items.iter().filter(|item| !item.completed).cloned().collect())
    }

    /// Wholesale replacement after a drag-and-drop reorder.
    pub fn reorder_tasks(&self, new_order: Vec<TodoItem>) -> Result<Vec<TodoItem>, InfraError> {
        let highest = new_order.iter().map(|item| item.id).max().unwrap_or(0);
        self.next_id.fetch_max(highest + 1, Ordering::Relaxed);

        let snapshot = {
            let mut state = self.lock_state()?;
            state.items = new_order;
            state.items.clone()
        };
        self.persist(&snapshot)?;
        Ok(snapshot)
    }

    fn persist(&self, items: &[TodoItem]) -> Result<(), InfraError> {
        let payload = serde_json::to_string(items)?;
        self.store.write(TODO_KEY, &payload)
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, TodoState>, InfraError> {
        self.state
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("todo state lock poisoned: {error}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::local_store::InMemoryLocalStore;

    fn fixed_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-02T12:00:00Z")
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn service(store: Arc<InMemoryLocalStore>) -> TodoService<InMemoryLocalStore> {
        let now = fixed_time();
        TodoService::new(store, Arc::new(CommandLog::new(std::env::temp_dir())))
            .with_now_provider(Arc::new(move || now))
    }

    fn add(service: &TodoService<InMemoryLocalStore>, text: &str) -> u64 {
        service.set_input(text).expect("set input");
        let items = service.add_task().expect("add task");
        items.last().expect("item appended").id
    }

    #[test]
    fn add_appends_with_created_at_and_clears_the_input() {
        let store = Arc::new(InMemoryLocalStore::default());
        let service = service(store);

        let id = add(&service, "  buy milk ");
        let items = service.items().expect("items");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, id);
        assert_eq!(items[0].text, "  buy milk ");
        assert!(!items[0].completed);
        assert_eq!(items[0].created_at, fixed_time());

        let second = service.add_task().expect("add with cleared input");
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn whitespace_only_input_is_a_no_op_and_does_not_persist() {
        let store = Arc::new(InMemoryLocalStore::default());
        let service = service(Arc::clone(&store));

        service.set_input("   \t").expect("set input");
        let items = service.add_task().expect("add task");
        assert!(items.is_empty());
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn persisted_list_round_trips_into_a_fresh_service() {
        let store = Arc::new(InMemoryLocalStore::default());
        let original = {
            let service = service(Arc::clone(&store));
            add(&service, "first");
            add(&service, "second");
            let id = add(&service, "third");
            service.toggle_task(id).expect("toggle third");
            service.items().expect("items")
        };

        let reloaded = service(Arc::clone(&store));
        assert_eq!(reloaded.items().expect("items"), original);
    }

    #[test]
    fn reloaded_service_keeps_allocating_unique_ids() {
        let store = Arc::new(InMemoryLocalStore::default());
        let existing: Vec<u64> = {
            let service = service(Arc::clone(&store));
            vec![add(&service, "first"), add(&service, "second")]
        };

        let reloaded = service(Arc::clone(&store));
        let fresh = add(&reloaded, "third");
        assert!(!existing.contains(&fresh));
    }

    #[test]
    fn mutation_by_id_survives_an_active_filter() {
        let store = Arc::new(InMemoryLocalStore::default());
        let service = service(store);
        let first = add(&service, "write tests");
        let second = add(&service, "write tests");
        service.toggle_task(first).expect("complete first");

        service.set_filter(TodoFilter::Active).expect("set filter");
        let visible = service.filtered_tasks().expect("filtered");
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, second);

        service.toggle_task(visible[0].id).expect("toggle visible");
        let items = service.items().expect("items");
        assert!(items.iter().find(|item| item.id == second).expect("second").completed);
        assert!(items.iter().find(|item| item.id == first).expect("first").completed);
    }

    #[test]
    fn unknown_ids_do_not_mutate_or_persist() {
        let store = Arc::new(InMemoryLocalStore::default());
        let service = service(Arc::clone(&store));
        add(&service, "only");
        let writes_before = store.write_count();

        service.remove_task(404).expect("remove unknown");
        service.toggle_task(404).expect("toggle unknown");
        assert_eq!(service.items().expect("items").len(), 1);
        assert_eq!(store.write_count(), writes_before);
    }

    #[test]
    fn filtered_tasks_applies_filter_then_case_insensitive_search() {
        let store = Arc::new(InMemoryLocalStore::default());
        let service = service(store);
        let done_match = add(&service, "Read ABC draft");
        add(&service, "read abc draft again");
        let done_miss = add(&service, "Ship release");
        service.toggle_task(done_match).expect("complete match");
        service.toggle_task(done_miss).expect("complete miss");

        service.set_filter(TodoFilter::Completed).expect("set filter");
        service.set_search_query("abc").expect("set query");

        let visible = service.filtered_tasks().expect("filtered");
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, done_match);
    }

    #[test]
    fn edit_session_commits_trimmed_text_and_exits() {
        let store = Arc::new(InMemoryLocalStore::default());
        let service = service(Arc::clone(&store));
        let id = add(&service, "original");

        service.start_editing(id).expect("start editing");
        assert_eq!(
            service.editing().expect("editing").expect("session").buffer,
            "original"
        );

        service.set_edit_buffer("  revised  ").expect("set buffer");
        let items = service.save_edit().expect("save edit");
        assert_eq!(items[0].text, "revised");
        assert!(service.editing().expect("editing").is_none());

        let raw = store.read(TODO_KEY).expect("read").expect("stored");
        let stored: Vec<TodoItem> = serde_json::from_str(&raw).expect("parse stored");
        assert_eq!(stored[0].text, "revised");
    }

    #[test]
    fn empty_edit_buffer_keeps_the_session_open() {
        let store = Arc::new(InMemoryLocalStore::default());
        let service = service(Arc::clone(&store));
        let id = add(&service, "original");
        let writes_before = store.write_count();

        service.start_editing(id).expect("start editing");
        service.set_edit_buffer("   ").expect("set buffer");
        service.save_edit().expect("save edit");

        assert!(service.editing().expect("editing").is_some());
        assert_eq!(service.items().expect("items")[0].text, "original");
        assert_eq!(store.write_count(), writes_before);
    }

    #[test]
    fn cancel_edit_discards_the_buffer_without_persisting() {
        let store = Arc::new(InMemoryLocalStore::default());
        let service = service(Arc::clone(&store));
        let id = add(&service, "original");
        let writes_before = store.write_count();

        service.start_editing(id).expect("start editing");
        service.set_edit_buffer("discarded").expect("set buffer");
        service.cancel_edit().expect("cancel edit");

        assert!(service.editing().expect("editing").is_none());
        assert_eq!(service.items().expect("items")[0].text, "original");
        assert_eq!(store.write_count(), writes_before);
    }

    #[test]
    fn reorder_replaces_the_backing_list_wholesale() {
        let store = Arc::new(InMemoryLocalStore::default());
        let service = service(Arc::clone(&store));
        add(&service, "first");
        add(&service, "second");

        let mut reversed = service.items().expect("items");
        reversed.reverse();
        let reordered = service.reorder_tasks(reversed.clone()).expect("reorder");
        assert_eq!(reordered, reversed);

        let raw = store.read(TODO_KEY).expect("read").expect("stored");
        let stored: Vec<TodoItem> = serde_json::from_str(&raw).expect("parse stored");
        assert_eq!(stored, reversed);
    }

    #[test]
    fn malformed_stored_payload_falls_back_to_empty() {
        let store = Arc::new(InMemoryLocalStore::with_entry(TODO_KEY, "[{bad"));
        let service = service(store);
        assert!(service.items().expect("items").is_empty());
    }
}

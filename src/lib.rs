mod application;
mod domain;
mod infrastructure;

use application::bootstrap::bootstrap_workspace;
use application::dashboard_service::{DashboardService, DashboardState, DeadlineView};
use application::event_service::EventService;
use application::settings_service::{ResolvedTheme, SettingsService};
use application::task_service::{TaskService, TaskView};
use application::todo_service::{TodoFilter, TodoService};
use domain::models::{
    CalendarEvent, NotificationSettings, Settings, TaskRecord, ThemeUpdate, TodoItem,
};
use infrastructure::error::InfraError;
use infrastructure::local_store::JsonFileLocalStore;
use infrastructure::log::CommandLog;
use infrastructure::notifier::{LogNotificationGateway, NotificationPermission};
use infrastructure::task_api_client::{ReqwestTaskApiClient, TaskDraft};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

struct AppState {
    log: Arc<CommandLog>,
    tasks: TaskService<ReqwestTaskApiClient>,
    events: EventService<JsonFileLocalStore>,
    todos: TodoService<JsonFileLocalStore>,
    settings: SettingsService<JsonFileLocalStore, LogNotificationGateway>,
    dashboard: DashboardService<ReqwestTaskApiClient>,
}

impl AppState {
    fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let log = Arc::new(CommandLog::new(&bootstrap.logs_dir));
        let store = Arc::new(JsonFileLocalStore::new(&bootstrap.state_dir));
        let client = Arc::new(ReqwestTaskApiClient::new());
        let gateway = Arc::new(LogNotificationGateway::new(
            NotificationPermission::Denied,
            Arc::clone(&log),
        ));

        Ok(Self {
            tasks: TaskService::new(Arc::clone(&client), Arc::clone(&log)),
            events: EventService::new(Arc::clone(&store), Arc::clone(&log)),
            todos: TodoService::new(Arc::clone(&store), Arc::clone(&log)),
            settings: SettingsService::new(store, gateway, Arc::clone(&log)),
            dashboard: DashboardService::new(client, Arc::clone(&log)),
            log,
        })
    }

    fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log.error(command, &error.to_string());
        error.to_string()
    }
}

#[derive(Debug, Serialize)]
struct BootstrapResponse {
    workspace_root: String,
    state_dir: String,
}

#[derive(Debug, Serialize)]
struct GreetingResponse {
    greeting: String,
    #[serde(rename = "themeGradient")]
    theme_gradient: String,
}

#[tauri::command]
fn bootstrap(root: Option<String>) -> Result<BootstrapResponse, String> {
    let workspace_root = match root {
        Some(path) => PathBuf::from(path),
        None => std::env::current_dir().map_err(|error| error.to_string())?,
    };

    let result = bootstrap_workspace(&workspace_root).map_err(|error| error.to_string())?;
    Ok(BootstrapResponse {
        workspace_root: result.workspace_root.display().to_string(),
        state_dir: result.state_dir.display().to_string(),
    })
}

#[tauri::command]
fn ping() -> &'static str {
    "pong"
}

#[tauri::command]
async fn fetch_tasks(state: tauri::State<'_, AppState>) -> Result<Vec<TaskView>, String> {
    match state.tasks.fetch_tasks().await {
        Ok(tasks) => Ok(tasks),
        Err(error) => {
            state.command_error("fetch_tasks", &error);
            state
                .tasks
                .tasks()
                .map_err(|error| state.command_error("fetch_tasks", &error))
        }
    }
}

#[tauri::command]
fn list_tasks(state: tauri::State<'_, AppState>) -> Result<Vec<TaskView>, String> {
    state
        .tasks
        .tasks()
        .map_err(|error| state.command_error("list_tasks", &error))
}

#[tauri::command]
async fn add_task(
    state: tauri::State<'_, AppState>,
    draft: TaskDraft,
) -> Result<TaskView, String> {
    state
        .tasks
        .add_task(draft)
        .await
        .map_err(|error| state.command_error("add_task", &error))
}

#[tauri::command]
async fn save_task(
    state: tauri::State<'_, AppState>,
    task_id: i64,
    updated_task: TaskView,
) -> Result<Vec<TaskView>, String> {
    match state.tasks.save_task(task_id, updated_task).await {
        Ok(tasks) => Ok(tasks),
        Err(error) => {
            state.command_error("save_task", &error);
            state
                .tasks
                .tasks()
                .map_err(|error| state.command_error("save_task", &error))
        }
    }
}

#[tauri::command]
async fn delete_task(state: tauri::State<'_, AppState>, task_id: i64) -> Result<Vec<TaskView>, String> {
    if let Err(error) = state.tasks.delete_task(task_id).await {
        state.command_error("delete_task", &error);
    }
    state
        .tasks
        .tasks()
        .map_err(|error| state.command_error("delete_task", &error))
}

#[tauri::command]
async fn mark_task_as_complete(
    state: tauri::State<'_, AppState>,
    task: TaskRecord,
) -> Result<Vec<TaskView>, String> {
    match state.tasks.mark_task_as_complete(task).await {
        Ok(tasks) => Ok(tasks),
        Err(error) => {
            state.command_error("mark_task_as_complete", &error);
            state
                .tasks
                .tasks()
                .map_err(|error| state.command_error("mark_task_as_complete", &error))
        }
    }
}

#[tauri::command]
async fn restore_task(
    state: tauri::State<'_, AppState>,
    task_id: i64,
) -> Result<Vec<TaskView>, String> {
    match state.tasks.restore_task(task_id).await {
        Ok(tasks) => Ok(tasks),
        Err(error) => {
            state.command_error("restore_task", &error);
            state
                .tasks
                .tasks()
                .map_err(|error| state.command_error("restore_task", &error))
        }
    }
}

#[tauri::command]
async fn start_task_countdown(state: tauri::State<'_, AppState>) -> Result<(), String> {
    state.tasks.start_countdown();
    Ok(())
}

#[tauri::command]
async fn stop_task_countdown(state: tauri::State<'_, AppState>) -> Result<(), String> {
    state.tasks.stop_countdown();
    Ok(())
}

#[tauri::command]
fn list_events(state: tauri::State<'_, AppState>) -> Result<Vec<CalendarEvent>, String> {
    state
        .events
        .events()
        .map_err(|error| state.command_error("list_events", &error))
}

#[tauri::command]
fn add_event(
    state: tauri::State<'_, AppState>,
    event: CalendarEvent,
) -> Result<Vec<CalendarEvent>, String> {
    state.tasks.add_event(&event);
    state
        .events
        .add_event(event)
        .map_err(|error| state.command_error("add_event", &error))
}

#[tauri::command]
fn delete_event(
    state: tauri::State<'_, AppState>,
    event_id: String,
) -> Result<Vec<CalendarEvent>, String> {
    state
        .events
        .delete_event(&event_id)
        .map_err(|error| state.command_error("delete_event", &error))
}

#[tauri::command]
fn update_event_dates(
    state: tauri::State<'_, AppState>,
    event_id: String,
    new_start: String,
    new_end: String,
) -> Result<Vec<CalendarEvent>, String> {
    state
        .events
        .update_event_dates(&event_id, new_start, new_end)
        .map_err(|error| state.command_error("update_event_dates", &error))
}

#[tauri::command]
fn list_todos(state: tauri::State<'_, AppState>) -> Result<Vec<TodoItem>, String> {
    state
        .todos
        .items()
        .map_err(|error| state.command_error("list_todos", &error))
}

#[tauri::command]
fn list_filtered_todos(state: tauri::State<'_, AppState>) -> Result<Vec<TodoItem>, String> {
    state
        .todos
        .filtered_tasks()
        .map_err(|error| state.command_error("list_filtered_todos", &error))
}

#[tauri::command]
fn add_todo(state: tauri::State<'_, AppState>, text: String) -> Result<Vec<TodoItem>, String> {
    state
        .todos
        .set_input(&text)
        .and_then(|_| state.todos.add_task())
        .map_err(|error| state.command_error("add_todo", &error))
}

#[tauri::command]
fn remove_todo(state: tauri::State<'_, AppState>, id: u64) -> Result<Vec<TodoItem>, String> {
    state
        .todos
        .remove_task(id)
        .map_err(|error| state.command_error("remove_todo", &error))
}

#[tauri::command]
fn toggle_todo(state: tauri::State<'_, AppState>, id: u64) -> Result<Vec<TodoItem>, String> {
    state
        .todos
        .toggle_task(id)
        .map_err(|error| state.command_error("toggle_todo", &error))
}

#[tauri::command]
fn start_todo_edit(state: tauri::State<'_, AppState>, id: u64) -> Result<(), String> {
    state
        .todos
        .start_editing(id)
        .map_err(|error| state.command_error("start_todo_edit", &error))
}

#[tauri::command]
fn save_todo_edit(
    state: tauri::State<'_, AppState>,
    buffer: String,
) -> Result<Vec<TodoItem>, String> {
    state
        .todos
        .set_edit_buffer(&buffer)
        .and_then(|_| state.todos.save_edit())
        .map_err(|error| state.command_error("save_todo_edit", &error))
}

#[tauri::command]
fn cancel_todo_edit(state: tauri::State<'_, AppState>) -> Result<(), String> {
    state
        .todos
        .cancel_edit()
        .map_err(|error| state.command_error("cancel_todo_edit", &error))
}

#[tauri::command]
fn set_todo_filter(state: tauri::State<'_, AppState>, filter: TodoFilter) -> Result<(), String> {
    state
        .todos
        .set_filter(filter)
        .map_err(|error| state.command_error("set_todo_filter", &error))
}

#[tauri::command]
fn set_todo_search(state: tauri::State<'_, AppState>, query: String) -> Result<(), String> {
    state
        .todos
        .set_search_query(&query)
        .map_err(|error| state.command_error("set_todo_search", &error))
}

#[tauri::command]
fn reorder_todos(
    state: tauri::State<'_, AppState>,
    new_order: Vec<TodoItem>,
) -> Result<Vec<TodoItem>, String> {
    state
        .todos
        .reorder_tasks(new_order)
        .map_err(|error| state.command_error("reorder_todos", &error))
}

#[tauri::command]
fn get_settings(state: tauri::State<'_, AppState>) -> Result<Settings, String> {
    state
        .settings
        .settings()
        .map_err(|error| state.command_error("get_settings", &error))
}

#[tauri::command]
async fn load_settings(state: tauri::State<'_, AppState>) -> Result<Settings, String> {
    state
        .settings
        .load_settings()
        .map_err(|error| state.command_error("load_settings", &error))
}

#[tauri::command]
async fn save_settings(
    state: tauri::State<'_, AppState>,
    notifications: Option<NotificationSettings>,
) -> Result<Settings, String> {
    let result = match notifications {
        Some(notifications) => state.settings.update_notifications(notifications),
        None => state.settings.save_settings(),
    };
    result.map_err(|error| state.command_error("save_settings", &error))?;
    state
        .settings
        .settings()
        .map_err(|error| state.command_error("save_settings", &error))
}

#[tauri::command]
async fn set_theme(
    state: tauri::State<'_, AppState>,
    config: ThemeUpdate,
) -> Result<ResolvedTheme, String> {
    state
        .settings
        .set_theme(config)
        .map_err(|error| state.command_error("set_theme", &error))
}

#[tauri::command]
fn apply_theme(state: tauri::State<'_, AppState>) -> Result<ResolvedTheme, String> {
    state
        .settings
        .apply_theme()
        .map_err(|error| state.command_error("apply_theme", &error))
}

#[tauri::command]
fn send_notification(state: tauri::State<'_, AppState>) -> Result<(), String> {
    state
        .settings
        .send_notification()
        .map_err(|error| state.command_error("send_notification", &error))
}

#[tauri::command]
fn set_greeting(state: tauri::State<'_, AppState>) -> Result<GreetingResponse, String> {
    let (greeting, theme_gradient) = state
        .dashboard
        .set_greeting()
        .map_err(|error| state.command_error("set_greeting", &error))?;
    Ok(GreetingResponse {
        greeting,
        theme_gradient,
    })
}

#[tauri::command]
async fn fetch_upcoming_deadlines(
    state: tauri::State<'_, AppState>,
    days: Option<u32>,
) -> Result<Vec<DeadlineView>, String> {
    match state.dashboard.fetch_upcoming_deadlines(days).await {
        Ok(deadlines) => Ok(deadlines),
        Err(error) => {
            state.command_error("fetch_upcoming_deadlines", &error);
            state
                .dashboard
                .snapshot()
                .map(|snapshot| snapshot.upcoming_deadlines)
                .map_err(|error| state.command_error("fetch_upcoming_deadlines", &error))
        }
    }
}

#[tauri::command]
async fn reset_inactivity(state: tauri::State<'_, AppState>) -> Result<(), String> {
    state
        .dashboard
        .reset_inactivity_timer()
        .map_err(|error| state.command_error("reset_inactivity", &error))
}

#[tauri::command]
async fn stop_inactivity(state: tauri::State<'_, AppState>) -> Result<(), String> {
    state.dashboard.stop_inactivity_timer();
    Ok(())
}

#[tauri::command]
async fn start_quote_rotation(state: tauri::State<'_, AppState>) -> Result<String, String> {
    state
        .dashboard
        .start_quote_rotation()
        .map_err(|error| state.command_error("start_quote_rotation", &error))
}

#[tauri::command]
async fn stop_quote_rotation(state: tauri::State<'_, AppState>) -> Result<(), String> {
    state.dashboard.stop_quote_rotation();
    Ok(())
}

#[tauri::command]
fn toggle_chatbot(state: tauri::State<'_, AppState>) -> Result<bool, String> {
    state
        .dashboard
        .toggle_chatbot()
        .map_err(|error| state.command_error("toggle_chatbot", &error))
}

#[tauri::command]
fn add_chat_message(state: tauri::State<'_, AppState>, message: String) -> Result<usize, String> {
    state
        .dashboard
        .add_chat_message(message)
        .map_err(|error| state.command_error("add_chat_message", &error))
}

#[tauri::command]
fn dashboard_snapshot(state: tauri::State<'_, AppState>) -> Result<DashboardState, String> {
    state
        .dashboard
        .snapshot()
        .map_err(|error| state.command_error("dashboard_snapshot", &error))
}

pub fn run() {
    let workspace_root = std::env::current_dir().expect("failed to resolve current directory");
    let app_state = AppState::new(workspace_root).expect("failed to initialize app state");

    tauri::Builder::default()
        .manage(app_state)
        .invoke_handler(tauri::generate_handler![
            ping,
            bootstrap,
            fetch_tasks,
            list_tasks,
            add_task,
            save_task,
            delete_task,
            mark_task_as_complete,
            restore_task,
            start_task_countdown,
            stop_task_countdown,
            list_events,
            add_event,
            delete_event,
            update_event_dates,
            list_todos,
            list_filtered_todos,
            add_todo,
            remove_todo,
            toggle_todo,
            start_todo_edit,
            save_todo_edit,
            cancel_todo_edit,
            set_todo_filter,
            set_todo_search,
            reorder_todos,
            get_settings,
            load_settings,
            save_settings,
            set_theme,
            apply_theme,
            send_notification,
            set_greeting,
            fetch_upcoming_deadlines,
            reset_inactivity,
            stop_inactivity,
            start_quote_rotation,
            stop_quote_rotation,
            toggle_chatbot,
            add_chat_message,
            dashboard_snapshot
        ])
        .run(tauri::generate_context!())
        .expect("failed to run tauri app");
}

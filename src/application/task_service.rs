use crate::domain::models::{CalendarEvent, PriorityClass, TaskRecord};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::log::CommandLog;
use crate::infrastructure::task_api_client::{TaskApiClient, TaskDraft};
use crate::infrastructure::timer::TimerSlot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::{Duration as TokioDuration, interval};

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

const MS_PER_SECOND: i64 = 1_000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// Task record plus the client-side derived fields. The derived fields are
/// never sent back to the API; they are recomputed on every fetch and every
/// countdown tick from `end_date`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskView {
    #[serde(flatten)]
    pub record: TaskRecord,
    #[serde(rename = "startDate")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(rename = "dueDate")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(rename = "remainingTime")]
    pub remaining_time: Option<String>,
    #[serde(rename = "priorityClass", default)]
    pub priority_class: PriorityClass,
}

pub fn calculate_remaining_time(due: DateTime<Utc>, now: DateTime<Utc>) -> Option<String> {
    let diff_ms = (due - now).num_milliseconds();
    if diff_ms <= 0 {
        return None;
    }

    let days = diff_ms / MS_PER_DAY;
    let hours = (diff_ms % MS_PER_DAY) / MS_PER_HOUR;
    let minutes = (diff_ms % MS_PER_HOUR) / MS_PER_MINUTE;
    let seconds = (diff_ms % MS_PER_MINUTE) / MS_PER_SECOND;

    Some(format!("{days}d {hours}h {minutes}m {seconds}s"))
}

pub fn calculate_priority(due: Option<DateTime<Utc>>, now: DateTime<Utc>) -> PriorityClass {
    let Some(due) = due else {
        return PriorityClass::None;
    };

    let diff_in_days = (due - now).num_milliseconds().div_euclid(MS_PER_DAY);
    if diff_in_days <= 1 {
        PriorityClass::High
    } else if diff_in_days <= 3 {
        PriorityClass::Medium
    } else {
        PriorityClass::Low
    }
}

pub struct TaskService<C>
where
    C: TaskApiClient,
{
    client: Arc<C>,
    tasks: Arc<Mutex<Vec<TaskView>>>,
    countdown: TimerSlot,
    log: Arc<CommandLog>,
    now_provider: NowProvider,
}

impl<C> TaskService<C>
where
    C: TaskApiClient,
{
    pub fn new(client: Arc<C>, log: Arc<CommandLog>) -> Self {
        Self {
            client,
            tasks: Arc::new(Mutex::new(Vec::new())),
            countdown: TimerSlot::default(),
            log,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn tasks(&self) -> Result<Vec<TaskView>, InfraError> {
        Ok(self.lock_tasks()?.clone())
    }

    pub async fn fetch_tasks(&self) -> Result<Vec<TaskView>, InfraError> {
        let records = self.client.list(None).await?;
        let now = (self.now_provider)();
        let views = records
            .into_iter()
            .map(|record| Self::to_view(record, now))
            .collect::<Vec<_>>();

        {
            let mut tasks = self.lock_tasks()?;
            *tasks = views.clone();
        }
        self.log
            .info("fetch_tasks", &format!("replaced {} tasks", views.len()));
        Ok(views)
    }

    pub fn start_countdown(&self) {
        let tasks = Arc::clone(&self.tasks);
        let now_provider = Arc::clone(&self.now_provider);

        let handle = tokio::spawn(async move {
            let mut tick = interval(TokioDuration::from_secs(1));
            loop {
                tick.tick().await;
                let now = now_provider();
                let Ok(mut tasks) = tasks.lock() else {
                    break;
                };
                for task in tasks.iter_mut() {
                    task.remaining_time = task
                        .record
                        .end_date
                        .and_then(|due| calculate_remaining_time(due, now));
                }
            }
        });

        self.countdown.arm(handle);
    }

    pub fn stop_countdown(&self) {
        self.countdown.disarm();
    }

    pub fn is_countdown_running(&self) -> bool {
        self.countdown.is_armed()
    }

    pub async fn add_task(&self, draft: TaskDraft) -> Result<TaskView, InfraError> {
        if draft.title.trim().is_empty() {
            return Err(InfraError::InvalidConfig(
                "title must not be empty".to_string(),
            ));
        }

        let created = self.client.create(&draft).await?;
        let view = Self::to_view(created, (self.now_provider)());
        {
            let mut tasks = self.lock_tasks()?;
            tasks.push(view.clone());
        }
        self.log
            .info("add_task", &format!("created task_id={}", view.record.id));
        Ok(view)
    }

    pub async fn delete_task(&self, task_id: i64) -> Result<(), InfraError> {
        self.client.delete(task_id).await?;
        {
            let mut tasks = self.lock_tasks()?;
            tasks.retain(|task| task.record.id != task_id);
        }
        self.log
            .info("delete_task", &format!("deleted task_id={task_id}"));
        Ok(())
    }

    /// Full-replace save: the view-model `start_date`/`due_date` fields are
    /// remapped onto the wire `start_date`/`end_date` before the PUT, then
    /// the whole list is re-fetched to resync derived fields.
    pub async fn save_task(
        &self,
        task_id: i64,
        updated: TaskView,
    ) -> Result<Vec<TaskView>, InfraError> {
        let mut record = updated.record;
        record.id = task_id;
        record.start_date = updated.start_date;
        record.end_date = updated.due_date;

        self.client.replace(task_id, &record).await?;
        self.log
            .info("save_task", &format!("updated task_id={task_id}"));
        self.fetch_tasks().await
    }

    pub async fn mark_task_as_complete(
        &self,
        mut record: TaskRecord,
    ) -> Result<Vec<TaskView>, InfraError> {
        record.is_completed = true;
        {
            let mut tasks = self.lock_tasks()?;
            if let Some(task) = tasks.iter_mut().find(|task| task.record.id == record.id) {
                task.record.is_completed = true;
            }
        }

        self.client.replace(record.id, &record).await?;
        self.log.info(
            "mark_task_as_complete",
            &format!("completed task_id={}", record.id),
        );
        self.fetch_tasks().await
    }

    pub async fn restore_task(&self, task_id: i64) -> Result<Vec<TaskView>, InfraError> {
        let record = {
            let mut tasks = self.lock_tasks()?;
            let Some(task) = tasks.iter_mut().find(|task| task.record.id == task_id) else {
                return Ok(tasks.clone());
            };
            task.record.is_completed = false;
            task.record.clone()
        };

        self.client.replace(task_id, &record).await?;
        self.log
            .info("restore_task", &format!("restored task_id={task_id}"));
        self.fetch_tasks().await
    }

    /// Informational only: calendar events belong to the event service.
    pub fn add_event(&self, event: &CalendarEvent) {
        self.log
            .info("add_event", &format!("event added to calendar: id={}", event.id));
    }

    fn to_view(record: TaskRecord, now: DateTime<Utc>) -> TaskView {
        let remaining_time = record
            .end_date
            .and_then(|due| calculate_remaining_time(due, now));
        let priority_class = calculate_priority(record.end_date, now);
        TaskView {
            start_date: record.start_date,
            due_date: record.end_date,
            remaining_time,
            priority_class,
            record,
        }
    }

    fn lock_tasks(&self) -> Result<MutexGuard<'_, Vec<TaskView>>, InfraError> {
        self.tasks
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("task list lock poisoned: {error}")))
    }
}

use crate::domain::models::TaskRecord;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::log::CommandLog;
use crate::infrastructure::task_api_client::TaskApiClient;
use crate::infrastructure::timer::TimerSlot;
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::{Duration as TokioDuration, interval};

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1_000;

const QUOTES: [&str; 3] = [
    "Dream it. Wish it. Do it",
    "Stay focused and never give up.",
    "Believe in yourself and all that you are.",
];

const MORNING_GRADIENT: &str = "linear-gradient(135deg, #FFDEE9, #B5FFFC)";
const AFTERNOON_GRADIENT: &str = "linear-gradient(135deg, #FFF1EB, #ACE0F9)";
const EVENING_GRADIENT: &str = "linear-gradient(135deg, #667eea, #764ba2)";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeadlineView {
    #[serde(flatten)]
    pub record: TaskRecord,
    #[serde(rename = "formattedDate")]
    pub formatted_date: String,
    #[serde(rename = "formattedTime")]
    pub formatted_time: String,
    #[serde(rename = "daysLeft")]
    pub days_left: i64,
}

#[derive(Debug, Clone, Serialize, Default, PartialEq, Eq)]
pub struct DashboardState {
    pub greeting: String,
    #[serde(rename = "themeGradient")]
    pub theme_gradient: String,
    #[serde(rename = "upcomingDeadlines")]
    pub upcoming_deadlines: Vec<DeadlineView>,
    #[serde(rename = "chatHistory")]
    pub chat_history: Vec<String>,
    #[serde(rename = "isChatbotOpen")]
    pub is_chatbot_open: bool,
    #[serde(rename = "lastActiveTime")]
    pub last_active_time: Option<DateTime<Utc>>,
    #[serde(rename = "inactivitySeconds")]
    pub inactivity_seconds: i64,
    #[serde(rename = "motivationalQuote")]
    pub motivational_quote: String,
    #[serde(rename = "quoteIndex")]
    pub quote_index: usize,
}

pub fn format_date(date: Option<DateTime<Utc>>) -> String {
    match date {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => "Invalid Date".to_string(),
    }
}

/// Renders an "HH:MM[:SS]" time as 12-hour "h:MM AM/PM". Anything that does
/// not look like hours-and-minutes is returned unchanged.
pub fn format_time(time: Option<&str>) -> String {
    let Some(time) = time.filter(|value| !value.is_empty()) else {
        return "No time set".to_string();
    };

    let parts: Vec<&str> = time.split(':').collect();
    if parts.len() < 2 {
        return time.to_string();
    }
    let Ok(hours) = parts[0].parse::<u32>() else {
        return time.to_string();
    };

    let meridiem = if hours >= 12 { "PM" } else { "AM" };
    let display_hours = match hours % 12 {
        0 => 12,
        other => other,
    };
    format!("{display_hours}:{} {meridiem}", parts[1])
}

/// Whole days until the due date, rounded up, never negative.
pub fn calculate_days_left(end_date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    let Some(end_date) = end_date else {
        return 0;
    };
    let diff_ms = (end_date - now).num_milliseconds();
    let days_left = (diff_ms as f64 / MS_PER_DAY as f64).ceil() as i64;
    days_left.max(0)
}

pub(crate) fn next_quote_index(index: usize) -> usize {
    (index + 1) % QUOTES.len()
}

pub struct DashboardService<C>
where
    C: TaskApiClient,
{
    client: Arc<C>,
    state: Arc<Mutex<DashboardState>>,
    inactivity: TimerSlot,
    quotes: TimerSlot,
    log: Arc<CommandLog>,
    now_provider: NowProvider,
}

impl<C> DashboardService<C>
where
    C: TaskApiClient,
{
    pub fn new(client: Arc<C>, log: Arc<CommandLog>) -> Self {
        Self {
            client,
            state: Arc::new(Mutex::new(DashboardState::default())),
            inactivity: TimerSlot::default(),
            quotes: TimerSlot::default(),
            log,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn snapshot(&self) -> Result<DashboardState, InfraError> {
        Ok(self.lock_state()?.clone())
    }

    pub fn set_greeting(&self) -> Result<(String, String), InfraError> {
        let hour = (self.now_provider)().hour();
        let (greeting, gradient) = if hour < 12 {
            ("Good morning", MORNING_GRADIENT)
        } else if hour < 18 {
            ("Good afternoon", AFTERNOON_GRADIENT)
        } else {
            ("Good evening", EVENING_GRADIENT)
        };

        let mut state = self.lock_state()?;
        state.greeting = greeting.to_string();
        state.theme_gradient = gradient.to_string();
        Ok((state.greeting.clone(), state.theme_gradient.clone()))
    }

    pub async fn fetch_upcoming_deadlines(
        &self,
        days: Option<u32>,
    ) -> Result<Vec<DeadlineView>, InfraError> {
        let records = self.client.list(days).await?;
        let now = (self.now_provider)();
        let views = records
            .into_iter()
            .map(|record| DeadlineView {
                formatted_date: format_date(record.end_date),
                formatted_time: format_time(record.due_time.as_deref()),
                days_left: calculate_days_left(record.end_date, now),
                record,
            })
            .collect::<Vec<_>>();

        self.lock_state()?.upcoming_deadlines = views.clone();
        self.log.info(
            "fetch_upcoming_deadlines",
            &format!("loaded {} deadlines", views.len()),
        );
        Ok(views)
    }

    /// Stamps last-active to now and restarts the 1-second elapsed clock.
    pub fn reset_inactivity_timer(&self) -> Result<(), InfraError> {
        let now = (self.now_provider)();
        {
            let mut state = self.lock_state()?;
            state.last_active_time = Some(now);
            state.inactivity_seconds = 0;
        }

        let state = Arc::clone(&self.state);
        let now_provider = Arc::clone(&self.now_provider);
        let handle = tokio::spawn(async move {
            let mut tick = interval(TokioDuration::from_secs(1));
            loop {
                tick.tick().await;
                let now = now_provider();
                let Ok(mut state) = state.lock() else {
                    break;
                };
                if let Some(last_active) = state.last_active_time {
                    state.inactivity_seconds = (now - last_active).num_seconds();
                }
            }
        });
        self.inactivity.arm(handle);
        Ok(())
    }

    pub fn stop_inactivity_timer(&self) {
        self.inactivity.disarm();
    }

    pub fn start_quote_rotation(&self) -> Result<String, InfraError> {
        let first = {
            let mut state = self.lock_state()?;
            state.motivational_quote = QUOTES[state.quote_index].to_string();
            state.motivational_quote.clone()
        };

        let state = Arc::clone(&self.state);
        let handle = tokio::spawn(async move {
            let mut tick = interval(TokioDuration::from_secs(5));
            tick.tick().await;
            loop {
                tick.tick().await;
                let Ok(mut state) = state.lock() else {
                    break;
                };
                state.quote_index = next_quote_index(state.quote_index);
                state.motivational_quote = QUOTES[state.quote_index].to_string();
            }
        });
        self.quotes.arm(handle);
        Ok(first)
    }

    pub fn stop_quote_rotation(&self) {
        self.quotes.disarm();
    }

    pub fn toggle_chatbot(&self) -> Result<bool, InfraError> {
        let mut state = self.lock_state()?;
        state.is_chatbot_open = !state.is_chatbot_open;
        Ok(state.is_chatbot_open)
    }

    pub fn add_chat_message(&self, message: String) -> Result<usize, InfraError> {
        let mut state = self.lock_state()?;
        state.chat_history.push(message);
        Ok(state.chat_history.len())
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, DashboardState>, InfraError> {
        self.state
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("dashboard lock poisoned: {error}")))
    }
}

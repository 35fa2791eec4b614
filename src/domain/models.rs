use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subtask {
    pub title: String,
    #[serde(default)]
    pub is_completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskRecord {
    pub id: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(rename = "dueTime", default, skip_serializing_if = "Option::is_none")]
    pub due_time: Option<String>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

impl TaskRecord {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.title, "task.title")?;
        if let Some(due_time) = self.due_time.as_deref() {
            validate_hhmm_or_hhmmss(due_time, "task.dueTime")?;
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err("task.end_date must not be before task.start_date".to_string());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PriorityClass {
    #[serde(rename = "priority-high")]
    High,
    #[serde(rename = "priority-medium")]
    Medium,
    #[serde(rename = "priority-low")]
    Low,
    #[serde(rename = "")]
    #[default]
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarEvent {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub start: String,
    pub end: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl CalendarEvent {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "event.id")?;
        validate_non_empty(&self.start, "event.start")?;
        validate_non_empty(&self.end, "event.end")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TodoItem {
    pub id: u64,
    pub text: String,
    pub completed: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    #[default]
    Email,
    Push,
    Both,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationFrequency {
    #[default]
    Daily,
    Weekly,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NotificationSettings {
    pub enabled: bool,
    #[serde(rename = "type")]
    pub channel: NotificationChannel,
    pub frequency: NotificationFrequency,
    pub time: String,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            channel: NotificationChannel::Email,
            frequency: NotificationFrequency::Daily,
            time: "08:00".to_string(),
        }
    }
}

impl NotificationSettings {
    pub fn validate(&self) -> Result<(), String> {
        validate_hhmm(&self.time, "notifications.time")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ThemeMode {
    Light,
    #[default]
    Dark,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ThemeConfig {
    pub mode: ThemeMode,
    #[serde(rename = "primaryColor")]
    pub primary_color: String,
    #[serde(rename = "secondaryColor")]
    pub secondary_color: String,
    #[serde(rename = "customColors", skip_serializing_if = "Option::is_none")]
    pub custom_colors: Option<HashMap<String, String>>,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            mode: ThemeMode::Dark,
            primary_color: "#667eea".to_string(),
            secondary_color: "#764ba2".to_string(),
            custom_colors: None,
        }
    }
}

impl ThemeConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.primary_color, "theme.primaryColor")?;
        validate_non_empty(&self.secondary_color, "theme.secondaryColor")?;
        Ok(())
    }

    pub fn apply_update(&self, update: &ThemeUpdate) -> ThemeConfig {
        ThemeConfig {
            mode: update.mode.unwrap_or(self.mode),
            primary_color: update
                .primary_color
                .clone()
                .unwrap_or_else(|| self.primary_color.clone()),
            secondary_color: update
                .secondary_color
                .clone()
                .unwrap_or_else(|| self.secondary_color.clone()),
            custom_colors: update
                .custom_colors
                .clone()
                .or_else(|| self.custom_colors.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ThemeUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ThemeMode>,
    #[serde(rename = "primaryColor", default, skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,
    #[serde(rename = "secondaryColor", default, skip_serializing_if = "Option::is_none")]
    pub secondary_color: Option<String>,
    #[serde(rename = "customColors", default, skip_serializing_if = "Option::is_none")]
    pub custom_colors: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Settings {
    pub notifications: NotificationSettings,
    pub theme: ThemeConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<(), String> {
        self.notifications.validate()?;
        self.theme.validate()?;
        Ok(())
    }
}

pub fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

pub fn validate_hhmm(value: &str, field_name: &str) -> Result<(), String> {
    let mut split = value.split(':');
    let Some(hour_str) = split.next() else {
        return Err(format!("{field_name} must be HH:MM"));
    };
    let Some(minute_str) = split.next() else {
        return Err(format!("{field_name} must be HH:MM"));
    };
    if split.next().is_some() {
        return Err(format!("{field_name} must be HH:MM"));
    }

    let hour = hour_str
        .parse::<u8>()
        .map_err(|_| format!("{field_name} must be HH:MM"))?;
    let minute = minute_str
        .parse::<u8>()
        .map_err(|_| format!("{field_name} must be HH:MM"))?;
    if hour > 23 || minute > 59 {
        return Err(format!("{field_name} must be HH:MM"));
    }
    Ok(())
}

fn validate_hhmm_or_hhmmss(value: &str, field_name: &str) -> Result<(), String> {
    let head = match value.match_indices(':').nth(1) {
        Some((index, _)) => &value[..index],
        None => value,
    };
    validate_hhmm(head, field_name)
}

pub fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

use crate::domain::models::{
    NotificationChannel, NotificationFrequency, NotificationSettings, Settings, ThemeMode,
    ThemeUpdate, parse_hhmm,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::local_store::LocalStore;
use crate::infrastructure::log::CommandLog;
use crate::infrastructure::notifier::{NotificationGateway, NotificationPermission};
use crate::infrastructure::timer::TimerSlot;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::{Duration as TokioDuration, sleep};

const SETTINGS_KEY: &str = "settings";

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;
type ColorSchemeProvider = Arc<dyn Fn() -> OsColorScheme + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsColorScheme {
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerPhase {
    #[default]
    Idle,
    Armed,
    Fired,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResolvedTheme {
    pub attribute: String,
    #[serde(rename = "styleVariables")]
    pub style_variables: HashMap<String, String>,
}

/// Next daily fire instant: today at the configured time, rolled to
/// tomorrow when that instant has already passed.
pub fn daily_fire_instant(
    now: DateTime<Utc>,
    time: &str,
) -> Result<DateTime<Utc>, InfraError> {
    let parsed = parse_hhmm(time).ok_or_else(|| {
        InfraError::InvalidConfig(format!("notifications.time must be HH:MM, got '{time}'"))
    })?;
    let mut fire_at = now.date_naive().and_time(parsed).and_utc();
    if fire_at < now {
        fire_at += Duration::days(1);
    }
    Ok(fire_at)
}

/// Next weekly fire instant: today at the configured time plus seven days,
/// unconditionally — the first weekly notification always lands about a
/// week out even when today's configured time has not passed yet. Observed
/// behavior, kept as-is.
pub fn weekly_fire_instant(
    now: DateTime<Utc>,
    time: &str,
) -> Result<DateTime<Utc>, InfraError> {
    let parsed = parse_hhmm(time).ok_or_else(|| {
        InfraError::InvalidConfig(format!("notifications.time must be HH:MM, got '{time}'"))
    })?;
    Ok(now.date_naive().and_time(parsed).and_utc() + Duration::days(7))
}

pub fn fire_instant(
    frequency: NotificationFrequency,
    now: DateTime<Utc>,
    time: &str,
) -> Result<DateTime<Utc>, InfraError> {
    match frequency {
        NotificationFrequency::Daily | NotificationFrequency::Custom => {
            daily_fire_instant(now, time)
        }
        NotificationFrequency::Weekly => weekly_fire_instant(now, time),
    }
}

pub struct SettingsService<P, G>
where
    P: LocalStore,
    G: NotificationGateway + 'static,
{
    store: Arc<P>,
    gateway: Arc<G>,
    log: Arc<CommandLog>,
    settings: Arc<Mutex<Settings>>,
    resolved_theme: Mutex<Option<ResolvedTheme>>,
    phase: Arc<Mutex<SchedulerPhase>>,
    timer: TimerSlot,
    now_provider: NowProvider,
    color_scheme_provider: ColorSchemeProvider,
}

impl<P, G> SettingsService<P, G>
where
    P: LocalStore,
    G: NotificationGateway + 'static,
{
    pub fn new(store: Arc<P>, gateway: Arc<G>, log: Arc<CommandLog>) -> Self {
        Self {
            store,
            gateway,
            log,
            settings: Arc::new(Mutex::new(Settings::default())),
            resolved_theme: Mutex::new(None),
            phase: Arc::new(Mutex::new(SchedulerPhase::Idle)),
            timer: TimerSlot::default(),
            now_provider: Arc::new(Utc::now),
            color_scheme_provider: Arc::new(|| OsColorScheme::Dark),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn with_color_scheme_provider(mut self, provider: ColorSchemeProvider) -> Self {
        self.color_scheme_provider = provider;
        self
    }

    pub fn settings(&self) -> Result<Settings, InfraError> {
        Ok(self.lock_settings()?.clone())
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
            .lock()
            .map(|phase| *phase)
            .unwrap_or(SchedulerPhase::Idle)
    }

    pub fn scheduler_running(&self) -> bool {
        self.timer.is_armed()
    }

    pub fn update_notifications(
        &self,
        notifications: NotificationSettings,
    ) -> Result<(), InfraError> {
        notifications.validate().map_err(InfraError::InvalidConfig)?;
        self.lock_settings()?.notifications = notifications;
        self.save_settings()
    }

    /// Persists the combined record, then re-derives the notification
    /// schedule from it.
    pub fn save_settings(&self) -> Result<(), InfraError> {
        self.persist()?;
        self.setup_notifications()
    }

    /// Cancels any outstanding timer before re-deriving and re-arming from
    /// the freshly loaded record. A missing record or malformed payload
    /// falls back to the documented defaults.
    pub fn load_settings(&self) -> Result<Settings, InfraError> {
        self.timer.disarm();
        self.set_phase(SchedulerPhase::Idle)?;

        let loaded = match self.store.read(SETTINGS_KEY)? {
            Some(raw) => match serde_json::from_str::<Settings>(&raw) {
                Ok(settings) => settings,
                Err(error) => {
                    self.log.warn(
                        "load_settings",
                        &format!("malformed settings record, using defaults: {error}"),
                    );
                    Settings::default()
                }
            },
            None => Settings::default(),
        };

        *self.lock_settings()? = loaded.clone();
        self.setup_notifications()?;
        Ok(loaded)
    }

    /// Scheduler state machine: idle while disabled; armed once a timer is
    /// outstanding; fired for the duration of a send, then armed again for
    /// the next period. A single task owns the whole cycle and `TimerSlot`
    /// guarantees at most one of them exists.
    pub fn setup_notifications(&self) -> Result<(), InfraError> {
        let notifications = self.lock_settings()?.notifications.clone();
        if !notifications.enabled {
            self.timer.disarm();
            self.set_phase(SchedulerPhase::Idle)?;
            return Ok(());
        }
        notifications.validate().map_err(InfraError::InvalidConfig)?;

        let settings = Arc::clone(&self.settings);
        let gateway = Arc::clone(&self.gateway);
        let log = Arc::clone(&self.log);
        let phase = Arc::clone(&self.phase);
        let now_provider = Arc::clone(&self.now_provider);

        let handle = tokio::spawn(async move {
            loop {
                let notifications = match settings.lock() {
                    Ok(settings) => settings.notifications.clone(),
                    Err(_) => break,
                };
                if !notifications.enabled {
                    break;
                }
                let now = now_provider();
                let Ok(fire_at) = fire_instant(notifications.frequency, now, &notifications.time)
                else {
                    break;
                };

                let wait_ms = (fire_at - now).num_milliseconds().max(0) as u64;
                sleep(TokioDuration::from_millis(wait_ms)).await;

                if let Ok(mut phase) = phase.lock() {
                    *phase = SchedulerPhase::Fired;
                }
                dispatch_notification(notifications.channel, gateway.as_ref(), log.as_ref());
                if let Ok(mut phase) = phase.lock() {
                    *phase = SchedulerPhase::Armed;
                }
            }
        });

        self.timer.arm(handle);
        self.set_phase(SchedulerPhase::Armed)?;
        self.log.info(
            "setup_notifications",
            &format!("armed {:?} notification schedule", notifications.frequency),
        );
        Ok(())
    }

    pub fn send_notification(&self) -> Result<(), InfraError> {
        let channel = self.lock_settings()?.notifications.channel;
        dispatch_notification(channel, self.gateway.as_ref(), self.log.as_ref());
        Ok(())
    }

    /// Merges a partial theme update into the current theme, persists the
    /// combined record, then applies.
    pub fn set_theme(&self, update: ThemeUpdate) -> Result<ResolvedTheme, InfraError> {
        {
            let mut settings = self.lock_settings()?;
            settings.theme = settings.theme.apply_update(&update);
        }
        self.persist()?;
        self.apply_theme()
    }

    /// System mode resolves against the OS preference at apply time; it does
    /// not track OS changes mid-session. Primary and secondary colors are
    /// pushed as style variables regardless of mode.
    pub fn apply_theme(&self) -> Result<ResolvedTheme, InfraError> {
        let theme = self.lock_settings()?.theme.clone();
        let attribute = match theme.mode {
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
            ThemeMode::System => match (self.color_scheme_provider)() {
                OsColorScheme::Light => "light",
                OsColorScheme::Dark => "dark",
            },
        };

        let mut style_variables = HashMap::from([
            ("--primary-color".to_string(), theme.primary_color.clone()),
            ("--secondary-color".to_string(), theme.secondary_color.clone()),
        ]);
        if let Some(custom) = theme.custom_colors {
            style_variables.extend(custom);
        }

        let resolved = ResolvedTheme {
            attribute: attribute.to_string(),
            style_variables,
        };
        *self
            .resolved_theme
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("theme lock poisoned: {error}")))? =
            Some(resolved.clone());
        self.log
            .info("apply_theme", &format!("applied {attribute} theme"));
        Ok(resolved)
    }

    pub fn resolved_theme(&self) -> Option<ResolvedTheme> {
        self.resolved_theme
            .lock()
            .ok()
            .and_then(|resolved| resolved.clone())
    }

    fn persist(&self) -> Result<(), InfraError> {
        let payload = serde_json::to_string(&*self.lock_settings()?)?;
        self.store.write(SETTINGS_KEY, &payload)
    }

    fn set_phase(&self, next: SchedulerPhase) -> Result<(), InfraError> {
        *self
            .phase
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("phase lock poisoned: {error}")))? =
            next;
        Ok(())
    }

    fn lock_settings(&self) -> Result<MutexGuard<'_, Settings>, InfraError> {
        self.settings
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("settings lock poisoned: {error}")))
    }
}

fn dispatch_notification(
    channel: NotificationChannel,
    gateway: &dyn NotificationGateway,
    log: &CommandLog,
) {
    match channel {
        NotificationChannel::Email => send_email_notification(log),
        NotificationChannel::Push => send_push_notification(gateway, log),
        NotificationChannel::Both => {
            send_email_notification(log);
            send_push_notification(gateway, log);
        }
    }
}

fn send_email_notification(log: &CommandLog) {
    log.info("send_notification", "sending email notification");
}

fn send_push_notification(gateway: &dyn NotificationGateway, log: &CommandLog) {
    if gateway.permission() == NotificationPermission::Granted {
        gateway.show("Reminder", "This is your scheduled reminder.");
    } else {
        log.warn("send_notification", "push notification permission not granted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ThemeConfig;
    use crate::infrastructure::local_store::InMemoryLocalStore;
    use crate::infrastructure::notifier::RecordingNotificationGateway;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn service_with(
        store: Arc<InMemoryLocalStore>,
        gateway: Arc<RecordingNotificationGateway>,
        now: DateTime<Utc>,
    ) -> SettingsService<InMemoryLocalStore, RecordingNotificationGateway> {
        let log = Arc::new(CommandLog::new(std::env::temp_dir()));
        SettingsService::new(store, gateway, log).with_now_provider(Arc::new(move || now))
    }

    fn granted_gateway() -> Arc<RecordingNotificationGateway> {
        Arc::new(RecordingNotificationGateway::with_permission(
            NotificationPermission::Granted,
        ))
    }

    #[test]
    fn daily_fire_instant_stays_today_before_the_configured_time() {
        let now = fixed_time("2026-03-02T07:00:00Z");
        let fire_at = daily_fire_instant(now, "08:00").expect("fire instant");
        assert_eq!(fire_at, fixed_time("2026-03-02T08:00:00Z"));
    }

    #[test]
    fn daily_fire_instant_rolls_to_tomorrow_after_the_configured_time() {
        let now = fixed_time("2026-03-02T09:00:00Z");
        let fire_at = daily_fire_instant(now, "08:00").expect("fire instant");
        assert_eq!(fire_at, fixed_time("2026-03-03T08:00:00Z"));
    }

    #[test]
    fn daily_fire_instant_at_exactly_the_configured_time_is_now() {
        let now = fixed_time("2026-03-02T08:00:00Z");
        let fire_at = daily_fire_instant(now, "08:00").expect("fire instant");
        assert_eq!(fire_at, now);
    }

    #[test]
    fn weekly_fire_instant_is_always_seven_days_out() {
        let before = fixed_time("2026-03-02T07:00:00Z");
        let after = fixed_time("2026-03-02T09:00:00Z");
        let expected = fixed_time("2026-03-09T08:00:00Z");
        assert_eq!(weekly_fire_instant(before, "08:00").expect("fire"), expected);
        assert_eq!(weekly_fire_instant(after, "08:00").expect("fire"), expected);
    }

    #[test]
    fn custom_frequency_follows_the_daily_rollover_rule() {
        let now = fixed_time("2026-03-02T09:00:00Z");
        let custom = fire_instant(NotificationFrequency::Custom, now, "08:00").expect("fire");
        let daily = fire_instant(NotificationFrequency::Daily, now, "08:00").expect("fire");
        assert_eq!(custom, daily);
    }

    #[test]
    fn fire_instant_rejects_malformed_times() {
        let now = fixed_time("2026-03-02T09:00:00Z");
        assert!(daily_fire_instant(now, "late").is_err());
        assert!(weekly_fire_instant(now, "25:61").is_err());
    }

    #[tokio::test]
    async fn load_with_no_stored_record_yields_the_documented_defaults() {
        let store = Arc::new(InMemoryLocalStore::default());
        let service = service_with(store, granted_gateway(), fixed_time("2026-03-02T12:00:00Z"));

        let loaded = service.load_settings().expect("load settings");
        assert!(!loaded.notifications.enabled);
        assert_eq!(loaded.theme.mode, ThemeMode::Dark);
        assert_eq!(service.phase(), SchedulerPhase::Idle);
        assert!(!service.scheduler_running());
    }

    #[tokio::test]
    async fn load_with_malformed_record_falls_back_to_defaults() {
        let store = Arc::new(InMemoryLocalStore::with_entry(SETTINGS_KEY, "{oops"));
        let service = service_with(store, granted_gateway(), fixed_time("2026-03-02T12:00:00Z"));

        let loaded = service.load_settings().expect("load settings");
        assert_eq!(loaded, Settings::default());
    }

    #[tokio::test]
    async fn save_then_load_round_trips_the_record() {
        let store = Arc::new(InMemoryLocalStore::default());
        let service = service_with(
            Arc::clone(&store),
            granted_gateway(),
            fixed_time("2026-03-02T12:00:00Z"),
        );

        service
            .update_notifications(NotificationSettings {
                enabled: false,
                channel: NotificationChannel::Both,
                frequency: NotificationFrequency::Weekly,
                time: "21:30".to_string(),
            })
            .expect("update notifications");

        let reloaded = service.load_settings().expect("load settings");
        assert_eq!(reloaded.notifications.channel, NotificationChannel::Both);
        assert_eq!(reloaded.notifications.time, "21:30");
    }

    #[tokio::test]
    async fn enabling_notifications_arms_the_scheduler() {
        let store = Arc::new(InMemoryLocalStore::default());
        let service = service_with(store, granted_gateway(), fixed_time("2026-03-02T07:00:00Z"));

        service
            .update_notifications(NotificationSettings {
                enabled: true,
                channel: NotificationChannel::Push,
                frequency: NotificationFrequency::Daily,
                time: "08:00".to_string(),
            })
            .expect("enable notifications");

        assert_eq!(service.phase(), SchedulerPhase::Armed);
        assert!(service.scheduler_running());

        service
            .update_notifications(NotificationSettings::default())
            .expect("disable notifications");
        assert_eq!(service.phase(), SchedulerPhase::Idle);
        assert!(!service.scheduler_running());
    }

    #[tokio::test]
    async fn due_schedule_fires_and_re_arms() {
        let store = Arc::new(InMemoryLocalStore::default());
        let gateway = granted_gateway();
        // 20ms shy of the configured time, so the armed task fires almost
        // immediately and then re-arms against the same frozen clock.
        let service = service_with(
            store,
            Arc::clone(&gateway),
            fixed_time("2026-03-02T07:59:59.980Z"),
        );

        service
            .update_notifications(NotificationSettings {
                enabled: true,
                channel: NotificationChannel::Push,
                frequency: NotificationFrequency::Daily,
                time: "08:00".to_string(),
            })
            .expect("enable notifications");

        tokio::time::sleep(TokioDuration::from_millis(150)).await;
        assert!(!gateway.shown().is_empty());
        assert_ne!(service.phase(), SchedulerPhase::Idle);
        assert!(service.scheduler_running());

        service.setup_notifications().expect("re-arm");
        assert!(service.scheduler_running());
    }

    #[tokio::test]
    async fn load_cancels_an_outstanding_timer_before_re_arming() {
        let store = Arc::new(InMemoryLocalStore::default());
        let service = service_with(
            Arc::clone(&store),
            granted_gateway(),
            fixed_time("2026-03-02T07:00:00Z"),
        );

        service
            .update_notifications(NotificationSettings {
                enabled: true,
                channel: NotificationChannel::Email,
                frequency: NotificationFrequency::Daily,
                time: "08:00".to_string(),
            })
            .expect("enable notifications");
        assert!(service.scheduler_running());

        store
            .write(SETTINGS_KEY, r#"{"notifications":{"enabled":false}}"#)
            .expect("seed disabled record");
        let loaded = service.load_settings().expect("load settings");
        assert!(!loaded.notifications.enabled);
        assert!(!service.scheduler_running());
        assert_eq!(service.phase(), SchedulerPhase::Idle);
    }

    #[test]
    fn push_dispatch_respects_the_permission_gate() {
        let log = CommandLog::new(std::env::temp_dir());
        let granted = RecordingNotificationGateway::with_permission(NotificationPermission::Granted);
        dispatch_notification(NotificationChannel::Push, &granted, &log);
        assert_eq!(
            granted.shown(),
            vec![(
                "Reminder".to_string(),
                "This is your scheduled reminder.".to_string()
            )]
        );

        let denied = RecordingNotificationGateway::with_permission(NotificationPermission::Denied);
        dispatch_notification(NotificationChannel::Push, &denied, &log);
        assert!(denied.shown().is_empty());
    }

    #[test]
    fn email_dispatch_never_touches_the_gateway() {
        let log = CommandLog::new(std::env::temp_dir());
        let gateway = RecordingNotificationGateway::with_permission(NotificationPermission::Granted);
        dispatch_notification(NotificationChannel::Email, &gateway, &log);
        assert!(gateway.shown().is_empty());

        dispatch_notification(NotificationChannel::Both, &gateway, &log);
        assert_eq!(gateway.shown().len(), 1);
    }

    #[tokio::test]
    async fn set_theme_merges_persists_and_applies() {
        let store = Arc::new(InMemoryLocalStore::default());
        let service = service_with(
            Arc::clone(&store),
            granted_gateway(),
            fixed_time("2026-03-02T12:00:00Z"),
        );

        let resolved = service
            .set_theme(ThemeUpdate {
                mode: Some(ThemeMode::Light),
                primary_color: Some("#123456".to_string()),
                ..ThemeUpdate::default()
            })
            .expect("set theme");

        assert_eq!(resolved.attribute, "light");
        assert_eq!(
            resolved.style_variables.get("--primary-color").map(String::as_str),
            Some("#123456")
        );
        assert_eq!(
            resolved.style_variables.get("--secondary-color").map(String::as_str),
            Some(ThemeConfig::default().secondary_color.as_str())
        );

        let raw = store.read(SETTINGS_KEY).expect("read").expect("stored");
        let persisted: Settings = serde_json::from_str(&raw).expect("parse stored settings");
        assert_eq!(persisted.theme.mode, ThemeMode::Light);
        assert_eq!(persisted.theme.primary_color, "#123456");
        assert_eq!(service.resolved_theme(), Some(resolved));
    }

    #[tokio::test]
    async fn system_mode_resolves_via_the_os_preference_at_apply_time() {
        let store = Arc::new(InMemoryLocalStore::default());
        let log = Arc::new(CommandLog::new(std::env::temp_dir()));
        let service = SettingsService::new(store, granted_gateway(), log)
            .with_color_scheme_provider(Arc::new(|| OsColorScheme::Light));

        let resolved = service
            .set_theme(ThemeUpdate {
                mode: Some(ThemeMode::System),
                ..ThemeUpdate::default()
            })
            .expect("set theme");
        assert_eq!(resolved.attribute, "light");
    }

    #[tokio::test]
    async fn custom_colors_are_pushed_alongside_the_palette() {
        let store = Arc::new(InMemoryLocalStore::default());
        let service = service_with(
            store,
            granted_gateway(),
            fixed_time("2026-03-02T12:00:00Z"),
        );

        let resolved = service
            .set_theme(ThemeUpdate {
                custom_colors: Some(HashMap::from([(
                    "--accent-color".to_string(),
                    "#abcdef".to_string(),
                )])),
                ..ThemeUpdate::default()
            })
            .expect("set theme");

        assert_eq!(resolved.attribute, "dark");
        assert_eq!(
            resolved.style_variables.get("--accent-color").map(String::as_str),
            Some("#abcdef")
        );
        assert_eq!(resolved.style_variables.len(), 3);
    }
}

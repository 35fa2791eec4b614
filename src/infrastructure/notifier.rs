use crate::infrastructure::log::CommandLog;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotificationPermission {
    Granted,
    #[default]
    Denied,
}

/// Desktop notification surface. Permission is read, never requested; the
/// request flow belongs to the host shell.
pub trait NotificationGateway: Send + Sync {
    fn permission(&self) -> NotificationPermission;
    fn show(&self, title: &str, body: &str);
}

pub struct LogNotificationGateway {
    permission: NotificationPermission,
    log: Arc<CommandLog>,
}

impl LogNotificationGateway {
    pub fn new(permission: NotificationPermission, log: Arc<CommandLog>) -> Self {
        Self { permission, log }
    }
}

impl NotificationGateway for LogNotificationGateway {
    fn permission(&self) -> NotificationPermission {
        self.permission
    }

    fn show(&self, title: &str, body: &str) {
        self.log
            .info("notification", &format!("{title}: {body}"));
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotificationGateway {
    permission: Mutex<NotificationPermission>,
    shown: Mutex<Vec<(String, String)>>,
}

impl RecordingNotificationGateway {
    pub fn with_permission(permission: NotificationPermission) -> Self {
        Self {
            permission: Mutex::new(permission),
            shown: Mutex::new(Vec::new()),
        }
    }

    pub fn shown(&self) -> Vec<(String, String)> {
        self.shown
            .lock()
            .map(|shown| shown.clone())
            .unwrap_or_default()
    }
}

impl NotificationGateway for RecordingNotificationGateway {
    fn permission(&self) -> NotificationPermission {
        self.permission
            .lock()
            .map(|permission| *permission)
            .unwrap_or_default()
    }

    fn show(&self, title: &str, body: &str) {
        if let Ok(mut shown) = self.shown.lock() {
            shown.push((title.to_string(), body.to_string()));
        }
    }
}

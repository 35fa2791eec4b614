use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const LOG_FILE: &str = "commands.log";

#[derive(Debug)]
pub struct CommandLog {
    logs_dir: PathBuf,
    guard: Mutex<()>,
}

impl CommandLog {
    pub fn new(logs_dir: impl AsRef<Path>) -> Self {
        Self {
            logs_dir: logs_dir.as_ref().to_path_buf(),
            guard: Mutex::new(()),
        }
    }

    pub fn info(&self, command: &str, message: &str) {
        self.append("info", command, message);
    }

    pub fn warn(&self, command: &str, message: &str) {
        self.append("warn", command, message);
    }

    pub fn error(&self, command: &str, message: &str) {
        self.append("error", command, message);
    }

    fn append(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.guard.lock() else {
            return;
        };
        let path = self.logs_dir.join(LOG_FILE);
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

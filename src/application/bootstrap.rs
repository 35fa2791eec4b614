use crate::domain::models::Settings;
use crate::infrastructure::error::InfraError;
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_JSON: &str = "settings.json";

#[derive(Debug)]
pub struct BootstrapResult {
    pub workspace_root: PathBuf,
    pub state_dir: PathBuf,
    pub logs_dir: PathBuf,
}

pub fn bootstrap_workspace(workspace_root: &Path) -> Result<BootstrapResult, InfraError> {
    let state_dir = workspace_root.join("state");
    let logs_dir = workspace_root.join("logs");

    fs::create_dir_all(&state_dir)?;
    fs::create_dir_all(&logs_dir)?;

    ensure_default_settings(&state_dir)?;

    Ok(BootstrapResult {
        workspace_root: workspace_root.to_path_buf(),
        state_dir,
        logs_dir,
    })
}

pub fn ensure_default_settings(state_dir: &Path) -> Result<(), InfraError> {
    let path = state_dir.join(SETTINGS_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&Settings::default())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

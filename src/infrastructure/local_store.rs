use crate::infrastructure::error::InfraError;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub trait LocalStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, InfraError>;
    fn write(&self, key: &str, value: &str) -> Result<(), InfraError>;
    fn remove(&self, key: &str) -> Result<(), InfraError>;
}

fn normalized_key(key: &str) -> Result<String, InfraError> {
    let normalized = key.trim();
    if normalized.is_empty() {
        return Err(InfraError::InvalidConfig(
            "storage key must not be empty".to_string(),
        ));
    }
    if !normalized
        .chars()
        .all(|character| character.is_ascii_alphanumeric() || character == '-' || character == '_')
    {
        return Err(InfraError::InvalidConfig(format!(
            "storage key contains unsupported characters: {normalized}"
        )));
    }
    Ok(normalized.to_string())
}

#[derive(Debug, Clone)]
pub struct JsonFileLocalStore {
    state_dir: PathBuf,
}

impl JsonFileLocalStore {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            state_dir: state_dir.as_ref().to_path_buf(),
        }
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf, InfraError> {
        let key = normalized_key(key)?;
        Ok(self.state_dir.join(format!("{key}.json")))
    }
}

impl LocalStore for JsonFileLocalStore {
    fn read(&self, key: &str) -> Result<Option<String>, InfraError> {
        let path = self.entry_path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), InfraError> {
        let path = self.entry_path(key)?;
        fs::create_dir_all(&self.state_dir)?;
        fs::write(path, value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), InfraError> {
        let path = self.entry_path(key)?;
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryLocalStore {
    values: Mutex<HashMap<String, String>>,
    writes: AtomicUsize,
}

impl InMemoryLocalStore {
    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::default();
        store
            .write(key, value)
            .expect("seed in-memory local store");
        store.writes.store(0, Ordering::SeqCst);
        store
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl LocalStore for InMemoryLocalStore {
    fn read(&self, key: &str) -> Result<Option<String>, InfraError> {
        let key = normalized_key(key)?;
        let values = self
            .values
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("local store lock poisoned: {error}")))?;
        Ok(values.get(&key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), InfraError> {
        let key = normalized_key(key)?;
        let mut values = self
            .values
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("local store lock poisoned: {error}")))?;
        values.insert(key, value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), InfraError> {
        let key = normalized_key(key)?;
        let mut values = self
            .values
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("local store lock poisoned: {error}")))?;
        values.remove(&key);
        Ok(())
    }
}

use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const DATA_DIR_ENV: &str = "REPVOICE_DATA_DIR";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read local store: {0}")]
    Read(std::io::Error),
    #[error("failed to write local store: {0}")]
    Write(std::io::Error),
    #[error("failed to parse local store JSON: {0}")]
    Parse(serde_json::Error),
    #[error("cannot resolve app data directory")]
    AppData,
}

/// Resolves the directory used for settings and the local store.
pub fn data_dir() -> Result<PathBuf, StoreError> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        let trimmed = dir.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }
    let proj_dirs = ProjectDirs::from("com", "repvoice", "core").ok_or(StoreError::AppData)?;
    Ok(proj_dirs.data_dir().to_path_buf())
}

/// Key/value JSON document on disk. Every `set` rewrites the whole file.
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    pub fn new() -> Result<Self, StoreError> {
        Ok(Self {
            path: data_dir()?.join("local_store.json"),
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let entries = self.read_all()?;
        match entries.get(key) {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(StoreError::Parse),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let mut entries = self.read_all()?;
        let value = serde_json::to_value(value).map_err(StoreError::Parse)?;
        entries.insert(key.to_string(), value);
        self.write_all(&entries)
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }

    fn read_all(&self) -> Result<Map<String, Value>, StoreError> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let raw = fs::read_to_string(&self.path).map_err(StoreError::Read)?;
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        serde_json::from_str(&raw).map_err(StoreError::Parse)
    }

    fn write_all(&self, entries: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(StoreError::Write)?;
        }
        let raw = serde_json::to_string_pretty(entries).map_err(StoreError::Parse)?;
        fs::write(&self.path, raw).map_err(StoreError::Write)
    }
}

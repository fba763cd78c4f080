//! Persistent key-value preference store backed by one JSON file
//!
//! Holds the auth session, settings and anything else that must survive a
//! restart. Writes go through on every change; the file is small.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde_json::{Map, Value};

const PREFS_FILE: &str = "prefs.json";
const CACHE_DIR: &str = "cache";

pub struct PrefStore {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

impl PrefStore {
    /// Open the store under the platform config directory, creating an empty
    /// one on first run.
    pub fn open() -> Result<Self> {
        let dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("spotiview");
        Self::open_at(dir)
    }

    pub fn open_at(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(PREFS_FILE);
        let values = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Corrupt preference file {}", path.display()))?
        } else {
            Map::new()
        };
        Ok(Self { path, values: Mutex::new(values) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        let values = self.values.lock().unwrap();
        values.get(key).and_then(Value::as_str).map(str::to_owned)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        let values = self.values.lock().unwrap();
        values.get(key).and_then(Value::as_bool)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        let values = self.values.lock().unwrap();
        values.get(key).and_then(Value::as_i64)
    }

    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        let content = {
            let mut values = self.values.lock().unwrap();
            values.insert(key.to_owned(), value);
            serde_json::to_string_pretty(&*values)?
        };
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }

    fn cache_dir(&self) -> PathBuf {
        self.path.parent().unwrap_or(Path::new(".")).join(CACHE_DIR)
    }

    /// Total size in bytes of everything under the cache directory.
    pub fn cache_size_bytes(&self) -> u64 {
        dir_size(&self.cache_dir())
    }

    /// Remove the cache directory and everything in it.
    pub fn clear_cache(&self) -> Result<()> {
        let dir = self.cache_dir();
        if dir.exists() {
            fs::remove_dir_all(&dir)
                .with_context(|| format!("Failed to clear {}", dir.display()))?;
        }
        tracing::info!("Cache cleared");
        Ok(())
    }
}

fn dir_size(dir: &Path) -> u64 {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return 0,
    };
    entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                dir_size(&path)
            } else {
                entry.metadata().map(|m| m.len()).unwrap_or(0)
            }
        })
        .sum()
}

//! Grouped-key settings persistence.
//!
//! Link configurations persist a handful of typed values under a named
//! group (one group per link). The store keeps everything in memory and
//! writes the whole thing to a single JSON file on [`SettingsStore::save`].

use std::collections::HashMap;
use std::path::PathBuf;

use serde_json::Value;
use tracing::debug;

/// Errors from settings persistence.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

type Group = HashMap<String, Value>;

/// Settings store backed by a JSON file.
///
/// Values are addressed by `(group, key)`. Reads fall back to a caller
/// supplied default when the group or key is missing or has the wrong
/// type, so loading from an empty or partial file is never an error.
pub struct SettingsStore {
    path: PathBuf,
    groups: HashMap<String, Group>,
}

impl SettingsStore {
    /// Opens a store, loading existing settings from disk.
    ///
    /// A missing file yields an empty store.
    pub fn open(path: PathBuf) -> Result<Self, SettingsError> {
        let groups = match std::fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str(&json)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, groups })
    }

    /// Returns a string value, or `default` if absent.
    pub fn get_str(&self, group: &str, key: &str, default: &str) -> String {
        self.get(group, key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    }

    /// Returns a 16-bit unsigned value, or `default` if absent or out of range.
    pub fn get_u16(&self, group: &str, key: &str, default: u16) -> u16 {
        self.get(group, key)
            .and_then(Value::as_u64)
            .and_then(|v| u16::try_from(v).ok())
            .unwrap_or(default)
    }

    /// Sets a string value.
    pub fn set_str(&mut self, group: &str, key: &str, value: &str) {
        self.set(group, key, Value::String(value.to_string()));
    }

    /// Sets a 16-bit unsigned value.
    pub fn set_u16(&mut self, group: &str, key: &str, value: u16) {
        self.set(group, key, Value::from(value));
    }

    /// Removes a whole group.
    pub fn remove_group(&mut self, group: &str) {
        self.groups.remove(group);
    }

    /// Writes the current settings to disk.
    pub fn save(&self) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(&self.groups)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, json)?;
        debug!("persisted {} settings group(s) to {:?}", self.groups.len(), self.path);
        Ok(())
    }

    fn get(&self, group: &str, key: &str) -> Option<&Value> {
        self.groups.get(group).and_then(|g| g.get(key))
    }

    fn set(&mut self, group: &str, key: &str, value: Value) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }
}

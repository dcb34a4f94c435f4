//! User settings and the key-value store that persists them.
//!
//! The store mirrors browser-local extension storage: `get`/`set` by key, JSON values, and a
//! change subscription that reports `{key: {newValue, oldValue}}` for every key whose value
//! actually changed. The core only ever sees a [`Settings`] snapshot.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::ConfigError;
use crate::lock_or_recover;
use crate::paths;

pub const KEY_ENABLED: &str = "isEnabled";
pub const KEY_PRESERVE_INDENTATION: &str = "preserveIndentation";

/// The two user toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "isEnabled")]
    pub enabled: bool,
    #[serde(rename = "preserveIndentation")]
    pub preserve_indentation: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            preserve_indentation: true,
        }
    }
}

impl Settings {
    /// Reads settings from stored values. Anything but a literal `false` counts as `true`,
    /// so missing keys fall back to the defaults.
    pub fn from_values(values: &Map<String, Value>) -> Self {
        let flag = |key: &str| !matches!(values.get(key), Some(Value::Bool(false)));
        Self {
            enabled: flag(KEY_ENABLED),
            preserve_indentation: flag(KEY_PRESERVE_INDENTATION),
        }
    }

    pub fn to_values(self) -> Map<String, Value> {
        let mut values = Map::new();
        values.insert(KEY_ENABLED.to_string(), Value::Bool(self.enabled));
        values.insert(
            KEY_PRESERVE_INDENTATION.to_string(),
            Value::Bool(self.preserve_indentation),
        );
        values
    }
}

/// Truthiness of a changed value: `null`, `false`, `0`, `""` and a removed key are false.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageChange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
}

/// Changed keys of one `set` call.
pub type StorageChanges = BTreeMap<String, StorageChange>;

pub type ChangeListener = Arc<dyn Fn(&StorageChanges) + Send + Sync + 'static>;

/// Key-value settings store, optionally persisted to a JSON file.
pub struct SettingsStore {
    path: Option<PathBuf>,
    values: Mutex<Map<String, Value>>,
    listeners: Mutex<Vec<ChangeListener>>,
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("path", &self.path)
            .finish()
    }
}

impl SettingsStore {
    /// Store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            values: Mutex::new(Map::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Opens the store at `path`, starting empty when the file does not exist yet.
    pub fn open(path: PathBuf) -> Result<Self, ConfigError> {
        let values = if path.exists() {
            let data = fs::read_to_string(&path)?;
            let values: Map<String, Value> = serde_json::from_str(&data)?;
            debug!(?path, keys = values.len(), "Settings loaded");
            values
        } else {
            debug!(?path, "Settings file does not exist, starting empty");
            Map::new()
        };

        Ok(Self {
            path: Some(path),
            values: Mutex::new(values),
            listeners: Mutex::new(Vec::new()),
        })
    }

    /// Opens the store in the per-user config directory.
    pub fn open_default() -> Result<Self, ConfigError> {
        let path = paths::get_settings_path().ok_or(ConfigError::NoConfigDir)?;
        Self::open(path)
    }

    /// Stored values for `keys`; keys that were never set are absent from the result.
    pub fn get(&self, keys: &[&str]) -> Map<String, Value> {
        let values = lock_or_recover(&self.values);
        keys.iter()
            .filter_map(|key| values.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect()
    }

    /// Current settings snapshot.
    pub fn settings(&self) -> Settings {
        Settings::from_values(&self.get(&[KEY_ENABLED, KEY_PRESERVE_INDENTATION]))
    }

    /// Stores `updates`, persists them, then notifies subscribers about changed keys.
    pub fn set(&self, updates: Map<String, Value>) -> Result<(), ConfigError> {
        let changes = {
            let mut values = lock_or_recover(&self.values);
            let mut next = values.clone();
            let mut changes = StorageChanges::new();
            for (key, new_value) in updates {
                let old_value = next.insert(key.clone(), new_value.clone());
                if old_value.as_ref() != Some(&new_value) {
                    changes.insert(
                        key,
                        StorageChange {
                            new_value: Some(new_value),
                            old_value,
                        },
                    );
                }
            }

            if changes.is_empty() {
                return Ok(());
            }
            self.persist(&next)?;
            *values = next;
            changes
        };

        debug!(keys = ?changes.keys().collect::<Vec<_>>(), "Settings changed");
        let listeners: Vec<ChangeListener> = lock_or_recover(&self.listeners).clone();
        for listener in listeners {
            listener(&changes);
        }
        Ok(())
    }

    /// Sets a single boolean key.
    pub fn set_flag(&self, key: &str, value: bool) -> Result<(), ConfigError> {
        let mut updates = Map::new();
        updates.insert(key.to_string(), Value::Bool(value));
        self.set(updates)
    }

    /// Writes the default settings; run once when the tool is installed.
    pub fn install_defaults(&self) -> Result<(), ConfigError> {
        info!("Writing default settings");
        self.set(Settings::default().to_values())
    }

    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&StorageChanges) + Send + Sync + 'static,
    {
        lock_or_recover(&self.listeners).push(Arc::new(listener));
    }

    fn persist(&self, values: &Map<String, Value>) -> Result<(), ConfigError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(values)?;
        fs::write(path, data)?;
        debug!(?path, "Settings saved");
        Ok(())
    }
}

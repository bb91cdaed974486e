//! User settings and the key-value store they persist through.

use super::filter::{FilterConfig, VolumeUnit};
use pivot_data::model::{LevelName, Period, SignalDirection};
use serde::{Serialize, de::DeserializeOwned};
use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::warn;

pub const KEY_LIMIT: &str = "pivot_limit";
pub const KEY_MIN_DIFF: &str = "pivot_min_diff";
pub const KEY_MIN_VOLUME: &str = "pivot_min_volume";
pub const KEY_VOLUME_UNIT: &str = "pivot_volume_unit";
pub const KEY_FILTER_LEVELS: &str = "pivot_filter_levels";
pub const KEY_FILTER_PERIOD: &str = "pivot_filter_period";
pub const KEY_FILTER_DIRECTION: &str = "pivot_filter_direction";
pub const KEY_SOUND_LEVELS: &str = "pivot_sound_levels";
pub const KEY_SOUND_ENABLED: &str = "pivot_sound_enabled";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("settings io error: {0}")]
    Io(String),

    #[error("failed to encode setting {key}: {error}")]
    Encode { key: String, error: String },
}

/// String key-value persistence.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: String) -> Result<(), SettingsError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), SettingsError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// Store kept in a single JSON object file, rewritten on every change.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open `path`. A missing or unreadable file starts an empty store.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), "Ignoring corrupt settings file: {}", e);
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };

        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), SettingsError> {
        self.values.insert(key.to_string(), value);

        let raw = serde_json::to_string_pretty(&self.values).map_err(|e| SettingsError::Encode {
            key: key.to_string(),
            error: e.to_string(),
        })?;
        std::fs::write(&self.path, raw).map_err(|e| SettingsError::Io(e.to_string()))
    }
}

/// Persisted dashboard preferences.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub limit: usize,
    pub min_diff_percent: f64,
    /// Minimum volume as typed, scaled by `volume_unit`
    pub min_volume: f64,
    pub volume_unit: VolumeUnit,
    pub filter_levels: BTreeSet<LevelName>,
    pub period: Option<Period>,
    pub direction: Option<SignalDirection>,
    /// Levels that would trigger an alert sound
    pub sound_levels: BTreeSet<LevelName>,
    pub sound_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            limit: 1000,
            min_diff_percent: 0.0,
            min_volume: 0.0,
            volume_unit: VolumeUnit::M,
            filter_levels: BTreeSet::new(),
            period: None,
            direction: None,
            sound_levels: BTreeSet::new(),
            sound_enabled: false,
        }
    }
}

impl Settings {
    /// Read every setting, keeping the default for missing or undecodable values.
    pub fn load(store: &impl KeyValueStore) -> Self {
        let defaults = Self::default();
        Self {
            limit: read(store, KEY_LIMIT)
                .filter(|limit: &usize| *limit > 0)
                .unwrap_or(defaults.limit),
            min_diff_percent: read(store, KEY_MIN_DIFF).unwrap_or(defaults.min_diff_percent),
            min_volume: read(store, KEY_MIN_VOLUME).unwrap_or(defaults.min_volume),
            volume_unit: read(store, KEY_VOLUME_UNIT).unwrap_or(defaults.volume_unit),
            filter_levels: read(store, KEY_FILTER_LEVELS).unwrap_or(defaults.filter_levels),
            period: read(store, KEY_FILTER_PERIOD).unwrap_or(defaults.period),
            direction: read(store, KEY_FILTER_DIRECTION).unwrap_or(defaults.direction),
            sound_levels: read(store, KEY_SOUND_LEVELS).unwrap_or(defaults.sound_levels),
            sound_enabled: read(store, KEY_SOUND_ENABLED).unwrap_or(defaults.sound_enabled),
        }
    }

    pub fn save(&self, store: &mut impl KeyValueStore) -> Result<(), SettingsError> {
        write(store, KEY_LIMIT, &self.limit)?;
        write(store, KEY_MIN_DIFF, &self.min_diff_percent)?;
        write(store, KEY_MIN_VOLUME, &self.min_volume)?;
        write(store, KEY_VOLUME_UNIT, &self.volume_unit)?;
        write(store, KEY_FILTER_LEVELS, &self.filter_levels)?;
        write(store, KEY_FILTER_PERIOD, &self.period)?;
        write(store, KEY_FILTER_DIRECTION, &self.direction)?;
        write(store, KEY_SOUND_LEVELS, &self.sound_levels)?;
        write(store, KEY_SOUND_ENABLED, &self.sound_enabled)
    }

    /// Filter described by these settings plus the (unpersisted) symbol query.
    pub fn filter_config(&self, symbol_query: &str) -> FilterConfig {
        FilterConfig::default()
            .with_symbol_query(symbol_query)
            .with_period(self.period)
            .with_levels(self.filter_levels.iter().copied())
            .with_direction(self.direction)
            .with_min_diff_percent(self.min_diff_percent)
            .with_min_volume(self.volume_unit.apply(self.min_volume))
    }
}

fn read<T: DeserializeOwned>(store: &impl KeyValueStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, "Ignoring undecodable setting: {}", e);
            None
        }
    }
}

fn write<T: Serialize>(
    store: &mut impl KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), SettingsError> {
    let raw = serde_json::to_string(value).map_err(|e| SettingsError::Encode {
        key: key.to_string(),
        error: e.to_string(),
    })?;
    store.set(key, raw)
}

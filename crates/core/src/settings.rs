//! Device-local voice preferences.
//!
//! Values live in a flat string key-value store under the keys `voiceName`, `rate`
//! and `pitch`. Numbers that are missing or do not parse fall back to `1.0`.
//! Writes are fire-and-forget: a failed write is logged and the last write wins.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const KEY_VOICE_NAME: &str = "voiceName";
pub const KEY_RATE: &str = "rate";
pub const KEY_PITCH: &str = "pitch";

pub const MIN_LEVEL: f32 = 0.5;
pub const MAX_LEVEL: f32 = 2.0;
pub const DEFAULT_LEVEL: f32 = 1.0;

/// A flat string store for device preferences.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

#[derive(Default)]
pub struct MemoryKeyValueStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
    }
}

/// A JSON object on disk, rewritten in full on every `set`.
pub struct FileKeyValueStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileKeyValueStore {
    /// Opens the store. A missing or unreadable file starts out empty.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable settings file {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self {
            path,
            values: Mutex::new(values),
        }
    }

    fn flush(&self, values: &BTreeMap<String, String>) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(values)?;
        std::fs::write(&self.path, json)
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
        if let Err(e) = self.flush(&values) {
            tracing::warn!("Failed to write settings to {}: {}", self.path.display(), e);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSettings {
    pub voice_name: Option<String>,
    pub rate: f32,
    pub pitch: f32,
    /// Whether assistant turns are read aloud. Not persisted.
    pub enabled: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            voice_name: None,
            rate: DEFAULT_LEVEL,
            pitch: DEFAULT_LEVEL,
            enabled: true,
        }
    }
}

/// Parses a stored level, clamped into range. Anything unusable becomes `1.0`.
pub fn parse_level(raw: Option<&str>) -> f32 {
    raw.and_then(|s| s.trim().parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(MIN_LEVEL, MAX_LEVEL))
        .unwrap_or(DEFAULT_LEVEL)
}

impl VoiceSettings {
    pub fn load(store: &dyn KeyValueStore) -> Self {
        Self {
            voice_name: store.get(KEY_VOICE_NAME).filter(|s| !s.is_empty()),
            rate: parse_level(store.get(KEY_RATE).as_deref()),
            pitch: parse_level(store.get(KEY_PITCH).as_deref()),
            enabled: true,
        }
    }

    pub fn set_voice(&mut self, store: &dyn KeyValueStore, name: &str) {
        self.voice_name = Some(name.to_string());
        store.set(KEY_VOICE_NAME, name);
    }

    /// Stores the raw text as given and keeps the parsed value.
    pub fn set_rate(&mut self, store: &dyn KeyValueStore, raw: &str) {
        self.rate = parse_level(Some(raw));
        store.set(KEY_RATE, raw);
    }

    pub fn set_pitch(&mut self, store: &dyn KeyValueStore, raw: &str) {
        self.pitch = parse_level(Some(raw));
        store.set(KEY_PITCH, raw);
    }

    /// Picks the first offered voice when none has been chosen yet, and remembers it.
    pub fn ensure_voice(&mut self, store: &dyn KeyValueStore, offered: &[crate::speech::Voice]) {
        if self.voice_name.is_none() {
            if let Some(first) = offered.first() {
                self.set_voice(store, &first.name);
            }
        }
    }
}

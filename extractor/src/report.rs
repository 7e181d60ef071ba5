//! The structured decode result and its JSON serialization.
//!
//! A decode produces an ordered key/value report plus a flat diagnostics
//! list. Anything that degrades a single section (truncated slice, failed
//! decompression, missing key) lands in the diagnostics while siblings
//! continue.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// One value in the configuration report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    /// A decoded string (INI parameter, version, PEM export).
    Text(String),
    /// An opaque byte blob; serialized hex-encoded.
    Blob(Vec<u8>),
    /// A nested module decoded by recursion.
    Module(ConfigReport),
    /// A nested module that failed to decode; the error is recorded in
    /// place so the parent report survives.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ConfigEntry {
    key: String,
    value: ConfigValue,
}

/// Ordered mapping from logical key to decoded value.
///
/// Keys are section names, hex crc hashes, INI parameter names or `DLL_n`
/// for nested modules. Re-inserting an existing key replaces its value in
/// place and keeps its position; duplicate "UNKNOWN" INI names collide this
/// way, last write wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigReport {
    entries: Vec<ConfigEntry>,
}

impl ConfigReport {
    /// Inserts or replaces a value under `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: ConfigValue) {
        let key = key.into();
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.key == key) {
            entry.value = value;
        } else {
            self.entries.push(ConfigEntry { key, value });
        }
    }

    /// Looks up a value by key.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| &entry.value)
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.entries
            .iter()
            .map(|entry| (entry.key.as_str(), &entry.value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ConfigReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.key, &entry.value)?;
        }
        map.end()
    }
}

impl Serialize for ConfigValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ConfigValue::Text(text) => serializer.serialize_str(text),
            ConfigValue::Blob(bytes) => serializer.serialize_str(&hex::encode(bytes)),
            ConfigValue::Module(report) => report.serialize(serializer),
            ConfigValue::Failed(message) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", message)?;
                map.end()
            }
        }
    }
}

/// One structured diagnostic event recorded during a decode.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Diagnostic {
    /// Where the event occurred (section role, crc hash, module key).
    pub context: String,
    /// What happened.
    pub message: String,
}

impl Diagnostic {
    pub fn new(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            message: message.into(),
        }
    }
}

/// The complete result of one top-level decode.
#[derive(Debug, Serialize)]
pub struct DecodeOutput {
    /// The reassembled configuration.
    pub config: ConfigReport,
    /// Structured events collected across the decode, nested modules
    /// included.
    pub diagnostics: Vec<Diagnostic>,
}

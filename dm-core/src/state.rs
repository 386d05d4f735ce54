//! Key-value game state.
//!
//! One [`StateStore`] belongs to one game. Keys map to arbitrary JSON; a few
//! keys are reserved and always present after creation or a reset.

use crate::inventory;
use crate::player::{PlayerInit, PlayerRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const PLAYER_KEY: &str = "player";

/// Keys every fresh store starts with.
pub const RESERVED_KEYS: [&str; 5] = [PLAYER_KEY, "npcs", "flags", "quest_log", "combat_state"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("Key '{0}' not found in state")]
    KeyNotFound(String),
    #[error("Updates for '{0}' must be a JSON object")]
    InvalidUpdate(String),
}

/// In-memory game state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateStore {
    entries: Map<String, Value>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self {
            entries: reserved_defaults(),
        }
    }
}

fn reserved_defaults() -> Map<String, Value> {
    let mut entries = Map::new();
    entries.insert(PLAYER_KEY.to_string(), Value::Null);
    entries.insert("npcs".to_string(), Value::Object(Map::new()));
    entries.insert("flags".to_string(), Value::Object(Map::new()));
    entries.insert("quest_log".to_string(), Value::Array(Vec::new()));
    entries.insert("combat_state".to_string(), Value::Null);
    entries
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, replacing whatever was there.
    pub fn save(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    /// Read a value. A key explicitly set to `null` loads as `null`.
    pub fn load(&self, key: &str) -> Result<&Value, StateError> {
        self.entries
            .get(key)
            .ok_or_else(|| StateError::KeyNotFound(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Deep-merge `updates` into an existing key and return the new value.
    ///
    /// Objects merge recursively; anything else, arrays included, replaces.
    /// Under `player`, an `inventory` field is applied as an inventory patch
    /// instead of replacing the list.
    pub fn update(&mut self, key: &str, updates: &Value) -> Result<&Value, StateError> {
        let current = self
            .entries
            .get_mut(key)
            .ok_or_else(|| StateError::KeyNotFound(key.to_string()))?;
        let Value::Object(updates) = updates else {
            return Err(StateError::InvalidUpdate(key.to_string()));
        };
        *current = merge(current, updates, key == PLAYER_KEY);
        Ok(&*current)
    }

    /// A copy of every key and value.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.entries.clone()
    }

    /// Start over: only the reserved keys remain, at their defaults.
    pub fn reset(&mut self) {
        self.entries = reserved_defaults();
        tracing::info!("game state reset");
    }

    /// Replace the store's contents with a snapshot.
    ///
    /// Reserved keys missing from the snapshot are put back at their defaults.
    pub fn restore(&mut self, snapshot: Map<String, Value>) {
        let mut entries = snapshot;
        for (key, value) in reserved_defaults() {
            entries.entry(key).or_insert(value);
        }
        self.entries = entries;
    }

    /// Create the player character, replacing any existing one.
    pub fn initialize_player(&mut self, init: PlayerInit) -> PlayerRecord {
        let record = init.into_record();
        let value = serde_json::to_value(&record).unwrap_or(Value::Null);
        self.entries.insert(PLAYER_KEY.to_string(), value);
        tracing::info!(name = %record.name, class = %record.class_name, "player initialized");
        record
    }

    /// Typed view of the player, if one has been created.
    pub fn player(&self) -> Option<PlayerRecord> {
        let value = self.entries.get(PLAYER_KEY)?;
        if value.is_null() {
            return None;
        }
        match serde_json::from_value(value.clone()) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(error = %err, "stored player does not read as a player record");
                None
            }
        }
    }
}

fn merge(current: &Value, updates: &Map<String, Value>, is_player: bool) -> Value {
    let mut merged = match current {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    for (field, incoming) in updates {
        let next = if is_player && field == "inventory" {
            let existing = merged.get(field).unwrap_or(&Value::Null);
            inventory::apply_patch(existing, incoming)
        } else {
            match (merged.get(field), incoming) {
                (Some(existing @ Value::Object(_)), Value::Object(nested)) => {
                    merge(existing, nested, false)
                }
                _ => incoming.clone(),
            }
        };
        merged.insert(field.clone(), next);
    }
    Value::Object(merged)
}

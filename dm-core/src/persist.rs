//! Game persistence for save/load functionality.
//!
//! A save is the whole state store as pretty JSON, wrapped with a format
//! version and a little metadata that can be read without the full state.

use crate::state::{StateStore, PLAYER_KEY};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current save file version.
pub const SAVE_VERSION: u32 = 1;

/// Quick-save file name inside a save directory.
const QUICKSAVE_FILE: &str = "quicksave.json";

/// A saved game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedGame {
    /// Save format version for compatibility checking.
    pub version: u32,

    /// Seconds since the Unix epoch when the save was made.
    pub saved_at: String,

    /// Metadata about the save.
    pub metadata: SaveMetadata,

    /// Every state key and value.
    pub state: Map<String, Value>,
}

/// What a save browser shows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SaveMetadata {
    pub player_name: Option<String>,
    pub location: Option<String>,
    pub level: Option<i64>,
}

impl SavedGame {
    /// Capture the current state.
    pub fn new(store: &StateStore) -> Self {
        let metadata = match store.player() {
            Some(player) => SaveMetadata {
                player_name: Some(player.name),
                location: Some(player.location),
                level: Some(player.level),
            },
            None => SaveMetadata::default(),
        };

        Self {
            version: SAVE_VERSION,
            saved_at: unix_now(),
            metadata,
            state: store.snapshot(),
        }
    }

    /// Build a store holding the saved state.
    pub fn to_store(&self) -> StateStore {
        let mut store = StateStore::new();
        store.restore(self.state.clone());
        store
    }

    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        let saved: Self = serde_json::from_str(&content)?;
        check_version(saved.version)?;
        Ok(saved)
    }

    /// Read a save's metadata without decoding the full state.
    pub async fn peek_metadata(path: impl AsRef<Path>) -> Result<SaveMetadata, PersistError> {
        let content = fs::read_to_string(path).await?;

        #[derive(Deserialize)]
        struct Partial {
            version: u32,
            #[serde(default)]
            metadata: SaveMetadata,
        }

        let partial: Partial = serde_json::from_str(&content)?;
        check_version(partial.version)?;
        Ok(partial.metadata)
    }
}

fn check_version(found: u32) -> Result<(), PersistError> {
    if found != SAVE_VERSION {
        return Err(PersistError::VersionMismatch {
            expected: SAVE_VERSION,
            found,
        });
    }
    Ok(())
}

/// The single quick-save slot in a directory.
pub fn quicksave_path(dir: impl AsRef<Path>) -> PathBuf {
    dir.as_ref().join(QUICKSAVE_FILE)
}

/// A save file named after the player, e.g. `Bob_s_Hero.json`.
pub fn player_save_path(dir: impl AsRef<Path>, store: &StateStore) -> PathBuf {
    let name = store
        .load(PLAYER_KEY)
        .ok()
        .and_then(|player| player.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("game");
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    dir.as_ref().join(format!("{sanitized}.json"))
}

fn unix_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    now.as_secs().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::PlayerInit;
    use serde_json::json;

    fn sample_store() -> StateStore {
        let mut store = StateStore::new();
        store.initialize_player(PlayerInit::named("Save Test Hero").with_location("crypt"));
        store.save("door_open", json!(true));
        store
    }

    #[test]
    fn test_metadata_from_player() {
        let saved = SavedGame::new(&sample_store());
        assert_eq!(saved.version, SAVE_VERSION);
        assert_eq!(saved.metadata.player_name.as_deref(), Some("Save Test Hero"));
        assert_eq!(saved.metadata.location.as_deref(), Some("crypt"));

        let empty = SavedGame::new(&StateStore::new());
        assert_eq!(empty.metadata, SaveMetadata::default());
    }

    #[test]
    fn test_save_paths() {
        let path = player_save_path("saves", &sample_store());
        assert!(path.to_string_lossy().ends_with("Save_Test_Hero.json"));
        assert!(player_save_path("saves", &StateStore::new()).ends_with("game.json"));
        assert!(quicksave_path("saves").ends_with("quicksave.json"));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        use tempfile::TempDir;

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let save_path = temp_dir.path().join("game.json");

        let store = sample_store();
        SavedGame::new(&store)
            .save_json(&save_path)
            .await
            .expect("Save should succeed");
        assert!(save_path.exists());

        let loaded = SavedGame::load_json(&save_path)
            .await
            .expect("Load should succeed");
        assert_eq!(loaded.to_store(), store);
    }

    #[tokio::test]
    async fn test_peek_metadata() {
        use tempfile::TempDir;

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let save_path = temp_dir.path().join("peek.json");
        SavedGame::new(&sample_store())
            .save_json(&save_path)
            .await
            .expect("Save should succeed");

        let metadata = SavedGame::peek_metadata(&save_path)
            .await
            .expect("Peek should succeed");
        assert_eq!(metadata.player_name.as_deref(), Some("Save Test Hero"));
        assert_eq!(metadata.level, Some(1));
    }

    #[tokio::test]
    async fn test_version_mismatch() {
        use tempfile::TempDir;

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let save_path = temp_dir.path().join("old.json");
        let mut saved = SavedGame::new(&StateStore::new());
        saved.version = 99;
        saved.save_json(&save_path).await.expect("Save should succeed");

        let err = SavedGame::load_json(&save_path).await.unwrap_err();
        assert!(matches!(
            err,
            PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: 99
            }
        ));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = SavedGame::load_json("/nonexistent/dir/save.json").await.unwrap_err();
        assert!(matches!(err, PersistError::Io(_)));
    }
}

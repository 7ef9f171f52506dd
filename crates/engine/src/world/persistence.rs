use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

use super::{Character, CharacterRegistry, ObjectKind, Vec2};

/// Single key under which the whole roster is stored.
pub const SAVE_KEY: &str = "isogrid_save_v1";
const SCRIPT_DIGEST_HEX_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("invalid store key '{0}'")]
    InvalidKey(String),
    #[error("store unavailable for key '{0}'")]
    StoreUnavailable(String),
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("encode saved state: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("saved state is not valid JSON: {0}")]
    Syntax(#[source] serde_json::Error),
    #[error("saved state has invalid structure: {0}")]
    InvalidStructure(String),
    #[error("saved state field {path}: {source}")]
    Field {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Opaque key-value medium underneath the save format.
pub trait SaveStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn write(&mut self, key: &str, value: &str) -> Result<(), PersistenceError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedCharacter {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub color: String,
    #[serde(default)]
    pub script_payload: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inventory: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub characters: Vec<PersistedCharacter>,
    #[serde(default)]
    pub active_id: Option<String>,
}

impl PersistedState {
    pub fn from_registry(registry: &CharacterRegistry) -> Self {
        Self {
            characters: registry
                .list()
                .iter()
                .map(PersistedCharacter::from_character)
                .collect(),
            active_id: registry.active_id().map(ToString::to_string),
        }
    }

    /// Rebuilds a roster with empty queues and no motion. Duplicate ids keep the first entry.
    pub fn into_registry(self, speed: f32) -> CharacterRegistry {
        let mut registry = CharacterRegistry::new();
        for saved in self.characters {
            let id = saved.id.clone();
            if registry.insert(saved.into_character(speed)).is_err() {
                warn!(character_id = %id, "duplicate_saved_character_skipped");
            }
        }
        registry.restore_active(self.active_id.as_deref());
        registry
    }
}

impl PersistedCharacter {
    fn from_character(character: &Character) -> Self {
        Self {
            id: character.id.clone(),
            x: character.position.x,
            y: character.position.y,
            color: character.color.clone(),
            script_payload: character.script_payload.clone(),
            inventory: character
                .inventory
                .iter()
                .map(|(kind, count)| (kind.as_token().to_string(), *count))
                .collect(),
        }
    }

    fn into_character(self, speed: f32) -> Character {
        let mut character = Character::new(self.id, Vec2::new(self.x, self.y), self.color, speed);
        character.script_payload = self.script_payload;
        for (token, count) in self.inventory {
            match ObjectKind::from_token(&token) {
                Some(kind) => {
                    character.inventory.insert(kind, count);
                }
                None => debug!(kind = %token, "unknown_inventory_kind_dropped"),
            }
        }
        character
    }
}

pub fn save_state(registry: &CharacterRegistry) -> PersistedState {
    PersistedState::from_registry(registry)
}

pub fn write_state(
    store: &mut dyn SaveStore,
    state: &PersistedState,
) -> Result<(), PersistenceError> {
    let json = serde_json::to_string(state).map_err(PersistenceError::Encode)?;
    store.write(SAVE_KEY, &json)
}

/// Loads the saved roster. Missing, unreadable or malformed data all count as "nothing saved".
pub fn load_state(store: &dyn SaveStore) -> Option<PersistedState> {
    let raw = match store.read(SAVE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(error) => {
            warn!(error = %error, "save_read_failed");
            return None;
        }
    };
    match parse_persisted_state(&raw) {
        Ok(state) => Some(state),
        Err(error) => {
            warn!(error = %error, "saved_state_rejected");
            None
        }
    }
}

pub fn parse_persisted_state(raw: &str) -> Result<PersistedState, PersistenceError> {
    let value: serde_json::Value = serde_json::from_str(raw).map_err(PersistenceError::Syntax)?;
    let Some(object) = value.as_object() else {
        return Err(PersistenceError::InvalidStructure(
            "top level is not an object".to_string(),
        ));
    };
    if !object
        .get("characters")
        .is_some_and(serde_json::Value::is_array)
    {
        return Err(PersistenceError::InvalidStructure(
            "'characters' is missing or not an array".to_string(),
        ));
    }

    serde_path_to_error::deserialize::<_, PersistedState>(value).map_err(|error| {
        let path = error.path().to_string();
        PersistenceError::Field {
            path,
            source: error.into_inner(),
        }
    })
}

/// Short stable fingerprint of a script payload for logs and dumps.
pub fn script_digest(payload: &str) -> String {
    let digest = Sha256::digest(payload.as_bytes());
    let mut hex = String::with_capacity(SCRIPT_DIGEST_HEX_LEN);
    for byte in digest.iter().take(SCRIPT_DIGEST_HEX_LEN / 2) {
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}

#[derive(Debug, Default, Clone)]
pub struct MemorySaveStore {
    entries: HashMap<String, String>,
    reject_writes: bool,
}

impl MemorySaveStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose writes always fail, for exercising best-effort saving.
    pub fn read_only() -> Self {
        Self {
            entries: HashMap::new(),
            reject_writes: true,
        }
    }

    pub fn with_entry(mut self, key: &str, value: &str) -> Self {
        self.entries.insert(key.to_string(), value.to_string());
        self
    }
}

impl SaveStore for MemorySaveStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        if self.reject_writes {
            return Err(PersistenceError::StoreUnavailable(key.to_string()));
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One `<key>.json` file per key inside `dir`. Writes go through a sibling temp file and a
/// rename so a crash never leaves a truncated save behind.
#[derive(Debug, Clone)]
pub struct FileSaveStore {
    dir: PathBuf,
}

impl FileSaveStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf, PersistenceError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(PersistenceError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl SaveStore for FileSaveStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PersistenceError::Io { path, source }),
        }
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).map_err(|source| PersistenceError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let tmp_path = self.dir.join(format!("{key}.json.tmp"));
        fs::write(&tmp_path, value).map_err(|source| PersistenceError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        if let Err(source) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(PersistenceError::Io { path, source });
        }
        Ok(())
    }
}

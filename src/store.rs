use crate::error::{FlavpError, Result};
use crate::schema::AppState;
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

const TMP_SUFFIX: &str = "tmp";

/// A string key-value store holding the serialized application state.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory. Writes go through a temporary file
/// that is renamed over the target.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(FlavpError::Store(format!("invalid storage key `{}`", key)));
        }
        Ok(self.root.join(format!("{}.json", key)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        write_atomic(&path, value)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

fn write_atomic(path: &Path, data: &str) -> Result<()> {
    let tmp = path.with_extension(TMP_SUFFIX);
    {
        let mut file = File::create(&tmp)?;
        file.write_all(data.as_bytes())?;
        file.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Reads a document leniently. Only unparseable JSON is an error; a document of the
/// wrong shape, or keys of the wrong type, fall back to empty collections.
pub fn parse_document(text: &str) -> Result<AppState> {
    let value: Value = serde_json::from_str(text)?;
    if !value.is_object() {
        warn!("State document is not an object; starting from an empty state");
        return Ok(AppState::default());
    }
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// The exported document: purchases, ledger and option vocabularies, pretty-printed.
pub fn export_document(state: &AppState) -> Result<String> {
    Ok(serde_json::to_string_pretty(state)?)
}

/// Loads the persisted state. Never fails: a missing, unreadable or malformed entry
/// yields an empty state.
pub fn load_state(store: &impl KeyValueStore, key: &str) -> AppState {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!("No persisted state under '{}'", key);
            return AppState::default();
        }
        Err(e) => {
            warn!("Could not read persisted state '{}': {}", key, e);
            return AppState::default();
        }
    };

    match parse_document(&raw) {
        Ok(state) => {
            info!(
                "Loaded {} purchases and {} ledger rows",
                state.purchases.len(),
                state.ledger.len()
            );
            state
        }
        Err(e) => {
            warn!("Persisted state '{}' is not valid JSON: {}", key, e);
            AppState::default()
        }
    }
}

pub fn save_state(store: &mut impl KeyValueStore, key: &str, state: &AppState) -> Result<()> {
    let json = serde_json::to_string(state)?;
    store.set(key, &json)?;
    debug!("Persisted state under '{}' ({} bytes)", key, json.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{LedgerEntry, MetaOptions};

    #[test]
    fn test_load_missing_key_is_empty() {
        let store = MemoryStore::new();
        assert_eq!(load_state(&store, "flavp"), AppState::default());
    }

    #[test]
    fn test_load_garbage_falls_back() {
        let mut store = MemoryStore::new();
        for garbage in ["{not json", "null", "[1, 2]", "42", r#"{"purchases": "not-an-array"}"#] {
            store.set("flavp", garbage).unwrap();
            let state = load_state(&store, "flavp");
            assert!(state.purchases.is_empty(), "input: {}", garbage);
            assert!(state.ledger.is_empty());
        }
    }

    #[test]
    fn test_parse_document_rejects_invalid_json() {
        assert!(matches!(
            parse_document("{\"purchases\": ["),
            Err(FlavpError::Serialization(_))
        ));
    }

    #[test]
    fn test_save_then_load() {
        let mut store = MemoryStore::new();
        let state = AppState {
            purchases: vec![],
            ledger: vec![LedgerEntry::new("2024-01-01", "Abertura", Some(10.0), None)],
            meta: MetaOptions {
                status_options: vec!["Viajando".into()],
                tipo_options: vec![],
            },
        };

        save_state(&mut store, "flavp", &state).unwrap();
        assert_eq!(load_state(&store, "flavp"), state);

        store.remove("flavp").unwrap();
        assert_eq!(store.get("flavp").unwrap(), None);
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("data")).unwrap();

        assert_eq!(store.get("flavp_web_state_v1").unwrap(), None);
        store.set("flavp_web_state_v1", "{\"ledger\": []}").unwrap();
        assert_eq!(
            store.get("flavp_web_state_v1").unwrap().as_deref(),
            Some("{\"ledger\": []}")
        );
        assert!(store.root().join("flavp_web_state_v1.json").exists());
        assert!(!store.root().join("flavp_web_state_v1.tmp").exists());

        store.remove("flavp_web_state_v1").unwrap();
        assert_eq!(store.get("flavp_web_state_v1").unwrap(), None);
    }

    #[test]
    fn test_file_store_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        assert!(store.path_for("../escape").is_err());
        assert!(store.path_for("").is_err());
    }
}

use coglab_core::ExperimentDocument;
use log::{debug, info};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Session-scoped key holding the document being edited.
pub const AUTOSAVE_KEY: &str = "experimentBuilderData";
/// Durable keys `experiment_<name>` hold named snapshots.
pub const SNAPSHOT_PREFIX: &str = "experiment_";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage i/o: {0}")]
    Io(#[from] io::Error),
    #[error("stored document is not valid: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid storage key {0:?}")]
    InvalidKey(String),
}

/// String key/value store with browser-storage semantics.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Lives as long as the process: the session scope.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries.keys().cloned().collect())
    }
}

/// Durable scope: one `<key>.json` file per entry in a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

const FILE_SUFFIX: &str = ".json";

impl FileStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let bad = key.is_empty()
            || key.starts_with('.')
            || key.contains(['/', '\\', '\0'])
            || key.contains("..");
        if bad {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}{FILE_SUFFIX}")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)?) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::write(self.path_for(key)?, value)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)?) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(key) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.strip_suffix(FILE_SUFFIX))
            {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Session autosave plus named durable snapshots of an [`ExperimentDocument`].
#[derive(Debug)]
pub struct Workspace<S, D> {
    session: S,
    durable: D,
}

impl<S: KeyValueStore, D: KeyValueStore> Workspace<S, D> {
    pub fn new(session: S, durable: D) -> Self {
        Self { session, durable }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// Overwrites the session copy; called after every edit.
    pub fn autosave(&mut self, doc: &ExperimentDocument) -> Result<(), StorageError> {
        let json = serde_json::to_string(doc)?;
        self.session.set(AUTOSAVE_KEY, &json)?;
        debug!("autosaved document ({} bytes)", json.len());
        Ok(())
    }

    pub fn restore(&self) -> Result<Option<ExperimentDocument>, StorageError> {
        match self.session.get(AUTOSAVE_KEY)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn discard_autosave(&mut self) -> Result<(), StorageError> {
        self.session.remove(AUTOSAVE_KEY)
    }

    pub fn save_snapshot(&mut self, name: &str, doc: &ExperimentDocument) -> Result<(), StorageError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StorageError::InvalidKey(name.to_string()));
        }
        let json = serde_json::to_string_pretty(doc)?;
        self.durable.set(&format!("{SNAPSHOT_PREFIX}{name}"), &json)?;
        info!("experiment {:?} saved", name);
        Ok(())
    }

    /// Reads a snapshot without touching the session.
    pub fn read_snapshot(&self, name: &str) -> Result<Option<ExperimentDocument>, StorageError> {
        match self.durable.get(&format!("{SNAPSHOT_PREFIX}{}", name.trim()))? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Loads a snapshot and makes it the session's current document.
    pub fn load_snapshot(&mut self, name: &str) -> Result<Option<ExperimentDocument>, StorageError> {
        let Some(doc) = self.read_snapshot(name)? else {
            return Ok(None);
        };
        self.autosave(&doc)?;
        info!("experiment {:?} loaded", name);
        Ok(Some(doc))
    }

    pub fn list_snapshots(&self) -> Result<Vec<String>, StorageError> {
        let mut names: Vec<String> = self
            .durable
            .keys()?
            .into_iter()
            .filter_map(|key| key.strip_prefix(SNAPSHOT_PREFIX).map(String::from))
            .collect();
        names.sort();
        Ok(names)
    }
}

//! Session store: the workflow's only channel for state between pages.
//!
//! Values are JSON text under a fixed set of keys. Unparseable text is never
//! an error for the reader: [`Session`] purges it and reports "absent".

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Result, WorkflowError};
use crate::models::{DatasetHandle, TrainingResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SessionKey {
    DatasetName,
    DatasetDetails,
    TrainingResults,
}

impl SessionKey {
    pub const ALL: [SessionKey; 3] = [
        SessionKey::DatasetName,
        SessionKey::DatasetDetails,
        SessionKey::TrainingResults,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SessionKey::DatasetName => "dataset_name",
            SessionKey::DatasetDetails => "dataset_details",
            SessionKey::TrainingResults => "training_results",
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw key/value persistence. Last writer wins; no locking across processes.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: SessionKey) -> Result<Option<String>>;
    fn set(&self, key: SessionKey, value: String) -> Result<()>;
    fn remove(&self, key: SessionKey) -> Result<()>;
}

impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    fn get(&self, key: SessionKey) -> Result<Option<String>> {
        (**self).get(key)
    }
    fn set(&self, key: SessionKey, value: String) -> Result<()> {
        (**self).set(key, value)
    }
    fn remove(&self, key: SessionKey) -> Result<()> {
        (**self).remove(key)
    }
}

/// In-process store. State lives as long as the value does.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<SessionKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: SessionKey) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(&key).cloned())
    }

    fn set(&self, key: SessionKey, value: String) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key, value);
        Ok(())
    }

    fn remove(&self, key: SessionKey) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(&key);
        Ok(())
    }
}

/// Store backed by `session.json` in a profile directory; survives restarts.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub const FILE_NAME: &'static str = "session.json";

    pub fn open(profile_dir: &Path) -> Result<Self> {
        fs::create_dir_all(profile_dir)?;
        Ok(Self {
            path: profile_dir.join(Self::FILE_NAME),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        match serde_json::from_str(&content) {
            Ok(map) => Ok(map),
            Err(e) => {
                warn!(path = %self.path.display(), "session file unreadable, starting empty: {}", e);
                Ok(BTreeMap::new())
            }
        }
    }

    fn write_all(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(map)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: SessionKey) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key.as_str()))
    }

    fn set(&self, key: SessionKey, value: String) -> Result<()> {
        let mut map = self.read_all()?;
        map.insert(key.as_str().to_string(), value);
        self.write_all(&map)
    }

    fn remove(&self, key: SessionKey) -> Result<()> {
        let mut map = self.read_all()?;
        if map.remove(key.as_str()).is_some() {
            self.write_all(&map)?;
        }
        Ok(())
    }
}

/// Typed view over a [`SessionStore`]. The single writer of dataset and result state.
#[derive(Debug)]
pub struct Session<S> {
    store: S,
}

impl<S: SessionStore> Session<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The current dataset, or `None` when it is absent or unusable.
    ///
    /// Both dataset keys must be present, parse, and name the same dataset;
    /// otherwise both are purged.
    pub fn dataset(&self) -> Result<Option<DatasetHandle>> {
        match self.load_dataset() {
            Err(WorkflowError::StateCorruption(key)) => {
                warn!(key = %key, "purging inconsistent dataset state");
                self.purge(&[SessionKey::DatasetName, SessionKey::DatasetDetails])?;
                Ok(None)
            }
            other => other,
        }
    }

    pub fn save_dataset(&self, dataset: &DatasetHandle) -> Result<()> {
        self.write(SessionKey::DatasetName, &dataset.name)?;
        self.write(SessionKey::DatasetDetails, dataset)
    }

    /// The latest training result, or `None` when absent or corrupt (corrupt text is purged).
    pub fn training_result(&self) -> Result<Option<TrainingResult>> {
        match self.read(SessionKey::TrainingResults) {
            Err(WorkflowError::StateCorruption(key)) => {
                warn!(key = %key, "purging corrupt training results");
                self.purge(&[key])?;
                Ok(None)
            }
            other => other,
        }
    }

    pub fn save_training_result(&self, result: &TrainingResult) -> Result<()> {
        self.write(SessionKey::TrainingResults, result)
    }

    pub fn clear(&self) -> Result<()> {
        self.purge(&SessionKey::ALL)
    }

    fn load_dataset(&self) -> Result<Option<DatasetHandle>> {
        let name: Option<String> = self.read(SessionKey::DatasetName)?;
        let details: Option<DatasetHandle> = self.read(SessionKey::DatasetDetails)?;
        match (name, details) {
            (None, None) => Ok(None),
            (Some(name), Some(handle)) if !name.is_empty() && name == handle.name => Ok(Some(handle)),
            (None, Some(_)) => Err(WorkflowError::StateCorruption(SessionKey::DatasetName)),
            (_, _) => Err(WorkflowError::StateCorruption(SessionKey::DatasetDetails)),
        }
    }

    fn read<T: DeserializeOwned>(&self, key: SessionKey) -> Result<Option<T>> {
        let Some(text) = self.store.get(key)? else {
            return Ok(None);
        };
        serde_json::from_str(&text).map(Some).map_err(|e| {
            debug!(key = %key, "session value does not parse: {}", e);
            WorkflowError::StateCorruption(key)
        })
    }

    fn write<T: Serialize + ?Sized>(&self, key: SessionKey, value: &T) -> Result<()> {
        self.store.set(key, serde_json::to_string(value)?)
    }

    fn purge(&self, keys: &[SessionKey]) -> Result<()> {
        for key in keys {
            self.store.remove(*key)?;
        }
        Ok(())
    }
}

//! Persistence slot for the task collection.
//!
//! The whole collection lives in one JSON array under a fixed key. On disk
//! the key names the file; every write replaces the file atomically
//! (temp file + rename), so readers only ever see a complete collection.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::StoreError;
use crate::task::Task;

/// Fixed key of the single persisted slot.
pub const STORAGE_KEY: &str = "taskflow_pro_tasks";

/// A single named key-value slot holding the encoded collection.
pub trait Storage {
    /// Raw stored value, or `None` if nothing has been written yet.
    fn read(&self) -> Result<Option<String>, StoreError>;

    /// Replace the stored value.
    fn write(&mut self, value: &str) -> Result<(), StoreError>;

    /// Human readable location for error messages.
    fn location(&self) -> String;
}

/// Slot backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The slot file inside `dir`, named after [`STORAGE_KEY`].
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(format!("{STORAGE_KEY}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for FileStorage {
    fn read(&self) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn write(&mut self, value: &str) -> Result<(), StoreError> {
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(write_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let mut f = fs::File::create(&tmp).map_err(write_err)?;
        f.write_all(value.as_bytes()).map_err(write_err)?;
        f.sync_all().map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)?;
        debug!(path = %self.path.display(), bytes = value.len(), "task slot written");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-process slot, used by tests and as a scratch store.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    value: Option<String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

impl Storage for MemoryStorage {
    fn read(&self) -> Result<Option<String>, StoreError> {
        Ok(self.value.clone())
    }

    fn write(&mut self, value: &str) -> Result<(), StoreError> {
        self.value = Some(value.to_string());
        Ok(())
    }

    fn location(&self) -> String {
        format!("memory:{STORAGE_KEY}")
    }
}

/// Decode the slot. An absent or blank slot is an empty collection; anything
/// else must parse as a task array.
pub fn load_tasks(storage: &dyn Storage) -> Result<Vec<Task>, StoreError> {
    let Some(raw) = storage.read()? else {
        return Ok(Vec::new());
    };
    if raw.trim().is_empty() {
        warn!(location = %storage.location(), "task slot is blank, treating as empty");
        return Ok(Vec::new());
    }
    serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
        location: storage.location(),
        source,
    })
}

/// Encode and write the whole collection.
pub fn save_tasks(storage: &mut dyn Storage, tasks: &[Task]) -> Result<(), StoreError> {
    let data = serde_json::to_string_pretty(tasks).map_err(StoreError::Serialize)?;
    storage.write(&data)
}

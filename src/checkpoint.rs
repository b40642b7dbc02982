//! Model checkpoint sinks.
//!
//! The fit calls [`Checkpoint::put`] once per completed pass; nothing else is
//! ever written, so whatever a sink holds is always a whole pass.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::fmt::Write as _;
use std::sync::{Mutex, PoisonError};

use crate::cluster::KmeansModel;
use crate::error::Result;

/// Persists model snapshots under a caller-chosen key.
pub trait Checkpoint: Send + Sync {
    fn put(&self, key: &str, model: &KmeansModel) -> Result<()>;
}

/// Keeps the latest snapshot per key in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    models: Mutex<HashMap<String, KmeansModel>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest snapshot stored under `key`.
    pub fn get(&self, key: &str) -> Option<KmeansModel> {
        self.models
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl Checkpoint for MemoryStore {
    fn put(&self, key: &str, model: &KmeansModel) -> Result<()> {
        self.models
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), model.clone());
        Ok(())
    }
}

/// One JSON file per key inside a directory.
///
/// Writes go to a temporary file that is renamed over the target, so readers
/// never see a half-written snapshot.
#[derive(Debug, Clone)]
pub struct JsonDir {
    root: PathBuf,
}

impl JsonDir {
    /// Use (and create if needed) `root`.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// File for `key`. Bytes outside `[A-Za-z0-9_-]` are percent-encoded, so
    /// distinct keys never share a file.
    fn path(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len());
        for b in key.bytes() {
            if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
                name.push(char::from(b));
            } else {
                let _ = write!(name, "%{b:02X}");
            }
        }
        self.root.join(format!("{name}.json"))
    }

    /// Read back the snapshot stored under `key`.
    pub fn load(&self, key: &str) -> Result<KmeansModel> {
        let bytes = fs::read(self.path(key))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl Checkpoint for JsonDir {
    fn put(&self, key: &str, model: &KmeansModel) -> Result<()> {
        let target = self.path(key);
        let tmp = target.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            serde_json::to_writer(&mut file, model)?;
            file.flush()?;
        }
        fs::rename(&tmp, &target)?;
        Ok(())
    }
}

//! `RunStore` — byte-level persistence for finished/in-progress Run
//! artifacts, keyed by `RunId`. This crate only moves bytes; `oce_pipeline`
//! owns the typed `Run`/`Cluster`/... shapes and (de)serializes them as
//! canonical JSON through this trait, keeping storage plumbing separate
//! from the typed domain model that builds the artifacts.

use crate::canonical_json::write_bytes_atomically;
use crate::{IoError, IoResult};
use oce_core::RunId;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

pub trait RunStore: Send + Sync {
    /// Persist (or overwrite) the canonical JSON bytes for `run_id`.
    fn put(&self, run_id: &RunId, bytes: &[u8]) -> IoResult<()>;

    /// Fetch the canonical JSON bytes for `run_id`, if it exists.
    fn get(&self, run_id: &RunId) -> IoResult<Option<Vec<u8>>>;

    /// All known run ids, ascending by `RunId` (which sorts chronologically
    /// since the embedded timestamp is fixed-width RFC3339).
    fn list_run_ids(&self) -> IoResult<Vec<RunId>>;

    /// The most recently published run id, if any.
    fn latest_run_id(&self) -> IoResult<Option<RunId>> {
        Ok(self.list_run_ids()?.into_iter().last())
    }
}

/// Forwarding impl so a store can be shared (e.g. `Arc`-held by both the
/// coordinator and an in-process reader) without wrapping it in a newtype.
impl<T: RunStore + ?Sized> RunStore for Arc<T> {
    fn put(&self, run_id: &RunId, bytes: &[u8]) -> IoResult<()> {
        (**self).put(run_id, bytes)
    }
    fn get(&self, run_id: &RunId) -> IoResult<Option<Vec<u8>>> {
        (**self).get(run_id)
    }
    fn list_run_ids(&self) -> IoResult<Vec<RunId>> {
        (**self).list_run_ids()
    }
}

/// In-memory `RunStore` for tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryRunStore {
    runs: RwLock<BTreeMap<RunId, Vec<u8>>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunStore for InMemoryRunStore {
    fn put(&self, run_id: &RunId, bytes: &[u8]) -> IoResult<()> {
        self.runs
            .write()
            .expect("run store lock poisoned")
            .insert(run_id.clone(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, run_id: &RunId) -> IoResult<Option<Vec<u8>>> {
        Ok(self
            .runs
            .read()
            .expect("run store lock poisoned")
            .get(run_id)
            .cloned())
    }

    fn list_run_ids(&self) -> IoResult<Vec<RunId>> {
        Ok(self
            .runs
            .read()
            .expect("run store lock poisoned")
            .keys()
            .cloned()
            .collect())
    }
}

/// JSON-file-backed `RunStore`. Each run is written to
/// `<base_dir>/<run_id>.json`, atomically (tmp-file + `sync_all` +
/// `fs::rename`), mirroring `vm_cli`'s `write_bytes_atomically` publication
/// pattern.
pub struct FsRunStore {
    base_dir: PathBuf,
}

impl FsRunStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn path_for(&self, run_id: &RunId) -> PathBuf {
        self.base_dir.join(format!("{}.json", run_id.as_str()))
    }
}

impl RunStore for FsRunStore {
    fn put(&self, run_id: &RunId, bytes: &[u8]) -> IoResult<()> {
        write_bytes_atomically(&self.path_for(run_id), bytes).map_err(IoError::from)
    }

    fn get(&self, run_id: &RunId) -> IoResult<Option<Vec<u8>>> {
        let path = self.path_for(run_id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read(path)?))
    }

    fn list_run_ids(&self) -> IoResult<Vec<RunId>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(".json") {
                if let Ok(id) = RunId::from_str(stem) {
                    ids.push(id);
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

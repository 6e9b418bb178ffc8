//! `LeaseManager` — the single-leader lease the Run Coordinator acquires
//! before starting a batch. Only one lease can be held at a time; a second
//! acquisition attempt while the lease is live fails immediately (no
//! queueing), which is what lets the coordinator return `AlreadyRunning`
//! without blocking.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

pub const LEASE_TTL_MINUTES: i64 = 30;

#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum LeaseError {
    #[error("lease already held")]
    AlreadyHeld,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Lease {
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

pub trait LeaseManager: Send + Sync {
    /// Attempt to acquire the lease for `holder` at `now`. Fails with
    /// `AlreadyHeld` if a live (non-expired) lease is already held by
    /// anyone else.
    fn try_acquire(&self, holder: &str, now: DateTime<Utc>) -> Result<Lease, LeaseError>;

    /// Release a lease this holder acquired. A no-op if the lease already
    /// expired or was released.
    fn release(&self, holder: &str);
}

#[derive(Default)]
pub struct InMemoryLeaseManager {
    current: Mutex<Option<Lease>>,
}

impl InMemoryLeaseManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LeaseManager for InMemoryLeaseManager {
    fn try_acquire(&self, holder: &str, now: DateTime<Utc>) -> Result<Lease, LeaseError> {
        let mut guard = self.current.lock().expect("lease lock poisoned");
        if let Some(existing) = guard.as_ref() {
            if !existing.is_expired(now) {
                return Err(LeaseError::AlreadyHeld);
            }
        }
        let lease = Lease {
            holder: holder.to_string(),
            acquired_at: now,
            expires_at: now + Duration::minutes(LEASE_TTL_MINUTES),
        };
        *guard = Some(lease.clone());
        Ok(lease)
    }

    fn release(&self, holder: &str) {
        let mut guard = self.current.lock().expect("lease lock poisoned");
        if let Some(existing) = guard.as_ref() {
            if existing.holder == holder {
                *guard = None;
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
struct LeaseFile {
    holder: String,
    acquired_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// File-backed `LeaseManager`: the lease is a single lock file created with
/// `O_EXCL` semantics (`create_new`), so two separate `oce` processes racing
/// to acquire it get exactly one winner — the same "whoever wins the
/// exclusive create, wins" pattern `write_bytes_atomically` uses for
/// publication, applied here to acquisition instead.
pub struct FsLeaseManager {
    lock_path: PathBuf,
}

impl FsLeaseManager {
    pub fn new(lock_path: impl Into<PathBuf>) -> Self {
        Self {
            lock_path: lock_path.into(),
        }
    }

    fn read(&self) -> Option<LeaseFile> {
        let bytes = fs::read(&self.lock_path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    fn write(&self, lease: &LeaseFile) -> std::io::Result<()> {
        if let Some(parent) = self.lock_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec(lease)?;
        let mut f = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)?;
        f.write_all(&bytes)?;
        f.sync_all()
    }
}

impl LeaseManager for FsLeaseManager {
    fn try_acquire(&self, holder: &str, now: DateTime<Utc>) -> Result<Lease, LeaseError> {
        let lease = LeaseFile {
            holder: holder.to_string(),
            acquired_at: now,
            expires_at: now + Duration::minutes(LEASE_TTL_MINUTES),
        };
        match self.write(&lease) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let expired = self
                    .read()
                    .map(|existing| now >= existing.expires_at)
                    .unwrap_or(true);
                if !expired {
                    return Err(LeaseError::AlreadyHeld);
                }
                // Stale lock: the prior holder's TTL elapsed without
                // releasing (crash). Reclaim it for the new holder.
                let _ = fs::remove_file(&self.lock_path);
                self.write(&lease).map_err(|_| LeaseError::AlreadyHeld)?;
            }
            Err(_) => return Err(LeaseError::AlreadyHeld),
        }
        Ok(Lease {
            holder: lease.holder,
            acquired_at: lease.acquired_at,
            expires_at: lease.expires_at,
        })
    }

    fn release(&self, holder: &str) {
        if let Some(existing) = self.read() {
            if existing.holder == holder {
                let _ = fs::remove_file(&self.lock_path);
            }
        }
    }
}

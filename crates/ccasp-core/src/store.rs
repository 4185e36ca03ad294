//! Persistence seam for the two JSON state documents and the retained
//! baseline template snapshots.
//!
//! Loads never fail: a missing file is the default document and a malformed
//! one is logged and replaced by the default. Saves fully overwrite their
//! target and report write failures as [`CcaspError::Persistence`].

use crate::asset::AssetRef;
use crate::error::{CcaspError, Result};
use crate::update_state::UpdateState;
use crate::usage::UsageTracking;
use crate::{io, paths};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub trait StateStore {
    fn load_usage(&self) -> UsageTracking;
    fn save_usage(&mut self, usage: &UsageTracking) -> Result<()>;

    fn load_update_state(&self) -> UpdateState;
    fn save_update_state(&mut self, state: &UpdateState) -> Result<()>;

    /// Template text `asset` was last deployed from, if retained.
    fn load_baseline(&self, asset: &AssetRef) -> Option<String>;
    fn save_baseline(&mut self, asset: &AssetRef, content: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// JsonStateStore
// ---------------------------------------------------------------------------

/// Store backed by files under `<root>/.claude/config`.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    root: PathBuf,
}

impl JsonStateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn baseline_path(&self, asset: &AssetRef) -> PathBuf {
        paths::baselines_dir(&self.root)
            .join(asset.kind.plural())
            .join(&asset.name)
    }
}

fn load_json<T: DeserializeOwned + Default>(path: &Path) -> T {
    let data = match io::read_optional(path) {
        Ok(Some(data)) => data,
        Ok(None) => return T::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "state file unreadable, using defaults");
            return T::default();
        }
    };
    match serde_json::from_str(&data) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "state file malformed, using defaults");
            T::default()
        }
    }
}

fn persist(path: &Path, data: &[u8]) -> Result<()> {
    io::atomic_write(path, data).map_err(|e| match e {
        CcaspError::Io(source) => CcaspError::Persistence {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut data = serde_json::to_string_pretty(value)?;
    data.push('\n');
    persist(path, data.as_bytes())
}

impl StateStore for JsonStateStore {
    fn load_usage(&self) -> UsageTracking {
        load_json(&paths::usage_tracking_path(&self.root))
    }

    fn save_usage(&mut self, usage: &UsageTracking) -> Result<()> {
        save_json(&paths::usage_tracking_path(&self.root), usage)
    }

    fn load_update_state(&self) -> UpdateState {
        load_json(&paths::state_path(&self.root))
    }

    fn save_update_state(&mut self, state: &UpdateState) -> Result<()> {
        save_json(&paths::state_path(&self.root), state)
    }

    fn load_baseline(&self, asset: &AssetRef) -> Option<String> {
        io::read_optional(&self.baseline_path(asset)).ok().flatten()
    }

    fn save_baseline(&mut self, asset: &AssetRef, content: &str) -> Result<()> {
        persist(&self.baseline_path(asset), content.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// MemoryStateStore
// ---------------------------------------------------------------------------

/// In-memory store for tests and dry runs. `fail_writes` makes every save
/// return a persistence error.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    pub usage: UsageTracking,
    pub update: UpdateState,
    pub baselines: BTreeMap<AssetRef, String>,
    pub fail_writes: bool,
}

impl MemoryStateStore {
    fn check_writable(&self, what: &str) -> Result<()> {
        if self.fail_writes {
            return Err(CcaspError::Persistence {
                path: PathBuf::from(what),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only store"),
            });
        }
        Ok(())
    }
}

impl StateStore for MemoryStateStore {
    fn load_usage(&self) -> UsageTracking {
        self.usage.clone()
    }

    fn save_usage(&mut self, usage: &UsageTracking) -> Result<()> {
        self.check_writable("usage-tracking.json")?;
        self.usage = usage.clone();
        Ok(())
    }

    fn load_update_state(&self) -> UpdateState {
        self.update.clone()
    }

    fn save_update_state(&mut self, state: &UpdateState) -> Result<()> {
        self.check_writable("ccasp-state.json")?;
        self.update = state.clone();
        Ok(())
    }

    fn load_baseline(&self, asset: &AssetRef) -> Option<String> {
        self.baselines.get(asset).cloned()
    }

    fn save_baseline(&mut self, asset: &AssetRef, content: &str) -> Result<()> {
        self.check_writable("baseline")?;
        self.baselines.insert(asset.clone(), content.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

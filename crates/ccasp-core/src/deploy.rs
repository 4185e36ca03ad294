use crate::asset::AssetRef;
use crate::decision::{Action, Decision};
use crate::error::{CcaspError, Result};
use crate::store::StateStore;
use crate::usage::UsageTracking;
use crate::{io, paths};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Installed,
    Replaced,
    Preserved,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeploymentEntry {
    pub asset: AssetRef,
    pub action: Action,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DeploymentReport {
    pub entries: Vec<DeploymentEntry>,
    /// Set when the usage-tracking state could not be saved after the batch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persist_error: Option<String>,
}

impl DeploymentReport {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.entries.iter().filter(|e| e.outcome == outcome).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &DeploymentEntry> {
        self.entries.iter().filter(|e| e.outcome == Outcome::Failed)
    }

    pub fn backups(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().filter_map(|e| e.backup_path.as_deref())
    }

    pub fn entry(&self, asset: &AssetRef) -> Option<&DeploymentEntry> {
        self.entries.iter().find(|e| &e.asset == asset)
    }
}

// ---------------------------------------------------------------------------
// Backups
// ---------------------------------------------------------------------------

/// ISO-8601 UTC with `:` and `.` replaced by `-`, safe in file names on
/// every platform.
pub fn backup_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H-%M-%S-%3fZ").to_string()
}

/// `<backup_dir>/<file>.<timestamp>.bak`, suffixed with a counter if that
/// name is already taken.
pub fn backup_path(backup_dir: &Path, asset: &AssetRef, now: DateTime<Utc>) -> PathBuf {
    let stem = format!("{}.{}", asset.backup_stem(), backup_timestamp(now));
    let mut candidate = backup_dir.join(format!("{stem}.bak"));
    let mut n = 1;
    while candidate.exists() {
        candidate = backup_dir.join(format!("{stem}-{n}.bak"));
        n += 1;
    }
    candidate
}

fn backup_error(path: &Path, e: CcaspError) -> CcaspError {
    match e {
        CcaspError::Io(source) => CcaspError::BackupFailed {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Applies decisions to the project tree. Each asset succeeds or fails on
/// its own; a failure never stops the batch and never leaves a
/// half-written file.
pub struct Executor<'a> {
    root: &'a Path,
    backup_dir: PathBuf,
    store: &'a mut dyn StateStore,
}

impl<'a> Executor<'a> {
    pub fn new(root: &'a Path, store: &'a mut dyn StateStore) -> Self {
        Self {
            root,
            backup_dir: paths::backups_dir(root),
            store,
        }
    }

    pub fn with_backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = dir.into();
        self
    }

    pub fn execute(&mut self, decisions: &[Decision]) -> DeploymentReport {
        let mut usage = self.store.load_usage();
        let mut report = DeploymentReport::default();

        for decision in decisions {
            let now = Utc::now();
            let mut backup_path = None;
            let entry = match self.apply(decision, &mut usage, now, &mut backup_path) {
                Ok(outcome) => DeploymentEntry {
                    asset: decision.asset.clone(),
                    action: decision.action,
                    outcome,
                    backup_path,
                    error: None,
                },
                Err(e) => {
                    tracing::warn!(asset = %decision.asset, error = %e, "deployment failed");
                    DeploymentEntry {
                        asset: decision.asset.clone(),
                        action: decision.action,
                        outcome: Outcome::Failed,
                        backup_path,
                        error: Some(e.to_string()),
                    }
                }
            };
            report.entries.push(entry);
        }

        if let Err(e) = self.store.save_usage(&usage) {
            tracing::warn!(error = %e, "usage tracking not saved");
            report.persist_error = Some(e.to_string());
        }
        report
    }

    /// `backup` is filled in as soon as a backup exists, so a failed write
    /// after it still reports where the user's copy went.
    fn apply(
        &mut self,
        decision: &Decision,
        usage: &mut UsageTracking,
        now: DateTime<Utc>,
        backup: &mut Option<PathBuf>,
    ) -> Result<Outcome> {
        let asset = &decision.asset;
        asset.validate()?;
        let target = asset.target_path(self.root);

        match decision.action {
            Action::Skip => {
                if decision.reset_baseline {
                    self.adopt_baseline(decision, usage, now);
                } else if decision.keeps_unflagged_edit() {
                    if let Some(current) = &decision.current_hash {
                        usage.record_customization(asset, current, now);
                        tracing::info!(%asset, "kept local edits");
                    }
                }
                Ok(Outcome::Preserved)
            }
            Action::Install => {
                self.write(decision, &target)?;
                self.record_baseline(decision, usage, now);
                tracing::info!(%asset, "installed");
                Ok(Outcome::Installed)
            }
            Action::Replace => {
                self.write(decision, &target)?;
                self.record_baseline(decision, usage, now);
                tracing::info!(%asset, "replaced");
                Ok(Outcome::Replaced)
            }
            Action::BackupAndReplace => {
                let path = self.backup(asset, &target, now)?;
                tracing::info!(%asset, backup = %path.display(), "backed up");
                *backup = Some(path);
                self.write(decision, &target)?;
                self.record_baseline(decision, usage, now);
                tracing::info!(%asset, "replaced after backup");
                Ok(Outcome::Replaced)
            }
        }
    }

    /// Up-to-date skip: record the template as baseline unless it already is.
    fn adopt_baseline(&mut self, decision: &Decision, usage: &mut UsageTracking, now: DateTime<Utc>) {
        let current = usage
            .get(&decision.asset)
            .is_some_and(|r| r.is_baseline(&decision.template.hash()))
            && self.store.load_baseline(&decision.asset).is_some();
        if !current {
            self.record_baseline(decision, usage, now);
        }
    }

    fn backup(&self, asset: &AssetRef, target: &Path, now: DateTime<Utc>) -> Result<PathBuf> {
        let path = backup_path(&self.backup_dir, asset, now);
        let existing = std::fs::read(target).map_err(|source| CcaspError::BackupFailed {
            path: path.clone(),
            source,
        })?;
        io::atomic_write(&path, &existing).map_err(|e| backup_error(&path, e))?;
        Ok(path)
    }

    fn write(&self, decision: &Decision, target: &Path) -> Result<()> {
        io::atomic_write(target, decision.template.content.as_bytes())?;
        if decision.asset.kind.is_executable() {
            io::set_executable(target)?;
        }
        Ok(())
    }

    fn record_baseline(&mut self, decision: &Decision, usage: &mut UsageTracking, now: DateTime<Utc>) {
        let template = &decision.template;
        usage.record_deployment(&decision.asset, &template.hash(), &template.version, now);
        if let Err(e) = self.store.save_baseline(&decision.asset, &template.content) {
            tracing::warn!(asset = %decision.asset, error = %e, "baseline snapshot not saved");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

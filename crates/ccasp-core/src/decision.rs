//! Per-asset deployment decisions.
//!
//! [`Planner::assess`] gathers the facts for one asset (does it exist, has
//! the user customized it, how much did the template move) and [`decide`]
//! turns those facts plus an [`OverwriteMode`] into an [`Action`]. `decide`
//! is pure; in `interactive` mode a customized asset comes back as a
//! conflict, and the caller answers it through a [`ChoiceProvider`].
//!
//! A customized asset is only ever replaced under `force_overwrite` or with
//! a backup taken first.

use crate::asset::AssetRef;
use crate::classify::{classify, ChangeLevel, ChangeReport};
use crate::detect::{detect, Detection};
use crate::error::{CcaspError, Result};
use crate::store::StateStore;
use crate::template::{Template, TemplateRegistry};
use crate::usage::UsageTracking;
use crate::{hash, io};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// OverwriteMode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwriteMode {
    Interactive,
    ForceOverwrite,
    ForceSkip,
    #[default]
    AutoBackupOnConflict,
}

impl OverwriteMode {
    pub fn as_str(self) -> &'static str {
        match self {
            OverwriteMode::Interactive => "interactive",
            OverwriteMode::ForceOverwrite => "force_overwrite",
            OverwriteMode::ForceSkip => "force_skip",
            OverwriteMode::AutoBackupOnConflict => "auto_backup_on_conflict",
        }
    }
}

impl fmt::Display for OverwriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OverwriteMode {
    type Err = CcaspError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "interactive" | "ask" => Ok(OverwriteMode::Interactive),
            "forceoverwrite" | "overwrite" => Ok(OverwriteMode::ForceOverwrite),
            "forceskip" | "skip" => Ok(OverwriteMode::ForceSkip),
            "autobackuponconflict" | "autobackup" | "backup" => {
                Ok(OverwriteMode::AutoBackupOnConflict)
            }
            _ => Err(CcaspError::InvalidOverwriteMode(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Action / Decision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Install,
    Skip,
    Replace,
    BackupAndReplace,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Install => "install",
            Action::Skip => "skip",
            Action::Replace => "replace",
            Action::BackupAndReplace => "backup_and_replace",
        }
    }

    pub fn writes(self) -> bool {
        !matches!(self, Action::Skip)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// No local copy yet.
    NotDeployed,
    /// Local copy already equals the new template.
    UpToDate,
    /// Local copy matches its baseline; nothing of the user's is lost.
    Pristine,
    /// Customized, and the template has not changed since its baseline.
    TemplateUnchanged,
    ForcedSkip,
    ForcedOverwrite,
    /// Customized; replaced after taking a backup.
    ConflictBackedUp,
    UserChoice,
}

impl DecisionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionReason::NotDeployed => "not_deployed",
            DecisionReason::UpToDate => "up_to_date",
            DecisionReason::Pristine => "pristine",
            DecisionReason::TemplateUnchanged => "template_unchanged",
            DecisionReason::ForcedSkip => "forced_skip",
            DecisionReason::ForcedOverwrite => "forced_overwrite",
            DecisionReason::ConflictBackedUp => "conflict_backed_up",
            DecisionReason::UserChoice => "user_choice",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub asset: AssetRef,
    pub action: Action,
    pub reason: DecisionReason,
    /// Reset the stored baseline to the new template and clear `customized`.
    pub reset_baseline: bool,
    /// What the detector saw before deciding. A kept asset that drifted is
    /// flagged customized from it.
    pub detection: Detection,
    /// Hash of the local content at assessment time.
    #[serde(skip)]
    pub current_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub significance: Option<ChangeReport>,
    pub template_version: String,
    #[serde(skip)]
    pub template: Template,
}

impl Decision {
    /// Kept locally edited content that is not yet flagged in usage tracking.
    pub fn keeps_unflagged_edit(&self) -> bool {
        !self.action.writes() && !self.reset_baseline && self.detection.is_unflagged_customization()
    }
}

// ---------------------------------------------------------------------------
// Assessment
// ---------------------------------------------------------------------------

/// Everything known about one asset before deciding. Also what an
/// interactive prompt shows the user.
#[derive(Debug, Clone, Serialize)]
pub struct Assessment {
    pub asset: AssetRef,
    pub path: PathBuf,
    pub detection: Detection,
    #[serde(skip)]
    pub current_hash: Option<String>,
    /// Local content already equals the new template.
    pub up_to_date: bool,
    /// Template change since the asset's baseline. Only computed for
    /// existing, customized assets.
    pub significance: Option<ChangeReport>,
    pub template_version: String,
    #[serde(skip)]
    pub template: Template,
}

impl Assessment {
    fn decision(&self, action: Action, reason: DecisionReason, reset_baseline: bool) -> Decision {
        Decision {
            asset: self.asset.clone(),
            action,
            reason,
            reset_baseline,
            detection: self.detection.clone(),
            current_hash: self.current_hash.clone(),
            significance: self.significance.clone(),
            template_version: self.template_version.clone(),
            template: self.template.clone(),
        }
    }

    /// True when the baseline text was known and the template has not moved
    /// since it.
    fn template_unchanged(&self) -> bool {
        self.significance
            .as_ref()
            .is_some_and(|s| s.level == ChangeLevel::None)
    }
}

// ---------------------------------------------------------------------------
// decide
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Verdict {
    Decided(Decision),
    /// Interactive mode, customized asset: the caller must choose.
    NeedsChoice(Assessment),
}

pub fn decide(a: &Assessment, mode: OverwriteMode) -> Verdict {
    use Action::*;
    use DecisionReason::*;

    if !a.detection.exists() {
        return Verdict::Decided(a.decision(Install, NotDeployed, true));
    }

    if mode == OverwriteMode::ForceSkip {
        return Verdict::Decided(a.decision(Skip, ForcedSkip, false));
    }

    if a.up_to_date {
        return Verdict::Decided(a.decision(Skip, UpToDate, true));
    }

    if !a.detection.is_customized() {
        return Verdict::Decided(a.decision(Replace, Pristine, true));
    }

    let decision = match mode {
        OverwriteMode::ForceOverwrite => a.decision(Replace, ForcedOverwrite, true),
        _ if a.template_unchanged() => a.decision(Skip, TemplateUnchanged, false),
        OverwriteMode::AutoBackupOnConflict => a.decision(BackupAndReplace, ConflictBackedUp, true),
        OverwriteMode::Interactive => return Verdict::NeedsChoice(a.clone()),
        OverwriteMode::ForceSkip => a.decision(Skip, ForcedSkip, false),
    };
    Verdict::Decided(decision)
}

// ---------------------------------------------------------------------------
// Interactive resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    Skip,
    BackupAndReplace,
    Overwrite,
}

impl Choice {
    fn as_mode(self) -> OverwriteMode {
        match self {
            Choice::Skip => OverwriteMode::ForceSkip,
            Choice::BackupAndReplace => OverwriteMode::AutoBackupOnConflict,
            Choice::Overwrite => OverwriteMode::ForceOverwrite,
        }
    }
}

/// The UI collaborator that answers interactive conflicts.
pub trait ChoiceProvider {
    fn choose(&mut self, conflict: &Assessment) -> Choice;
}

/// Apply a user's choice to a conflict, as if the choice had been the mode.
pub fn resolve_choice(conflict: &Assessment, choice: Choice) -> Decision {
    let mut decision = match decide(conflict, choice.as_mode()) {
        Verdict::Decided(d) => d,
        Verdict::NeedsChoice(a) => a.decision(Action::Skip, DecisionReason::ForcedSkip, false),
    };
    decision.reason = DecisionReason::UserChoice;
    decision
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PlanFailure {
    pub asset: AssetRef,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Plan {
    pub decisions: Vec<Decision>,
    /// Unanswered interactive conflicts.
    pub conflicts: Vec<Assessment>,
    /// Assets that could not be assessed (e.g. template not found).
    pub failures: Vec<PlanFailure>,
}

impl Plan {
    /// Ask `provider` about every conflict and fold the answers into
    /// `decisions`.
    pub fn resolve_conflicts(mut self, provider: &mut dyn ChoiceProvider) -> Self {
        for conflict in std::mem::take(&mut self.conflicts) {
            let choice = provider.choose(&conflict);
            tracing::debug!(asset = %conflict.asset, ?choice, "conflict resolved");
            self.decisions.push(resolve_choice(&conflict, choice));
        }
        self.decisions.sort_by(|a, b| a.asset.cmp(&b.asset));
        self
    }
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

pub struct Planner<'a> {
    root: &'a Path,
    registry: &'a dyn TemplateRegistry,
    store: &'a dyn StateStore,
}

impl<'a> Planner<'a> {
    pub fn new(
        root: &'a Path,
        registry: &'a dyn TemplateRegistry,
        store: &'a dyn StateStore,
    ) -> Self {
        Self {
            root,
            registry,
            store,
        }
    }

    pub fn assess(&self, asset: &AssetRef, usage: &UsageTracking) -> Result<Assessment> {
        asset.validate()?;
        let template = self.registry.get_template(asset)?;
        let path = asset.target_path(self.root);
        let current = io::read_optional(&path)?;
        let record = usage.get(asset);
        let detection = detect(current.as_deref(), record);

        let current_hash = current.as_deref().map(hash::content_hash);
        let up_to_date = current_hash.as_deref() == Some(template.hash().as_str());

        let significance = match current.as_deref() {
            Some(current) if detection.is_customized() && !up_to_date => {
                let baseline_hash = record.and_then(|r| r.template_baseline_hash.as_deref());
                let old = self.baseline_text(asset, baseline_hash);
                Some(classify(old.as_deref().unwrap_or(current), &template.content))
            }
            _ => None,
        };

        Ok(Assessment {
            asset: asset.clone(),
            path,
            detection,
            current_hash,
            up_to_date,
            significance,
            template_version: template.version.clone(),
            template,
        })
    }

    /// Template text the local copy was derived from: the retained snapshot
    /// if it still matches the recorded baseline hash, otherwise registry
    /// history.
    fn baseline_text(&self, asset: &AssetRef, baseline_hash: Option<&str>) -> Option<String> {
        let baseline_hash = baseline_hash?;
        self.store
            .load_baseline(asset)
            .filter(|text| hash::content_hash(text) == baseline_hash)
            .or_else(|| self.registry.template_by_hash(asset, baseline_hash))
    }

    pub fn plan(&self, assets: &[AssetRef], mode: OverwriteMode) -> Plan {
        let usage = self.store.load_usage();
        let mut plan = Plan::default();
        for asset in assets {
            match self.assess(asset, &usage) {
                Ok(assessment) => match decide(&assessment, mode) {
                    Verdict::Decided(d) => {
                        tracing::debug!(%asset, action = %d.action, reason = ?d.reason, "decided");
                        plan.decisions.push(d);
                    }
                    Verdict::NeedsChoice(a) => {
                        tracing::debug!(%asset, "needs user choice");
                        plan.conflicts.push(a);
                    }
                },
                Err(e) => {
                    tracing::warn!(%asset, error = %e, "cannot plan asset");
                    plan.failures.push(PlanFailure {
                        asset: asset.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        plan
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

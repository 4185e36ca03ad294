//! One full sync pass: resolve features, plan, settle conflicts, deploy,
//! then remember which features are installed.

use crate::asset::AssetRef;
use crate::decision::{Assessment, ChoiceProvider, Decision, OverwriteMode, PlanFailure, Planner};
use crate::deploy::{DeploymentReport, Executor, Outcome};
use crate::detect::{detect, Detection};
use crate::feature::FeatureRegistry;
use crate::io;
use crate::store::StateStore;
use crate::template::TemplateRegistry;
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct SyncRequest {
    /// Feature names as selected; resolution ignores unknown ones.
    pub features: Vec<String>,
    pub mode: OverwriteMode,
    /// Defaults to `.claude/backups`.
    pub backup_dir: Option<PathBuf>,
    /// Plan only. Nothing is written and no one is prompted.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub features: Vec<String>,
    pub dry_run: bool,
    /// Decisions that were (or, in a dry run, would be) applied.
    pub decisions: Vec<Decision>,
    pub deployment: DeploymentReport,
    pub plan_failures: Vec<PlanFailure>,
    /// Interactive conflicts nobody answered. Their files are untouched.
    pub unresolved_conflicts: Vec<Assessment>,
    pub post_config_features: Vec<String>,
    pub post_config_assets: Vec<AssetRef>,
    pub unknown_features: Vec<String>,
    /// Features with every asset in place after this run.
    pub installed_features: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub persist_errors: Vec<String>,
}

impl SyncReport {
    pub fn has_failures(&self) -> bool {
        !self.plan_failures.is_empty() || self.deployment.failed().next().is_some()
    }
}

// ---------------------------------------------------------------------------
// Syncer
// ---------------------------------------------------------------------------

pub struct Syncer<'a> {
    root: &'a Path,
    features: &'a FeatureRegistry,
    templates: &'a dyn TemplateRegistry,
    store: &'a mut dyn StateStore,
    provider: Option<&'a mut dyn ChoiceProvider>,
}

impl<'a> Syncer<'a> {
    pub fn new(
        root: &'a Path,
        features: &'a FeatureRegistry,
        templates: &'a dyn TemplateRegistry,
        store: &'a mut dyn StateStore,
    ) -> Self {
        Self {
            root,
            features,
            templates,
            store,
            provider: None,
        }
    }

    /// Answer interactive conflicts with `provider`. Without one they are
    /// reported as unresolved and their files are preserved.
    pub fn with_provider(mut self, provider: &'a mut dyn ChoiceProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn sync(&mut self, request: &SyncRequest) -> SyncReport {
        let resolution = self.features.resolve(&request.features);
        tracing::debug!(
            features = ?resolution.features,
            assets = resolution.assets.len(),
            "resolved features"
        );

        let mut plan =
            Planner::new(self.root, self.templates, &*self.store).plan(&resolution.assets, request.mode);

        if !request.dry_run {
            if let Some(provider) = self.provider.as_deref_mut() {
                plan = plan.resolve_conflicts(provider);
            }
        }

        let mut report = SyncReport {
            features: resolution.features.clone(),
            dry_run: request.dry_run,
            plan_failures: plan.failures,
            unresolved_conflicts: plan.conflicts,
            post_config_features: resolution.post_config_features,
            post_config_assets: resolution.post_config_assets,
            unknown_features: resolution.unknown,
            ..Default::default()
        };

        if request.dry_run {
            report.decisions = plan.decisions;
            return report;
        }

        let backup_dir = request
            .backup_dir
            .clone()
            .unwrap_or_else(|| crate::paths::backups_dir(self.root));
        report.deployment = Executor::new(self.root, &mut *self.store)
            .with_backup_dir(backup_dir)
            .execute(&plan.decisions);
        report.decisions = plan.decisions;
        if let Some(e) = &report.deployment.persist_error {
            report.persist_errors.push(e.clone());
        }
        if let Err(e) = self.flag_unresolved(&report.unresolved_conflicts) {
            tracing::warn!(error = %e, "unresolved conflicts not flagged");
            report.persist_errors.push(e.to_string());
        }

        let incomplete: BTreeSet<&AssetRef> = report
            .plan_failures
            .iter()
            .map(|f| &f.asset)
            .chain(report.unresolved_conflicts.iter().map(|c| &c.asset))
            .chain(report.deployment.failed().map(|e| &e.asset))
            .collect();
        report.installed_features = resolution
            .features
            .iter()
            .filter(|name| {
                self.features
                    .get(name)
                    .is_some_and(|f| f.assets().all(|a| !incomplete.contains(&a)))
            })
            .cloned()
            .collect();

        let mut state = self.store.load_update_state();
        for name in &report.installed_features {
            state.mark_feature_installed(name);
        }
        if let Err(e) = self.store.save_update_state(&state) {
            tracing::warn!(error = %e, "installed features not saved");
            report.persist_errors.push(e.to_string());
        }

        tracing::info!(
            installed = report.deployment.count(Outcome::Installed),
            replaced = report.deployment.count(Outcome::Replaced),
            preserved = report.deployment.count(Outcome::Preserved),
            failed = report.deployment.count(Outcome::Failed),
            "sync finished"
        );
        report
    }

    /// Unanswered conflicts keep their files, so their edits are flagged the
    /// same way a skip would flag them.
    fn flag_unresolved(&mut self, conflicts: &[Assessment]) -> crate::Result<()> {
        let pending: Vec<_> = conflicts
            .iter()
            .filter(|c| c.detection.is_unflagged_customization())
            .filter_map(|c| c.current_hash.as_deref().map(|h| (&c.asset, h)))
            .collect();
        if pending.is_empty() {
            return Ok(());
        }
        let mut usage = self.store.load_usage();
        let now = Utc::now();
        for (asset, hash) in pending {
            usage.record_customization(asset, hash, now);
        }
        self.store.save_usage(&usage)
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct AssetStatus {
    pub asset: AssetRef,
    pub detection: Detection,
    pub use_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_version: Option<String>,
}

/// Detection state of every asset the selection requires, read-only.
pub fn status<S: AsRef<str>>(
    root: &Path,
    features: &FeatureRegistry,
    store: &dyn StateStore,
    selected: &[S],
) -> Vec<AssetStatus> {
    let usage = store.load_usage();
    features
        .resolve(selected)
        .assets
        .into_iter()
        .map(|asset| {
            let current = match io::read_optional(&asset.target_path(root)) {
                Ok(current) => current,
                Err(e) => {
                    tracing::warn!(%asset, error = %e, "cannot read asset");
                    None
                }
            };
            let record = usage.get(&asset);
            AssetStatus {
                detection: detect(current.as_deref(), record),
                use_count: record.map_or(0, |r| r.use_count),
                template_version: record.and_then(|r| r.template_version.clone()),
                asset,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{Action, Choice};
    use crate::feature::{core_assets, Feature};
    use crate::store::MemoryStateStore;
    use crate::template::MemoryRegistry;
    use tempfile::TempDir;

    fn small_registry() -> FeatureRegistry {
        let mut core = core_assets();
        core.required_commands = ["menu".to_string()].into();
        core.required_hooks.clear();
        let extra = Feature {
            name: "extra".into(),
            description: String::new(),
            required_commands: ["github-task".to_string()].into(),
            required_hooks: Default::default(),
            required_skills: Default::default(),
            required_binaries: Default::default(),
            requires_post_config: true,
            default: false,
        };
        FeatureRegistry::new(core, vec![extra])
    }

    fn templates() -> MemoryRegistry {
        MemoryRegistry::new()
            .with(AssetRef::command("menu"), "# Menu\n", "1.0.0")
            .with(AssetRef::command("github-task"), "# Task\n", "1.0.0")
    }

    fn request(mode: OverwriteMode) -> SyncRequest {
        SyncRequest {
            features: vec!["extra".into(), "missing".into()],
            mode,
            ..Default::default()
        }
    }

    struct Always(Choice);

    impl ChoiceProvider for Always {
        fn choose(&mut self, _conflict: &Assessment) -> Choice {
            self.0
        }
    }

    #[test]
    fn fresh_sync_installs_and_marks_features() {
        let dir = TempDir::new().unwrap();
        let (features, templates) = (small_registry(), templates());
        let mut store = MemoryStateStore::default();

        let report = Syncer::new(dir.path(), &features, &templates, &mut store)
            .sync(&request(OverwriteMode::AutoBackupOnConflict));

        assert_eq!(report.deployment.count(Outcome::Installed), 2);
        assert_eq!(report.unknown_features, vec!["missing"]);
        assert_eq!(report.post_config_features, vec!["extra"]);
        assert_eq!(report.installed_features, vec!["extra"]);
        assert!(store.update.is_feature_installed("extra"));
        assert!(!report.has_failures());
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let (features, templates) = (small_registry(), templates());
        let mut store = MemoryStateStore::default();

        let report = Syncer::new(dir.path(), &features, &templates, &mut store).sync(&SyncRequest {
            dry_run: true,
            ..request(OverwriteMode::ForceOverwrite)
        });

        assert_eq!(report.decisions.len(), 2);
        assert!(report.decisions.iter().all(|d| d.action == Action::Install));
        assert!(report.deployment.entries.is_empty());
        assert!(!dir.path().join(".claude").exists());
        assert!(store.update.installed_features.is_empty());
    }

    #[test]
    fn interactive_conflict_without_provider_is_preserved() {
        let dir = TempDir::new().unwrap();
        let (features, templates) = (small_registry(), templates());
        let asset = AssetRef::command("github-task");
        let path = asset.target_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "# My task\n").unwrap();
        let mut store = MemoryStateStore::default();

        let report = Syncer::new(dir.path(), &features, &templates, &mut store)
            .sync(&request(OverwriteMode::Interactive));

        assert_eq!(report.unresolved_conflicts.len(), 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# My task\n");
        assert!(report.installed_features.is_empty());
        let record = store.usage.get(&asset).unwrap();
        assert!(record.customized);
        assert_eq!(
            record.deployed_content_hash.as_deref(),
            Some(crate::hash::content_hash("# My task\n").as_str())
        );
    }

    #[test]
    fn provider_answers_conflicts() {
        let dir = TempDir::new().unwrap();
        let (features, templates) = (small_registry(), templates());
        let asset = AssetRef::command("github-task");
        let path = asset.target_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "# My task\n").unwrap();
        let mut store = MemoryStateStore::default();
        let mut provider = Always(Choice::BackupAndReplace);

        let report = Syncer::new(dir.path(), &features, &templates, &mut store)
            .with_provider(&mut provider)
            .sync(&request(OverwriteMode::Interactive));

        assert!(report.unresolved_conflicts.is_empty());
        assert_eq!(report.deployment.backups().count(), 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Task\n");
    }

    #[test]
    fn missing_template_keeps_feature_uninstalled() {
        let dir = TempDir::new().unwrap();
        let features = small_registry();
        let mut templates = templates();
        templates.remove(&AssetRef::command("github-task"));
        let mut store = MemoryStateStore::default();

        let report = Syncer::new(dir.path(), &features, &templates, &mut store)
            .sync(&request(OverwriteMode::AutoBackupOnConflict));

        assert!(report.has_failures());
        assert_eq!(report.deployment.count(Outcome::Installed), 1);
        assert!(report.installed_features.is_empty());
    }

    #[test]
    fn status_reflects_disk() {
        let dir = TempDir::new().unwrap();
        let (features, templates) = (small_registry(), templates());
        let mut store = MemoryStateStore::default();
        Syncer::new(dir.path(), &features, &templates, &mut store)
            .sync(&request(OverwriteMode::AutoBackupOnConflict));
        std::fs::write(AssetRef::command("menu").target_path(dir.path()), "# Mine\n").unwrap();

        let rows = status(dir.path(), &features, &store, &["extra"]);
        let menu = rows.iter().find(|r| r.asset.name == "menu").unwrap();
        assert!(menu.detection.is_customized());
        let task = rows.iter().find(|r| r.asset.name == "github-task").unwrap();
        assert_eq!(task.detection, Detection::Pristine);
        assert_eq!(task.template_version.as_deref(), Some("1.0.0"));
    }
}

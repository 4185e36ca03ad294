use crate::output::{print_json, print_table};
use crate::prompt::LinePrompt;
use anyhow::Context;
use ccasp_core::{
    decision::{Action, OverwriteMode},
    deploy::Outcome,
    store::{JsonStateStore, StateStore},
    sync::{SyncReport, SyncRequest, Syncer},
    template::DirRegistry,
};
use std::path::{Path, PathBuf};

pub struct SyncArgs {
    pub features: Option<Vec<String>>,
    pub mode: Option<String>,
    pub templates: Option<PathBuf>,
    pub dry_run: bool,
}

pub fn run(root: &Path, args: SyncArgs, json: bool) -> anyhow::Result<()> {
    let (config, registry) = super::load_project(root)?;

    let mode = match args.mode.as_deref() {
        Some(m) => m.parse::<OverwriteMode>()?,
        None => config.overwrite_mode,
    };
    let templates_dir = args
        .templates
        .or_else(|| config.templates_dir(root))
        .context("no template directory: pass --templates or set templates_dir in ccasp.yaml")?;
    if !templates_dir.is_dir() {
        anyhow::bail!("template directory {} does not exist", templates_dir.display());
    }

    let mut store = JsonStateStore::new(root);
    let skipped = store.load_update_state().skipped_features;
    let request = SyncRequest {
        features: super::selected_features(args.features, &config, &registry, &skipped),
        mode,
        backup_dir: Some(config.backup_dir(root)),
        dry_run: args.dry_run,
    };

    let templates = DirRegistry::new(templates_dir);
    let mut prompt = LinePrompt::new(std::io::stdin().lock());
    let mut syncer = Syncer::new(root, &registry, &templates, &mut store);
    if mode == OverwriteMode::Interactive {
        syncer = syncer.with_provider(&mut prompt);
    }
    let report = syncer.sync(&request);

    if json {
        return print_json(&report);
    }
    print_report(&report);
    Ok(())
}

fn print_report(report: &SyncReport) {
    for name in &report.unknown_features {
        eprintln!("warning: unknown feature '{name}' ignored");
    }

    if report.dry_run {
        println!("Dry run: nothing written.");
        let rows = report
            .decisions
            .iter()
            .map(|d| {
                vec![
                    d.asset.to_string(),
                    d.action.to_string(),
                    d.reason.as_str().to_string(),
                    d.significance
                        .as_ref()
                        .map(|s| s.level.to_string())
                        .unwrap_or_default(),
                ]
            })
            .collect();
        print_table(&["ASSET", "ACTION", "REASON", "CHANGE"], rows);
    } else {
        let d = &report.deployment;
        let rows = d
            .entries
            .iter()
            .map(|e| {
                let outcome = match e.outcome {
                    Outcome::Installed => "installed",
                    Outcome::Replaced if e.action == Action::BackupAndReplace => "backed up + replaced",
                    Outcome::Replaced => "replaced",
                    Outcome::Preserved => "kept",
                    Outcome::Failed => "FAILED",
                };
                vec![
                    e.asset.to_string(),
                    outcome.to_string(),
                    e.error.clone().unwrap_or_default(),
                ]
            })
            .collect();
        print_table(&["ASSET", "RESULT", "ERROR"], rows);
        println!(
            "\n{} installed, {} replaced, {} kept, {} failed",
            d.count(Outcome::Installed),
            d.count(Outcome::Replaced),
            d.count(Outcome::Preserved),
            d.count(Outcome::Failed),
        );
        for backup in d.backups() {
            println!("Backup: {}", backup.display());
        }
    }

    for failure in &report.plan_failures {
        println!("Not deployed: {}: {}", failure.asset, failure.error);
    }
    for conflict in &report.unresolved_conflicts {
        println!(
            "Left untouched (customized): {}. Re-run with --mode auto_backup_on_conflict to replace it with a backup.",
            conflict.asset
        );
    }
    if !report.dry_run && !report.post_config_features.is_empty() {
        println!(
            "\nNeeds configuration: {}",
            report.post_config_features.join(", ")
        );
    }
    for e in &report.persist_errors {
        eprintln!("warning: state not saved: {e}");
    }
}

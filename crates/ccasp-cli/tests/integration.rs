#![allow(deprecated)]
use assert_cmd::Command;
use ccasp_core::feature::FeatureRegistry;
use ccasp_core::template::DirRegistry;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

const TASK_V2: &str = "# github-task\n\nrewritten body of commands/github-task\n";

fn ccasp(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ccasp").unwrap();
    cmd.current_dir(dir.path()).env("CCASP_ROOT", dir.path());
    cmd
}

/// Project dir with a `templates/` tree covering every built-in feature.
fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let registry = FeatureRegistry::builtin();
    let every: Vec<String> = registry.features().iter().map(|f| f.name.clone()).collect();
    let templates = DirRegistry::new(dir.path().join("templates"));
    for asset in registry.resolve(&every).assets {
        let path = templates.template_path(&asset);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, format!("# {}\n\nbody of {asset}\n", asset.name)).unwrap();
    }
    dir
}

fn templates_arg(dir: &TempDir) -> String {
    dir.path().join("templates").display().to_string()
}

fn sync(dir: &TempDir) -> Command {
    let mut cmd = ccasp(dir);
    cmd.args(["sync", "--templates", &templates_arg(dir)]);
    cmd
}

fn task_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join(".claude/commands/github-task.md")
}

/// Deploy, then edit `github-task` locally and move its template forward.
fn customize_task(dir: &TempDir) {
    sync(dir).assert().success();
    std::fs::write(task_path(dir), "# github-task\n\nmy own workflow\n").unwrap();
    std::fs::write(dir.path().join("templates/commands/github-task.md"), TASK_V2).unwrap();
}

fn backups(root: &Path) -> Vec<String> {
    match std::fs::read_dir(root.join(".claude/backups")) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// ccasp sync
// ---------------------------------------------------------------------------

#[test]
fn sync_installs_default_features() {
    let dir = project();
    sync(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("installed"))
        .stdout(predicate::str::contains("Needs configuration: github-integration"));

    assert!(dir.path().join(".claude/commands/menu.md").exists());
    assert!(task_path(&dir).exists());
    assert!(dir.path().join(".claude/hooks/usage-tracking.js").exists());
    assert!(dir.path().join(".claude/config/usage-tracking.json").exists());
    assert!(dir.path().join(".claude/config/ccasp-state.json").exists());
    // Not a default feature.
    assert!(!dir.path().join(".claude/skills/deploy/SKILL.md").exists());
}

#[test]
fn sync_twice_changes_nothing() {
    let dir = project();
    sync(&dir).assert().success();
    sync(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("0 installed, 0 replaced"));
    assert!(backups(dir.path()).is_empty());
}

#[test]
fn sync_selected_features_only() {
    let dir = project();
    sync(&dir)
        .args(["--features", "deployment-automation,nope"])
        .assert()
        .success()
        .stderr(predicate::str::contains("unknown feature 'nope'"));

    assert!(dir.path().join(".claude/skills/deploy/SKILL.md").exists());
    assert!(!task_path(&dir).exists());
}

#[test]
fn customized_asset_is_backed_up_before_replace() {
    let dir = project();
    customize_task(&dir);

    sync(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Backup:"));

    let names = backups(dir.path());
    assert_eq!(names.len(), 1, "{names:?}");
    assert!(names[0].starts_with("github-task.md."), "{names:?}");
    assert!(names[0].ends_with(".bak"), "{names:?}");
    assert_eq!(std::fs::read_to_string(task_path(&dir)).unwrap(), TASK_V2);
}

#[test]
fn interactive_skip_keeps_local_edit() {
    let dir = project();
    customize_task(&dir);

    sync(&dir)
        .args(["--mode", "interactive"])
        .write_stdin("s\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("commands/github-task"));

    let content = std::fs::read_to_string(task_path(&dir)).unwrap();
    assert!(content.contains("my own workflow"));
    assert!(backups(dir.path()).is_empty());
}

#[test]
fn interactive_backup_answer() {
    let dir = project();
    customize_task(&dir);

    sync(&dir)
        .args(["--mode", "interactive"])
        .write_stdin("b\n")
        .assert()
        .success();

    assert_eq!(backups(dir.path()).len(), 1);
    assert_eq!(std::fs::read_to_string(task_path(&dir)).unwrap(), TASK_V2);
}

#[test]
fn force_skip_never_writes_existing_files() {
    let dir = project();
    customize_task(&dir);

    sync(&dir).args(["--mode", "force-skip"]).assert().success();
    let content = std::fs::read_to_string(task_path(&dir)).unwrap();
    assert!(content.contains("my own workflow"));
}

#[test]
fn dry_run_writes_nothing() {
    let dir = project();
    sync(&dir)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run"))
        .stdout(predicate::str::contains("install"));
    assert!(!dir.path().join(".claude").exists());
}

#[test]
fn sync_json_report() {
    let dir = project();
    let output = sync(&dir).arg("--json").output().unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entries = report["deployment"]["entries"].as_array().unwrap();
    assert!(!entries.is_empty());
    assert!(entries.iter().all(|e| e["outcome"] == "installed"));
    assert!(report["installed_features"]
        .as_array()
        .unwrap()
        .iter()
        .any(|f| f == "github-integration"));
}

#[test]
fn sync_uses_templates_dir_from_config() {
    let dir = project();
    std::fs::create_dir_all(dir.path().join(".claude/config")).unwrap();
    std::fs::write(
        dir.path().join(".claude/config/ccasp.yaml"),
        "templates_dir: templates\nfeatures: [refactoring]\n",
    )
    .unwrap();

    ccasp(&dir).arg("sync").assert().success();
    assert!(dir.path().join(".claude/commands/refactor-check.md").exists());
    assert!(!task_path(&dir).exists());
}

#[test]
fn sync_without_templates_fails() {
    let dir = TempDir::new().unwrap();
    ccasp(&dir)
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no template directory"));
}

#[test]
fn sync_rejects_unknown_mode() {
    let dir = project();
    sync(&dir)
        .args(["--mode", "sometimes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid overwrite mode"));
}

// ---------------------------------------------------------------------------
// ccasp status / usage
// ---------------------------------------------------------------------------

#[test]
fn status_reports_customized_assets() {
    let dir = project();
    sync(&dir).assert().success();
    std::fs::write(task_path(&dir), "edited\n").unwrap();

    ccasp(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("customized (drift)"))
        .stdout(predicate::str::contains("pristine"));
}

#[test]
fn usage_record_counts() {
    let dir = project();
    ccasp(&dir)
        .args(["usage", "record", "command", "menu"])
        .assert()
        .success()
        .stdout(predicate::str::contains("commands/menu: 1 uses"));
    ccasp(&dir)
        .args(["usage", "record", "commands", "menu"])
        .assert()
        .success()
        .stdout(predicate::str::contains("commands/menu: 2 uses"));

    ccasp(&dir)
        .args(["usage", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("commands/menu"));
}

#[test]
fn usage_rejects_bad_names() {
    let dir = project();
    ccasp(&dir)
        .args(["usage", "record", "command", "../etc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid asset name"));
    ccasp(&dir)
        .args(["usage", "record", "widget", "menu"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid asset type"));
}

#[test]
fn mark_customized_protects_pristine_file() {
    let dir = project();
    sync(&dir).assert().success();
    ccasp(&dir)
        .args(["usage", "mark-customized", "command", "github-task"])
        .assert()
        .success();

    ccasp(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("customized (flagged)"));

    // Template moves on; the flagged file is backed up, not silently replaced.
    std::fs::write(dir.path().join("templates/commands/github-task.md"), TASK_V2).unwrap();
    sync(&dir).assert().success();
    assert_eq!(backups(dir.path()).len(), 1);
}

// ---------------------------------------------------------------------------
// ccasp features / feature
// ---------------------------------------------------------------------------

#[test]
fn features_lists_builtin_table() {
    let dir = project();
    ccasp(&dir)
        .arg("features")
        .assert()
        .success()
        .stdout(predicate::str::contains("github-integration"))
        .stdout(predicate::str::contains("statusline"));
}

#[test]
fn feature_skip_is_recorded() {
    let dir = project();
    ccasp(&dir)
        .args(["feature", "skip", "happy-mode"])
        .assert()
        .success();

    let state = std::fs::read_to_string(dir.path().join(".claude/config/ccasp-state.json")).unwrap();
    let state: serde_json::Value = serde_json::from_str(&state).unwrap();
    assert_eq!(state["skippedFeatures"][0], "happy-mode");

    ccasp(&dir)
        .arg("features")
        .assert()
        .success()
        .stdout(predicate::str::contains("skipped"));
}

#[test]
fn skipped_feature_stays_out_of_plain_sync() {
    let dir = project();
    ccasp(&dir)
        .args(["feature", "skip", "token-management"])
        .assert()
        .success();
    sync(&dir).assert().success();

    let hook = dir.path().join(".claude/hooks/context-guardian.js");
    assert!(!hook.exists());
    let state = std::fs::read_to_string(dir.path().join(".claude/config/ccasp-state.json")).unwrap();
    let state: serde_json::Value = serde_json::from_str(&state).unwrap();
    assert_eq!(state["skippedFeatures"][0], "token-management");

    // Naming it explicitly installs it and lifts the skip.
    sync(&dir)
        .args(["--features", "token-management"])
        .assert()
        .success();
    assert!(hook.exists());
    let state = std::fs::read_to_string(dir.path().join(".claude/config/ccasp-state.json")).unwrap();
    let state: serde_json::Value = serde_json::from_str(&state).unwrap();
    assert!(state["skippedFeatures"].as_array().unwrap().is_empty());
}

#[test]
fn feature_skip_unknown_fails() {
    let dir = project();
    ccasp(&dir)
        .args(["feature", "skip", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown feature 'nope'"));
}

// ---------------------------------------------------------------------------
// ccasp check-update
// ---------------------------------------------------------------------------

#[test]
fn check_update_respects_disabled_config() {
    let dir = project();
    std::fs::create_dir_all(dir.path().join(".claude/config")).unwrap();
    std::fs::write(
        dir.path().join(".claude/config/ccasp.yaml"),
        "update_check:\n  enabled: false\n",
    )
    .unwrap();

    ccasp(&dir)
        .arg("check-update")
        .assert()
        .success()
        .stdout(predicate::str::contains("disabled"));
}

#[test]
fn check_update_offline_is_not_an_error() {
    let dir = project();
    std::fs::create_dir_all(dir.path().join(".claude/config")).unwrap();
    std::fs::write(
        dir.path().join(".claude/config/ccasp.yaml"),
        "update_check:\n  registry_url: http://127.0.0.1:9\n",
    )
    .unwrap();

    ccasp(&dir)
        .arg("check-update")
        .assert()
        .success()
        .stdout(predicate::str::contains("up to date"));
}

#[test]
fn dismiss_without_check_is_a_no_op() {
    let dir = project();
    ccasp(&dir)
        .args(["check-update", "--dismiss"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to dismiss"));
}

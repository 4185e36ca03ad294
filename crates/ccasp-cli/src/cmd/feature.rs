use crate::output::print_json;
use anyhow::Context;
use ccasp_core::store::{JsonStateStore, StateStore};
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum FeatureSubcommand {
    /// Record that a feature was deliberately not installed
    Skip { name: String },
}

pub fn run(root: &Path, subcmd: FeatureSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        FeatureSubcommand::Skip { name } => skip(root, &name, json),
    }
}

fn skip(root: &Path, name: &str, json: bool) -> anyhow::Result<()> {
    let (_, registry) = super::load_project(root)?;
    if registry.get(name).is_none() {
        anyhow::bail!("unknown feature '{name}'");
    }

    let mut store = JsonStateStore::new(root);
    let mut state = store.load_update_state();
    state.mark_feature_skipped(name);
    store
        .save_update_state(&state)
        .context("failed to save ccasp-state.json")?;

    if json {
        print_json(&serde_json::json!({ "feature": name, "status": "skipped" }))?;
    } else {
        println!("Skipped feature: {name}");
    }
    Ok(())
}

use crate::output::print_json;
use anyhow::Context;
use ccasp_core::{
    store::{JsonStateStore, StateStore},
    version_check::{NpmRegistrySource, UpdateChecker},
};
use std::path::Path;

const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn run(root: &Path, dismiss: bool, json: bool) -> anyhow::Result<()> {
    let (config, _) = super::load_project(root)?;
    let mut store = JsonStateStore::new(root);

    if dismiss {
        return dismiss_latest(&mut store, json);
    }

    if !config.update_check.enabled {
        if json {
            print_json(&serde_json::json!({ "enabled": false }))?;
        } else {
            println!("Update checks are disabled in ccasp.yaml.");
        }
        return Ok(());
    }

    let source = NpmRegistrySource::new(
        config.update_check.registry_url.as_str(),
        config.update_check.package.as_str(),
    );
    let info = UpdateChecker::new(&source, CURRENT_VERSION)
        .with_ttl(config.update_check.ttl())
        .check_with_store(&mut store);

    if json {
        return print_json(&serde_json::json!({
            "current_version": CURRENT_VERSION,
            "update": info,
        }));
    }
    match info {
        Some(info) => {
            println!(
                "Update available: {} -> {}",
                info.current_version, info.latest_version
            );
            println!("Dismiss with: ccasp check-update --dismiss");
        }
        None => println!("ccasp {CURRENT_VERSION} is up to date."),
    }
    Ok(())
}

fn dismiss_latest(store: &mut JsonStateStore, json: bool) -> anyhow::Result<()> {
    let mut state = store.load_update_state();
    let Some(version) = state.latest_version_seen.clone() else {
        if json {
            print_json(&serde_json::json!({ "dismissed": null }))?;
        } else {
            println!("No version seen yet; nothing to dismiss.");
        }
        return Ok(());
    };

    state.dismiss_version(&version);
    store
        .save_update_state(&state)
        .context("failed to save ccasp-state.json")?;

    if json {
        print_json(&serde_json::json!({ "dismissed": version }))?;
    } else {
        println!("Dismissed {version}.");
    }
    Ok(())
}

use crate::output::{print_json, print_table};
use ccasp_core::store::{JsonStateStore, StateStore};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let (_, registry) = super::load_project(root)?;
    let state = JsonStateStore::new(root).load_update_state();

    let status = |name: &str| {
        if state.is_feature_installed(name) {
            "installed"
        } else if state.skipped_features.contains(name) {
            "skipped"
        } else {
            ""
        }
    };

    if json {
        let features: Vec<_> = registry
            .features()
            .iter()
            .map(|f| {
                serde_json::json!({
                    "name": f.name,
                    "description": f.description,
                    "default": f.default,
                    "requires_post_config": f.requires_post_config,
                    "status": status(&f.name),
                    "assets": f.assets().map(|a| a.to_string()).collect::<Vec<_>>(),
                })
            })
            .collect();
        return print_json(&features);
    }

    let rows = registry
        .features()
        .iter()
        .map(|f| {
            vec![
                f.name.clone(),
                if f.default { "yes" } else { "" }.to_string(),
                status(&f.name).to_string(),
                f.assets().count().to_string(),
                f.description.clone(),
            ]
        })
        .collect();
    print_table(&["FEATURE", "DEFAULT", "STATUS", "ASSETS", "DESCRIPTION"], rows);
    Ok(())
}

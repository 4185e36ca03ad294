use crate::output::{print_json, print_table};
use ccasp_core::{
    detect::Detection,
    store::{JsonStateStore, StateStore},
    sync,
};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let (config, registry) = super::load_project(root)?;
    let store = JsonStateStore::new(root);
    let skipped = store.load_update_state().skipped_features;
    let selected = super::selected_features(None, &config, &registry, &skipped);
    let rows = sync::status(root, &registry, &store, &selected);

    if json {
        return print_json(&rows);
    }

    println!("Project:  {}", root.display());
    println!("Features: {}\n", selected.join(", "));
    let table = rows
        .iter()
        .map(|r| {
            let state = match &r.detection {
                Detection::Absent => "missing".to_string(),
                Detection::Pristine => "pristine".to_string(),
                Detection::Customized { reason } => format!("customized ({})", reason.as_str()),
            };
            vec![
                r.asset.to_string(),
                state,
                r.use_count.to_string(),
                r.template_version.clone().unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["ASSET", "STATE", "USES", "VERSION"], table);
    Ok(())
}

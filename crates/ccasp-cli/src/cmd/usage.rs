use crate::output::{print_json, print_table};
use anyhow::Context;
use ccasp_core::{
    asset::{AssetKind, AssetRef},
    store::{JsonStateStore, StateStore},
    usage,
};
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum UsageSubcommand {
    /// Count one invocation of an asset
    Record {
        /// command | hook | skill | binary
        kind: String,
        name: String,
    },
    /// Flag an asset as locally customized
    MarkCustomized { kind: String, name: String },
    /// Most used assets
    List {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

pub fn run(root: &Path, subcmd: UsageSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        UsageSubcommand::Record { kind, name } => record(root, &kind, &name, json),
        UsageSubcommand::MarkCustomized { kind, name } => mark_customized(root, &kind, &name, json),
        UsageSubcommand::List { limit } => list(root, limit, json),
    }
}

fn asset_ref(kind: &str, name: &str) -> anyhow::Result<AssetRef> {
    let asset = AssetRef::new(kind.parse::<AssetKind>()?, name);
    asset.validate()?;
    Ok(asset)
}

fn record(root: &Path, kind: &str, name: &str, json: bool) -> anyhow::Result<()> {
    let asset = asset_ref(kind, name)?;
    let mut store = JsonStateStore::new(root);
    let record = usage::record_usage(&mut store, &asset)
        .with_context(|| format!("failed to record usage of {asset}"))?;

    if json {
        print_json(&record)?;
    } else {
        println!("{asset}: {} uses", record.use_count);
    }
    Ok(())
}

fn mark_customized(root: &Path, kind: &str, name: &str, json: bool) -> anyhow::Result<()> {
    let asset = asset_ref(kind, name)?;
    let mut store = JsonStateStore::new(root);
    usage::mark_customized(&mut store, &asset)
        .with_context(|| format!("failed to mark {asset} customized"))?;

    if json {
        print_json(&serde_json::json!({ "asset": asset.to_string(), "customized": true }))?;
    } else {
        println!("Marked customized: {asset}");
    }
    Ok(())
}

fn list(root: &Path, limit: usize, json: bool) -> anyhow::Result<()> {
    let tracking = JsonStateStore::new(root).load_usage();
    let used = tracking.most_used(limit);

    if json {
        let rows: Vec<_> = used
            .iter()
            .map(|(asset, r)| {
                serde_json::json!({
                    "asset": asset.to_string(),
                    "use_count": r.use_count,
                    "last_used": r.last_used,
                    "customized": r.customized,
                })
            })
            .collect();
        return print_json(&rows);
    }

    if used.is_empty() {
        println!("No recorded usage yet.");
        return Ok(());
    }

    let rows = used
        .iter()
        .map(|(asset, r)| {
            vec![
                asset.to_string(),
                r.use_count.to_string(),
                r.last_used
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default(),
                if r.customized { "yes" } else { "" }.to_string(),
            ]
        })
        .collect();
    print_table(&["ASSET", "USES", "LAST USED", "CUSTOMIZED"], rows);
    Ok(())
}

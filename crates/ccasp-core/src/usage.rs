use crate::asset::{AssetKind, AssetRef};
use crate::error::Result;
use crate::store::StateStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const USAGE_TRACKING_VERSION: &str = "1.0";

// ---------------------------------------------------------------------------
// UsageRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UsageRecord {
    pub use_count: u64,
    pub first_used: Option<DateTime<Utc>>,
    pub last_used: Option<DateTime<Utc>>,
    /// Sticky: once set it stays set until a replace resets the baseline.
    pub customized: bool,
    pub deployed_content_hash: Option<String>,
    /// Hash of the template text this asset was last deployed from.
    pub template_baseline_hash: Option<String>,
    pub template_version: Option<String>,
    pub deployed_at: Option<DateTime<Utc>>,
}

impl UsageRecord {
    /// Deployed from the template hashing to `template_hash` and untouched
    /// since.
    pub fn is_baseline(&self, template_hash: &str) -> bool {
        !self.customized
            && self.template_baseline_hash.as_deref() == Some(template_hash)
            && self.deployed_content_hash.as_deref() == Some(template_hash)
    }
}

// ---------------------------------------------------------------------------
// UsageTracking (persisted document)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetTables {
    pub commands: BTreeMap<String, UsageRecord>,
    pub skills: BTreeMap<String, UsageRecord>,
    /// Populated by other tooling; carried through untouched.
    pub agents: BTreeMap<String, UsageRecord>,
    pub hooks: BTreeMap<String, UsageRecord>,
    pub binaries: BTreeMap<String, UsageRecord>,
}

impl AssetTables {
    fn table(&self, kind: AssetKind) -> &BTreeMap<String, UsageRecord> {
        match kind {
            AssetKind::Binary => &self.binaries,
            AssetKind::Command => &self.commands,
            AssetKind::Hook => &self.hooks,
            AssetKind::Skill => &self.skills,
        }
    }

    fn table_mut(&mut self, kind: AssetKind) -> &mut BTreeMap<String, UsageRecord> {
        match kind {
            AssetKind::Binary => &mut self.binaries,
            AssetKind::Command => &mut self.commands,
            AssetKind::Hook => &mut self.hooks,
            AssetKind::Skill => &mut self.skills,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageTracking {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub assets: AssetTables,
    #[serde(rename = "_lastModified", default)]
    pub last_modified: Option<DateTime<Utc>>,
}

fn default_version() -> String {
    USAGE_TRACKING_VERSION.to_string()
}

impl Default for UsageTracking {
    fn default() -> Self {
        Self {
            version: default_version(),
            assets: AssetTables::default(),
            last_modified: None,
        }
    }
}

impl UsageTracking {
    pub fn get(&self, asset: &AssetRef) -> Option<&UsageRecord> {
        self.assets.table(asset.kind).get(&asset.name)
    }

    fn entry(&mut self, asset: &AssetRef) -> &mut UsageRecord {
        self.assets
            .table_mut(asset.kind)
            .entry(asset.name.clone())
            .or_default()
    }

    pub fn record_usage(&mut self, asset: &AssetRef, now: DateTime<Utc>) {
        let record = self.entry(asset);
        record.use_count += 1;
        record.last_used = Some(now);
        if record.first_used.is_none() {
            record.first_used = Some(now);
        }
        self.last_modified = Some(now);
    }

    pub fn mark_customized(&mut self, asset: &AssetRef, now: DateTime<Utc>) {
        self.entry(asset).customized = true;
        self.last_modified = Some(now);
    }

    /// Flag a locally edited asset that was kept, remembering the content
    /// hash it was kept at. The template baseline stays as it was.
    pub fn record_customization(&mut self, asset: &AssetRef, content_hash: &str, now: DateTime<Utc>) {
        let record = self.entry(asset);
        record.customized = true;
        record.deployed_content_hash = Some(content_hash.to_string());
        self.last_modified = Some(now);
    }

    /// Record that `asset` now matches the template whose hash is
    /// `template_hash`. Clears `customized`; leaves usage counters alone.
    pub fn record_deployment(
        &mut self,
        asset: &AssetRef,
        template_hash: &str,
        template_version: &str,
        now: DateTime<Utc>,
    ) {
        let record = self.entry(asset);
        record.deployed_content_hash = Some(template_hash.to_string());
        record.template_baseline_hash = Some(template_hash.to_string());
        record.template_version = Some(template_version.to_string());
        record.customized = false;
        record.deployed_at = Some(now);
        self.last_modified = Some(now);
    }

    /// All tracked assets in `(type, name)` order.
    pub fn iter(&self) -> impl Iterator<Item = (AssetRef, &UsageRecord)> {
        AssetKind::all().iter().flat_map(move |&kind| {
            self.assets
                .table(kind)
                .iter()
                .map(move |(name, record)| (AssetRef::new(kind, name.clone()), record))
        })
    }

    /// Assets with at least one recorded use, most used first.
    pub fn most_used(&self, limit: usize) -> Vec<(AssetRef, &UsageRecord)> {
        let mut used: Vec<_> = self.iter().filter(|(_, r)| r.use_count > 0).collect();
        used.sort_by(|a, b| b.1.use_count.cmp(&a.1.use_count).then_with(|| a.0.cmp(&b.0)));
        used.truncate(limit);
        used
    }
}

// ---------------------------------------------------------------------------
// Usage Recorder
// ---------------------------------------------------------------------------

/// Count one invocation of `asset` and persist it.
pub fn record_usage(store: &mut dyn StateStore, asset: &AssetRef) -> Result<UsageRecord> {
    let mut usage = store.load_usage();
    usage.record_usage(asset, Utc::now());
    store.save_usage(&usage)?;
    tracing::debug!(%asset, "recorded usage");
    Ok(usage.get(asset).cloned().unwrap_or_default())
}

/// Flag `asset` as customized regardless of what its hash says, e.g. when a
/// file-watch hook reports an edit.
pub fn mark_customized(store: &mut dyn StateStore, asset: &AssetRef) -> Result<()> {
    let mut usage = store.load_usage();
    usage.mark_customized(asset, Utc::now());
    store.save_usage(&usage)?;
    tracing::info!(%asset, "marked customized");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

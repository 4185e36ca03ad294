use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// CheckResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub current_version: String,
    pub latest_version: String,
    pub update_available: bool,
}

// ---------------------------------------------------------------------------
// UpdateState (persisted document)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateState {
    /// Milliseconds since the Unix epoch.
    pub last_check_timestamp: Option<i64>,
    pub last_check_result: Option<CheckResult>,
    pub latest_version_seen: Option<String>,
    pub dismissed_versions: BTreeSet<String>,
    pub installed_features: BTreeSet<String>,
    pub skipped_features: BTreeSet<String>,
}

impl UpdateState {
    pub fn mark_feature_installed(&mut self, feature: &str) {
        self.skipped_features.remove(feature);
        self.installed_features.insert(feature.to_string());
    }

    pub fn mark_feature_skipped(&mut self, feature: &str) {
        self.installed_features.remove(feature);
        self.skipped_features.insert(feature.to_string());
    }

    pub fn is_feature_installed(&self, feature: &str) -> bool {
        self.installed_features.contains(feature)
    }

    pub fn dismiss_version(&mut self, version: &str) {
        self.dismissed_versions.insert(version.to_string());
    }

    pub fn is_dismissed(&self, version: &str) -> bool {
        self.dismissed_versions.contains(version)
    }

    pub fn last_checked_at(&self) -> Option<DateTime<Utc>> {
        self.last_check_timestamp
            .and_then(DateTime::<Utc>::from_timestamp_millis)
    }

    /// True when a cached check exists and is younger than `ttl`.
    pub fn cache_is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match (self.last_checked_at(), &self.last_check_result) {
            (Some(at), Some(_)) => now - at < ttl,
            _ => false,
        }
    }

    pub fn record_check(&mut self, result: CheckResult, now: DateTime<Utc>) {
        self.last_check_timestamp = Some(now.timestamp_millis());
        self.latest_version_seen = Some(result.latest_version.clone());
        self.last_check_result = Some(result);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

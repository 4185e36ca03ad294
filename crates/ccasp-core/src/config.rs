use crate::decision::OverwriteMode;
use crate::error::Result;
use crate::feature::Feature;
use crate::version_check::{DEFAULT_CHECK_TTL_MINUTES, NPM_REGISTRY_URL};
use crate::{io, paths};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// UpdateCheckConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCheckConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_package")]
    pub package: String,
    #[serde(default = "default_registry_url")]
    pub registry_url: String,
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: i64,
}

fn default_true() -> bool {
    true
}

fn default_package() -> String {
    "claude-cli-advanced-starter-pack".to_string()
}

fn default_registry_url() -> String {
    NPM_REGISTRY_URL.to_string()
}

fn default_ttl_minutes() -> i64 {
    DEFAULT_CHECK_TTL_MINUTES
}

impl Default for UpdateCheckConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            package: default_package(),
            registry_url: default_registry_url(),
            ttl_minutes: default_ttl_minutes(),
        }
    }
}

impl UpdateCheckConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.ttl_minutes.max(0))
    }
}

// ---------------------------------------------------------------------------
// SyncConfig
// ---------------------------------------------------------------------------

/// Project configuration at `.claude/config/ccasp.yaml`. Every field is
/// optional; a missing file is the default configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub overwrite_mode: OverwriteMode,
    /// Relative paths resolve against the project root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templates_dir: Option<PathBuf>,
    /// Selected features. Empty means the registry defaults.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_features: Vec<Feature>,
    #[serde(default)]
    pub update_check: UpdateCheckConfig,
}

impl SyncConfig {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        match io::read_optional(&path)? {
            Some(data) if !data.trim().is_empty() => Ok(serde_yaml::from_str(&data)?),
            _ => Ok(Self::default()),
        }
    }

    pub fn backup_dir(&self, root: &Path) -> PathBuf {
        match &self.backup_dir {
            Some(dir) => root.join(dir),
            None => paths::backups_dir(root),
        }
    }

    pub fn templates_dir(&self, root: &Path) -> Option<PathBuf> {
        self.templates_dir.as_ref().map(|dir| root.join(dir))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

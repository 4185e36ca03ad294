use crate::error::{CcaspError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const CLAUDE_DIR: &str = ".claude";
pub const COMMANDS_DIR: &str = ".claude/commands";
pub const HOOKS_DIR: &str = ".claude/hooks";
pub const SKILLS_DIR: &str = ".claude/skills";
pub const BIN_DIR: &str = ".claude/bin";
pub const BACKUPS_DIR: &str = ".claude/backups";
pub const BASELINES_DIR: &str = ".claude/config/baselines";

pub const USAGE_TRACKING_FILE: &str = ".claude/config/usage-tracking.json";
pub const STATE_FILE: &str = ".claude/config/ccasp-state.json";
pub const CONFIG_FILE: &str = ".claude/config/ccasp.yaml";

pub const SKILL_FILE: &str = "SKILL.md";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn usage_tracking_path(root: &Path) -> PathBuf {
    root.join(USAGE_TRACKING_FILE)
}

pub fn state_path(root: &Path) -> PathBuf {
    root.join(STATE_FILE)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn backups_dir(root: &Path) -> PathBuf {
    root.join(BACKUPS_DIR)
}

pub fn baselines_dir(root: &Path) -> PathBuf {
    root.join(BASELINES_DIR)
}

// ---------------------------------------------------------------------------
// Asset name validation
// ---------------------------------------------------------------------------

static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*$").unwrap())
}

pub fn validate_asset_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 || !name_re().is_match(name) {
        return Err(CcaspError::InvalidAssetName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

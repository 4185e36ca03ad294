use crate::error::{CcaspError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// AssetKind
// ---------------------------------------------------------------------------

/// Variant order is alphabetical so the derived `Ord` matches ordering by
/// the lowercase type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Binary,
    Command,
    Hook,
    Skill,
}

impl AssetKind {
    pub fn all() -> &'static [AssetKind] {
        &[
            AssetKind::Binary,
            AssetKind::Command,
            AssetKind::Hook,
            AssetKind::Skill,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::Binary => "binary",
            AssetKind::Command => "command",
            AssetKind::Hook => "hook",
            AssetKind::Skill => "skill",
        }
    }

    /// Key used for this kind in the usage-tracking document and the
    /// templates directory.
    pub fn plural(self) -> &'static str {
        match self {
            AssetKind::Binary => "binaries",
            AssetKind::Command => "commands",
            AssetKind::Hook => "hooks",
            AssetKind::Skill => "skills",
        }
    }

    pub fn is_executable(self) -> bool {
        matches!(self, AssetKind::Binary | AssetKind::Hook)
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AssetKind {
    type Err = CcaspError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "binary" | "binaries" | "bin" => Ok(AssetKind::Binary),
            "command" | "commands" => Ok(AssetKind::Command),
            "hook" | "hooks" => Ok(AssetKind::Hook),
            "skill" | "skills" => Ok(AssetKind::Skill),
            _ => Err(CcaspError::InvalidAssetKind(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// AssetRef
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetRef {
    pub kind: AssetKind,
    pub name: String,
}

impl AssetRef {
    pub fn new(kind: AssetKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn command(name: impl Into<String>) -> Self {
        Self::new(AssetKind::Command, name)
    }

    pub fn hook(name: impl Into<String>) -> Self {
        Self::new(AssetKind::Hook, name)
    }

    pub fn skill(name: impl Into<String>) -> Self {
        Self::new(AssetKind::Skill, name)
    }

    pub fn binary(name: impl Into<String>) -> Self {
        Self::new(AssetKind::Binary, name)
    }

    /// Parse `type/name`, e.g. `commands/github-task` or `hook/phase-dev-enforcer`.
    pub fn parse(s: &str) -> Result<Self> {
        let (kind, name) = s
            .split_once('/')
            .ok_or_else(|| CcaspError::InvalidAssetName(s.to_string()))?;
        let asset = Self::new(kind.parse()?, name);
        asset.validate()?;
        Ok(asset)
    }

    pub fn validate(&self) -> Result<()> {
        paths::validate_asset_name(&self.name)
    }

    /// Location of the deployed copy, relative to the project root.
    pub fn relative_path(&self) -> PathBuf {
        match self.kind {
            AssetKind::Command => Path::new(paths::COMMANDS_DIR).join(format!("{}.md", self.name)),
            AssetKind::Hook => Path::new(paths::HOOKS_DIR).join(format!("{}.js", self.name)),
            AssetKind::Skill => Path::new(paths::SKILLS_DIR)
                .join(&self.name)
                .join(paths::SKILL_FILE),
            AssetKind::Binary => Path::new(paths::BIN_DIR).join(&self.name),
        }
    }

    pub fn target_path(&self, root: &Path) -> PathBuf {
        root.join(self.relative_path())
    }

    /// File name used as the stem of backup artifacts. Skills all share the
    /// `SKILL.md` file name, so the skill name is folded in.
    pub fn backup_stem(&self) -> String {
        match self.kind {
            AssetKind::Command => format!("{}.md", self.name),
            AssetKind::Hook => format!("{}.js", self.name),
            AssetKind::Skill => format!("{}.{}", self.name, paths::SKILL_FILE),
            AssetKind::Binary => self.name.clone(),
        }
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.plural(), self.name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

use crate::asset::{AssetKind, AssetRef};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Feature
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Feature {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required_commands: BTreeSet<String>,
    #[serde(default)]
    pub required_hooks: BTreeSet<String>,
    #[serde(default)]
    pub required_skills: BTreeSet<String>,
    #[serde(default)]
    pub required_binaries: BTreeSet<String>,
    #[serde(default)]
    pub requires_post_config: bool,
    #[serde(default)]
    pub default: bool,
}

impl Feature {
    /// Every asset this feature requires, in `(type, name)` order.
    pub fn assets(&self) -> impl Iterator<Item = AssetRef> + '_ {
        refs(AssetKind::Binary, &self.required_binaries)
            .chain(refs(AssetKind::Command, &self.required_commands))
            .chain(refs(AssetKind::Hook, &self.required_hooks))
            .chain(refs(AssetKind::Skill, &self.required_skills))
    }

    pub fn validate(&self) -> Result<()> {
        for asset in self.assets() {
            asset.validate()?;
        }
        Ok(())
    }
}

fn refs(kind: AssetKind, names: &BTreeSet<String>) -> impl Iterator<Item = AssetRef> + '_ {
    names.iter().map(move |n| AssetRef::new(kind, n.clone()))
}

// ---------------------------------------------------------------------------
// Built-in table
// ---------------------------------------------------------------------------

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

macro_rules! feature {
    (
        name: $name:expr,
        description: $desc:expr,
        commands: [$($c:expr),* $(,)?],
        hooks: [$($h:expr),* $(,)?],
        skills: [$($s:expr),* $(,)?],
        binaries: [$($b:expr),* $(,)?],
        post_config: $post:expr,
        default: $default:expr $(,)?
    ) => {
        Feature {
            name: $name.to_string(),
            description: $desc.to_string(),
            required_commands: set(&[$($c),*]),
            required_hooks: set(&[$($h),*]),
            required_skills: set(&[$($s),*]),
            required_binaries: set(&[$($b),*]),
            requires_post_config: $post,
            default: $default,
        }
    };
}

/// Assets deployed regardless of feature selection.
pub fn core_assets() -> Feature {
    feature! {
        name: "core",
        description: "Menu, help and update commands plus usage tracking",
        commands: ["ccasp-help", "menu", "update-smart"],
        hooks: ["usage-tracking"],
        skills: [],
        binaries: [],
        post_config: false,
        default: true,
    }
}

pub fn builtin_features() -> Vec<Feature> {
    vec![
        feature! {
            name: "token-management",
            description: "Context budget tracking and compaction guards",
            commands: ["context-audit"],
            hooks: ["context-guardian", "token-budget-loader"],
            skills: [],
            binaries: [],
            post_config: false,
            default: true,
        },
        feature! {
            name: "github-integration",
            description: "GitHub issue and project board sync",
            commands: ["github-task", "github-update"],
            hooks: ["github-progress-hook"],
            skills: [],
            binaries: [],
            post_config: true,
            default: true,
        },
        feature! {
            name: "phased-development",
            description: "Phased implementation plans with enforcement",
            commands: ["phase-dev-plan", "phase-track"],
            hooks: ["phase-dev-enforcer"],
            skills: [],
            binaries: [],
            post_config: false,
            default: true,
        },
        feature! {
            name: "agent-orchestration",
            description: "Hierarchical agents driving phased plans",
            commands: ["orchestration-status"],
            hooks: ["hierarchy-validator", "phase-dev-enforcer"],
            skills: ["agent-creator"],
            binaries: [],
            post_config: false,
            default: false,
        },
        feature! {
            name: "deployment-automation",
            description: "Full-stack deploy commands",
            commands: ["deploy-full"],
            hooks: ["deploy-guard"],
            skills: ["deploy"],
            binaries: [],
            post_config: true,
            default: false,
        },
        feature! {
            name: "refactoring",
            description: "Refactor checks and cleanup passes",
            commands: ["refactor-check", "refactor-cleanup"],
            hooks: [],
            skills: [],
            binaries: [],
            post_config: false,
            default: false,
        },
        feature! {
            name: "happy-mode",
            description: "Mobile session checkpoints",
            commands: ["happy-start"],
            hooks: ["happy-checkpoint-manager"],
            skills: [],
            binaries: [],
            post_config: true,
            default: false,
        },
        feature! {
            name: "statusline",
            description: "Status line helper binary",
            commands: [],
            hooks: [],
            skills: [],
            binaries: ["statusline"],
            post_config: false,
            default: false,
        },
    ]
}

// ---------------------------------------------------------------------------
// FeatureRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FeatureRegistry {
    core: Feature,
    features: Vec<Feature>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Known selected features, sorted and deduplicated.
    pub features: Vec<String>,
    /// Closure of required assets, core included, in `(type, name)` order.
    pub assets: Vec<AssetRef>,
    /// Selected features that need configuration after install.
    pub post_config_features: Vec<String>,
    /// Assets owned by `post_config_features`.
    pub post_config_assets: Vec<AssetRef>,
    /// Selected names with no matching feature. Ignored by resolution.
    pub unknown: Vec<String>,
}

impl Default for FeatureRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FeatureRegistry {
    pub fn new(core: Feature, features: Vec<Feature>) -> Self {
        Self { core, features }
    }

    pub fn builtin() -> Self {
        Self::new(core_assets(), builtin_features())
    }

    /// Add project-declared features. A custom feature with the name of a
    /// built-in one replaces it.
    pub fn with_custom(mut self, custom: Vec<Feature>) -> Result<Self> {
        for feature in custom {
            feature.validate()?;
            self.features.retain(|f| f.name != feature.name);
            self.features.push(feature);
        }
        Ok(self)
    }

    pub fn core(&self) -> &Feature {
        &self.core
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn get(&self, name: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.name == name)
    }

    pub fn default_features(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .features
            .iter()
            .filter(|f| f.default)
            .map(|f| f.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Expand `selected` into the full set of required assets. Pure: the
    /// closure is recomputed from scratch on every call.
    pub fn resolve<S: AsRef<str>>(&self, selected: &[S]) -> Resolution {
        let mut features = BTreeSet::new();
        let mut unknown = BTreeSet::new();
        for name in selected {
            let name = name.as_ref();
            match self.get(name) {
                Some(f) => {
                    features.insert(f.name.clone());
                }
                None => {
                    unknown.insert(name.to_string());
                }
            }
        }

        let mut assets: BTreeSet<AssetRef> = self.core.assets().collect();
        let mut post_config_features = Vec::new();
        let mut post_config_assets = BTreeSet::new();
        for name in &features {
            let Some(feature) = self.get(name) else {
                continue;
            };
            assets.extend(feature.assets());
            if feature.requires_post_config {
                post_config_features.push(feature.name.clone());
                post_config_assets.extend(feature.assets());
            }
        }

        Resolution {
            features: features.into_iter().collect(),
            assets: assets.into_iter().collect(),
            post_config_features,
            post_config_assets: post_config_assets.into_iter().collect(),
            unknown: unknown.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_selection_is_core_only() {
        let reg = FeatureRegistry::builtin();
        let r = reg.resolve::<&str>(&[]);
        let core: Vec<AssetRef> = reg.core().assets().collect();
        assert_eq!(r.assets, core);
        assert!(r.features.is_empty());
        assert!(r.post_config_assets.is_empty());
    }

    #[test]
    fn shared_hook_deployed_once() {
        let reg = FeatureRegistry::builtin();
        let r = reg.resolve(&["phased-development", "agent-orchestration"]);
        let hook = AssetRef::hook("phase-dev-enforcer");
        assert_eq!(r.assets.iter().filter(|a| **a == hook).count(), 1);

        // Dropping one feature still requires the shared hook.
        let r = reg.resolve(&["agent-orchestration"]);
        assert!(r.assets.contains(&hook));
        let r = reg.resolve(&["phased-development"]);
        assert!(r.assets.contains(&hook));
    }

    #[test]
    fn subset_feature_adds_nothing() {
        let a = feature! {
            name: "a",
            description: "",
            commands: ["x"],
            hooks: [],
            skills: [],
            binaries: [],
            post_config: false,
            default: false,
        };
        let b = feature! {
            name: "b",
            description: "",
            commands: ["x", "y"],
            hooks: ["h"],
            skills: [],
            binaries: [],
            post_config: false,
            default: false,
        };
        let reg = FeatureRegistry::new(core_assets(), vec![a, b]);
        assert_eq!(reg.resolve(&["a", "b"]).assets, reg.resolve(&["b"]).assets);
    }

    #[test]
    fn output_is_sorted_by_type_then_name() {
        let reg = FeatureRegistry::builtin();
        let r = reg.resolve(&["statusline", "deployment-automation", "github-integration"]);
        let mut sorted = r.assets.clone();
        sorted.sort();
        assert_eq!(r.assets, sorted);
        assert_eq!(r.assets[0], AssetRef::binary("statusline"));
    }

    #[test]
    fn post_config_subset() {
        let reg = FeatureRegistry::builtin();
        let r = reg.resolve(&["github-integration", "refactoring"]);
        assert_eq!(r.post_config_features, vec!["github-integration"]);
        assert!(r.post_config_assets.contains(&AssetRef::command("github-task")));
        assert!(!r.post_config_assets.contains(&AssetRef::command("refactor-check")));
    }

    #[test]
    fn unknown_features_are_reported_not_fatal() {
        let reg = FeatureRegistry::builtin();
        let r = reg.resolve(&["nope", "refactoring"]);
        assert_eq!(r.unknown, vec!["nope"]);
        assert_eq!(r.features, vec!["refactoring"]);
    }

    #[test]
    fn custom_feature_overrides_builtin() {
        let custom = Feature {
            name: "refactoring".into(),
            description: "team variant".into(),
            required_commands: set(&["team-refactor"]),
            required_hooks: BTreeSet::new(),
            required_skills: BTreeSet::new(),
            required_binaries: BTreeSet::new(),
            requires_post_config: false,
            default: true,
        };
        let reg = FeatureRegistry::builtin().with_custom(vec![custom]).unwrap();
        let r = reg.resolve(&["refactoring"]);
        assert!(r.assets.contains(&AssetRef::command("team-refactor")));
        assert!(!r.assets.contains(&AssetRef::command("refactor-check")));
        assert!(reg.default_features().contains(&"refactoring".to_string()));
    }

    #[test]
    fn custom_feature_with_bad_asset_name_rejected() {
        let mut bad = core_assets();
        bad.name = "bad".into();
        bad.required_hooks.insert("../escape".into());
        assert!(FeatureRegistry::builtin().with_custom(vec![bad]).is_err());
    }

    #[test]
    fn builtin_table_is_valid() {
        for f in FeatureRegistry::builtin().features() {
            f.validate().unwrap_or_else(|e| panic!("{}: {e}", f.name));
        }
        core_assets().validate().unwrap();
    }
}

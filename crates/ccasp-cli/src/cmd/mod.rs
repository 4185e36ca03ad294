pub mod check_update;
pub mod feature;
pub mod features;
pub mod status;
pub mod sync;
pub mod usage;

use anyhow::Context;
use ccasp_core::{config::SyncConfig, feature::FeatureRegistry};
use std::collections::BTreeSet;
use std::path::Path;

/// Project config plus the feature table it extends.
pub fn load_project(root: &Path) -> anyhow::Result<(SyncConfig, FeatureRegistry)> {
    let config = SyncConfig::load(root).context("failed to load .claude/config/ccasp.yaml")?;
    let registry = FeatureRegistry::builtin()
        .with_custom(config.custom_features.clone())
        .context("invalid custom_features in ccasp.yaml")?;
    Ok((config, registry))
}

/// `--features`, then the config list, then the registry defaults. Features
/// the user skipped are left out unless named with `--features`.
pub fn selected_features(
    explicit: Option<Vec<String>>,
    config: &SyncConfig,
    registry: &FeatureRegistry,
    skipped: &BTreeSet<String>,
) -> Vec<String> {
    let defaults = match explicit {
        Some(names) => {
            return names
                .into_iter()
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect()
        }
        None if !config.features.is_empty() => config.features.clone(),
        None => registry.default_features(),
    };
    defaults
        .into_iter()
        .filter(|name| !skipped.contains(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_features_leave_the_default_selection() {
        let registry = FeatureRegistry::builtin();
        let skipped: BTreeSet<String> = ["token-management".to_string()].into();

        let selected = selected_features(None, &SyncConfig::default(), &registry, &skipped);
        assert!(registry.default_features().contains(&"token-management".to_string()));
        assert!(!selected.contains(&"token-management".to_string()));

        let config = SyncConfig {
            features: vec!["token-management".into(), "refactoring".into()],
            ..Default::default()
        };
        assert_eq!(
            selected_features(None, &config, &registry, &skipped),
            vec!["refactoring"]
        );

        let explicit = Some(vec!["token-management".to_string()]);
        assert_eq!(
            selected_features(explicit, &config, &registry, &skipped),
            vec!["token-management"]
        );
    }
}

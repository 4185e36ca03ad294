use crate::asset::{AssetKind, AssetRef};
use crate::error::{CcaspError, Result};
use crate::{frontmatter, hash, io};
use std::collections::BTreeMap;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub content: String,
    pub version: String,
}

impl Template {
    pub fn new(content: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            version: version.into(),
        }
    }

    /// Build a template whose version comes from its `version:` front-matter
    /// key, or from a short content hash when it declares none.
    pub fn from_content(content: impl Into<String>) -> Self {
        let content = content.into();
        let version = frontmatter::field(&content, "version")
            .unwrap_or_else(|| hash::short_hash(&content));
        Self { content, version }
    }

    pub fn hash(&self) -> String {
        hash::content_hash(&self.content)
    }
}

// ---------------------------------------------------------------------------
// TemplateRegistry
// ---------------------------------------------------------------------------

/// Source of the current template text for each asset. Supplied by the
/// embedding application.
pub trait TemplateRegistry {
    fn get_template(&self, asset: &AssetRef) -> Result<Template>;

    /// Earlier template text whose content hash is `hash`, for registries
    /// that keep history.
    fn template_by_hash(&self, _asset: &AssetRef, _hash: &str) -> Option<String> {
        None
    }
}

fn not_found(asset: &AssetRef) -> CcaspError {
    CcaspError::TemplateNotFound {
        kind: asset.kind.to_string(),
        name: asset.name.clone(),
    }
}

// ---------------------------------------------------------------------------
// MemoryRegistry
// ---------------------------------------------------------------------------

/// Registry held in memory. Every template ever inserted stays reachable by
/// hash, so replacing a template keeps the old text as history.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    current: BTreeMap<AssetRef, Template>,
    history: BTreeMap<(AssetRef, String), String>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, asset: AssetRef, template: Template) {
        self.history
            .insert((asset.clone(), template.hash()), template.content.clone());
        self.current.insert(asset, template);
    }

    pub fn with(mut self, asset: AssetRef, content: &str, version: &str) -> Self {
        self.insert(asset, Template::new(content, version));
        self
    }

    pub fn remove(&mut self, asset: &AssetRef) {
        self.current.remove(asset);
    }
}

impl TemplateRegistry for MemoryRegistry {
    fn get_template(&self, asset: &AssetRef) -> Result<Template> {
        self.current
            .get(asset)
            .cloned()
            .ok_or_else(|| not_found(asset))
    }

    fn template_by_hash(&self, asset: &AssetRef, hash: &str) -> Option<String> {
        self.history
            .get(&(asset.clone(), hash.to_string()))
            .cloned()
    }
}

// ---------------------------------------------------------------------------
// DirRegistry
// ---------------------------------------------------------------------------

/// Registry over a templates directory laid out by asset type:
///
/// ```text
/// <dir>/commands/<name>.md
/// <dir>/hooks/<name>.js
/// <dir>/skills/<name>/SKILL.md
/// <dir>/binaries/<name>
/// ```
#[derive(Debug, Clone)]
pub struct DirRegistry {
    dir: PathBuf,
}

impl DirRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn template_path(&self, asset: &AssetRef) -> PathBuf {
        let base = self.dir.join(asset.kind.plural());
        match asset.kind {
            AssetKind::Command => base.join(format!("{}.md", asset.name)),
            AssetKind::Hook => base.join(format!("{}.js", asset.name)),
            AssetKind::Skill => base.join(&asset.name).join(crate::paths::SKILL_FILE),
            AssetKind::Binary => base.join(&asset.name),
        }
    }
}

impl TemplateRegistry for DirRegistry {
    fn get_template(&self, asset: &AssetRef) -> Result<Template> {
        match io::read_optional(&self.template_path(asset))? {
            Some(content) => Ok(Template::from_content(content)),
            None => Err(not_found(asset)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

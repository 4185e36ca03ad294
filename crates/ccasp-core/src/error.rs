use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CcaspError {
    #[error("failed to persist {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template not found: {kind}/{name}")]
    TemplateNotFound { kind: String, name: String },

    #[error("backup to {} failed: {source}", path.display())]
    BackupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("version check unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("invalid asset name '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidAssetName(String),

    #[error("invalid asset type '{0}': expected command, hook, skill or binary")]
    InvalidAssetKind(String),

    #[error("invalid overwrite mode '{0}'")]
    InvalidOverwriteMode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CcaspError>;

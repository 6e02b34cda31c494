use thiserror::Error;

use crate::adapters::ForgeError;
use crate::git::GitError;
use crate::version::VersionFormatError;

#[derive(Debug, Error)]
pub enum CookforgeError {
    #[error(transparent)]
    Forge(#[from] ForgeError),

    #[error(transparent)]
    Version(#[from] VersionFormatError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("YAML parse error: {0}")]
    ConfigFormat(#[from] serde_yaml::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Cache file is not a valid snapshot: {0}")]
    SnapshotFormat(#[from] serde_json::Error),

    #[error("cannot find repository: {0}")]
    MissingRepository(String),

    #[error("repository {name} has no {link} link")]
    MissingLink { name: String, link: String },

    #[error("version {version} is already published; deploy aborted")]
    DeployDeclined { version: String },

    #[error("no version given and repository {0} has no version tags")]
    NoVersion(String),

    #[error("version {version} of {cookbook} is frozen on the artifact server")]
    FrozenVersion { cookbook: String, version: String },

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Upload command failed: {0}")]
    Upload(String),
}

pub type Result<T> = std::result::Result<T, CookforgeError>;

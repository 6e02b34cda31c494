//! Artifact server access and cookbook upload
//!
//! The artifact server is only read here (which cookbooks exist, their
//! versions, freeze state). Uploading goes through an external command.

pub mod chef_server;
pub mod mock;
pub mod upload;

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::adapters::ForgeResult;

pub use chef_server::ChefServerClient;
pub use mock::MockArtifactServer;
pub use upload::{UploadCommand, UploadResult};

/// Read-only view of a cookbook artifact server
#[async_trait]
pub trait ArtifactServer: Send + Sync {
    /// Every cookbook with its latest published version, as the server reports it
    async fn list_cookbooks(&self) -> ForgeResult<BTreeMap<String, Option<String>>>;

    /// All published versions of one cookbook; unknown cookbooks have none
    async fn cookbook_versions(&self, name: &str) -> ForgeResult<Vec<String>>;

    /// Whether a published version is frozen (immutable)
    async fn is_frozen(&self, name: &str, version: &str) -> ForgeResult<bool>;
}

//! Cookforge - cookbook repositories and the artifact server, side by side
//!
//! Cookforge keeps a local snapshot of every configured organization's
//! repositories (with their version tags) on a GitHub-compatible server,
//! compares them with the cookbooks published on a Chef server, and drives
//! clone, deploy and destroy against both.

pub mod adapters;
pub mod commands;
pub mod config;
pub mod cookbook;
pub mod error;
pub mod git;
pub mod package;
pub mod services;
pub mod storage;
pub mod types;
pub mod version;

// Re-exports for convenience
pub use adapters::{ForgeError, ForgePort, GitHubAdapter};
pub use config::CookforgeConfig;
pub use error::{CookforgeError, Result};
pub use services::{SyncEngine, VersionResolver};
pub use types::*;
pub use version::{SemVer, VersionBump};

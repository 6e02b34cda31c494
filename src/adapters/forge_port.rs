//! ForgePort trait - the remote repository API as the sync engine sees it
//!
//! Implemented by the GitHub adapter (any GitHub-compatible API, including
//! enterprise appliances) and by the in-memory mock used in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use futures::TryStreamExt;
use thiserror::Error;

use crate::types::{Repository, SearchHit};

/// Errors that can occur when talking to a forge or artifact server
#[derive(Debug, Clone, Error)]
pub enum ForgeError {
    /// Non-2xx response
    #[error("Error {status}: {message} (URL: {url})")]
    Transport {
        status: u16,
        message: String,
        url: String,
    },

    /// Body was expected to be JSON but is not
    #[error("Response from {url} is not valid JSON: {body}")]
    Decode { url: String, body: String },

    /// A repository record is missing or has malformed required fields
    #[error("Invalid repository record from {url}: {reason}")]
    InvalidRepository { url: String, reason: String },

    /// Connection-level failure (DNS, TLS, proxy, ...)
    #[error("Network error: {0}")]
    Network(String),
}

impl ForgeError {
    /// HTTP status for transport errors
    pub const fn status(&self) -> Option<u16> {
        match self {
            ForgeError::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for forge operations
pub type ForgeResult<T> = std::result::Result<T, ForgeError>;

/// Read (and destroy) access to an organization's repositories
#[async_trait]
pub trait ForgePort: Send + Sync {
    /// Organization-level `updated_at`, the cheap staleness check
    async fn organization_updated_at(&self, org: &str) -> ForgeResult<DateTime<Utc>>;

    /// All repositories of the organization, one page at a time.
    ///
    /// Each call starts a fresh listing at page 1. The first failed page ends
    /// the stream with that error.
    fn list_repositories<'a>(&'a self, org: &'a str) -> BoxStream<'a, ForgeResult<Repository>>;

    /// Version tag names of a repository; other tag names are dropped
    async fn list_tags(&self, repo: &Repository) -> ForgeResult<Vec<String>>;

    /// Repositories matching a free-text query, best match first
    async fn search_repositories(&self, query: &str) -> ForgeResult<Vec<SearchHit>>;

    /// Delete a repository owned by an organization or user
    async fn delete_repository(&self, owner: &str, name: &str) -> ForgeResult<()>;

    /// Drain `list_repositories` into a Vec
    async fn collect_repositories(&self, org: &str) -> ForgeResult<Vec<Repository>> {
        self.list_repositories(org).try_collect().await
    }
}

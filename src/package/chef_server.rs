//! Chef server client.
//!
//! Speaks the cookbook endpoints of the Chef server REST API through the
//! shared `Transport`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::ArtifactServer;
use crate::adapters::{ForgeError, ForgeResult, Transport};
/// `{ "<name>": { "url": ..., "versions": [ { "version": ..., "url": ... } ] } }`
#[derive(Debug, Deserialize)]
struct CookbookEntry {
    #[serde(default)]
    versions: Vec<CookbookVersionRef>,
}

#[derive(Debug, Deserialize)]
struct CookbookVersionRef {
    version: String,
}

/// Chef server client
pub struct ChefServerClient {
    transport: Arc<dyn Transport>,
    base_url: String,
}

impl ChefServerClient {
    /// `base_url` includes the organization path, e.g.
    /// `https://chef.example.com/organizations/ops`
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { transport, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn decode_entries(url: &str, body: Value) -> ForgeResult<BTreeMap<String, CookbookEntry>> {
        if body.is_null() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_value(body.clone()).map_err(|_| ForgeError::Decode {
            url: url.to_string(),
            body: body.to_string(),
        })
    }
}

#[async_trait]
impl ArtifactServer for ChefServerClient {
    async fn list_cookbooks(&self) -> ForgeResult<BTreeMap<String, Option<String>>> {
        let url = format!("{}/cookbooks?num_versions=1", self.base_url);
        let body = self.transport.get(&url).await?;
        let entries = Self::decode_entries(&url, body)?;

        debug!(count = entries.len(), "listed cookbooks");

        Ok(entries
            .into_iter()
            .map(|(name, entry)| (name, entry.versions.into_iter().next().map(|v| v.version)))
            .collect())
    }

    async fn cookbook_versions(&self, name: &str) -> ForgeResult<Vec<String>> {
        let url = format!(
            "{}/cookbooks/{}?num_versions=all",
            self.base_url,
            urlencoding::encode(name)
        );

        let body = match self.transport.get(&url).await {
            Ok(body) => body,
            Err(e) if e.status() == Some(404) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut entries = Self::decode_entries(&url, body)?;
        Ok(entries
            .remove(name)
            .map(|entry| entry.versions.into_iter().map(|v| v.version).collect())
            .unwrap_or_default())
    }

    async fn is_frozen(&self, name: &str, version: &str) -> ForgeResult<bool> {
        let url = format!(
            "{}/cookbooks/{}/{}",
            self.base_url,
            urlencoding::encode(name),
            urlencoding::encode(version)
        );

        let body = match self.transport.get(&url).await {
            Ok(body) => body,
            Err(e) if e.status() == Some(404) => return Ok(false),
            Err(e) => return Err(e),
        };

        Ok(body.get("frozen?").and_then(Value::as_bool).unwrap_or(false))
    }
}

//! In-memory artifact server for tests

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};

use super::ArtifactServer;
use crate::adapters::ForgeResult;
use crate::version::latest_tag;

#[derive(Debug, Default, Clone)]
pub struct MockArtifactServer {
    versions: BTreeMap<String, Vec<String>>,
    frozen: BTreeSet<(String, String)>,
}

impl MockArtifactServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cookbook<I, S>(mut self, name: &str, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.versions
            .insert(name.to_string(), versions.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_frozen(mut self, name: &str, version: &str) -> Self {
        self.frozen.insert((name.to_string(), version.to_string()));
        self
    }
}

#[async_trait]
impl ArtifactServer for MockArtifactServer {
    async fn list_cookbooks(&self) -> ForgeResult<BTreeMap<String, Option<String>>> {
        Ok(self
            .versions
            .iter()
            .map(|(name, versions)| {
                let latest = latest_tag(versions).or_else(|| versions.first().cloned());
                (name.clone(), latest)
            })
            .collect())
    }

    async fn cookbook_versions(&self, name: &str) -> ForgeResult<Vec<String>> {
        Ok(self.versions.get(name).cloned().unwrap_or_default())
    }

    async fn is_frozen(&self, name: &str, version: &str) -> ForgeResult<bool> {
        Ok(self.frozen.contains(&(name.to_string(), version.to_string())))
    }
}

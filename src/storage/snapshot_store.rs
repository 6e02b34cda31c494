//! On-disk organization snapshots, one JSON document per (host, organization).

use tracing::debug;

use super::CookforgePaths;
use crate::error::Result;
use crate::types::OrganizationSnapshot;

/// Normalize a remote URL (or bare host) to `host[:port]`, lower-cased.
///
/// `https://GHE.example.com/api/v3` and `ghe.example.com` give the same host.
pub fn normalize_host(url: &str) -> String {
    let lower = url.trim().to_ascii_lowercase();
    let without_scheme = lower.split_once("://").map_or(lower.as_str(), |(_, rest)| rest);
    let authority = without_scheme.split('/').next().unwrap_or_default();
    // drop userinfo
    let host = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    host.to_string()
}

/// Filesystem-safe cache key for a (host, organization) pair
pub fn cache_key(url: &str, org: &str) -> String {
    let host = normalize_host(url);
    let safe = |s: &str| {
        s.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect::<String>()
    };
    format!("{}_{}", safe(&host), safe(&org.to_ascii_lowercase()))
}

/// Reads and atomically replaces organization snapshots
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    paths: CookforgePaths,
}

impl SnapshotStore {
    pub fn new(paths: CookforgePaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &CookforgePaths {
        &self.paths
    }

    /// Load the snapshot for (host, org); a missing file is `None`, not an error
    pub async fn load(&self, host: &str, org: &str) -> Result<Option<OrganizationSnapshot>> {
        let path = self.paths.snapshot_file(&cache_key(host, org));

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no cached snapshot");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot: OrganizationSnapshot = serde_json::from_str(&contents)?;
        Ok(Some(snapshot))
    }

    /// Replace the snapshot for (host, org).
    ///
    /// Written to a sibling temp file first and renamed into place, so readers
    /// see either the old document or the new one.
    pub async fn save(&self, host: &str, org: &str, snapshot: &OrganizationSnapshot) -> Result<()> {
        let path = self.paths.snapshot_file(&cache_key(host, org));
        let temp_path = path.with_extension("json.tmp");

        tokio::fs::create_dir_all(self.paths.cache_dir()).await?;

        let contents = serde_json::to_string_pretty(snapshot)?;
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, &path).await?;

        debug!(path = %path.display(), repos = snapshot.repositories.len(), "saved snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CookforgeError;
    use crate::types::Repository;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn snapshot(secs: i64) -> OrganizationSnapshot {
        let mut repo = Repository::new(1, "apache2", Utc.timestamp_opt(secs, 0).unwrap());
        repo.set_tags(["1.0.0", "1.1.0"]);
        OrganizationSnapshot {
            organization_updated_at: Utc.timestamp_opt(secs, 0).unwrap(),
            repositories: vec![repo].into_iter().collect(),
        }
    }

    #[test]
    fn test_cache_key_normalizes_host_and_org() {
        assert_eq!(cache_key("https://GHE.Example.com/api/v3", "Chef"), "ghe.example.com_chef");
        assert_eq!(cache_key("ghe.example.com", "chef"), "ghe.example.com_chef");
        assert_eq!(cache_key("http://ghe.example.com:8443/", "ops"), "ghe.example.com_8443_ops");
        assert_eq!(cache_key("https://user:pw@ghe.example.com", "ops"), "ghe.example.com_ops");
    }

    #[tokio::test]
    async fn test_load_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(CookforgePaths::with_root(dir.path()));
        assert!(store.load("ghe.example.com", "chef").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load_same_key_from_different_urls() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(CookforgePaths::with_root(dir.path()));

        store.save("https://GHE.example.com", "Chef", &snapshot(10)).await.unwrap();
        let loaded = store.load("ghe.example.com/api/v3", "chef").await.unwrap();
        assert_eq!(loaded, Some(snapshot(10)));

        // no temp file left behind
        let leftovers: Vec<_> = std::fs::read_dir(store.paths().cache_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(CookforgePaths::with_root(dir.path()));

        store.save("ghe", "chef", &snapshot(10)).await.unwrap();
        store.save("ghe", "chef", &snapshot(20)).await.unwrap();
        let loaded = store.load("ghe", "chef").await.unwrap().unwrap();
        assert_eq!(loaded.organization_updated_at, Utc.timestamp_opt(20, 0).unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let paths = CookforgePaths::with_root(dir.path());
        std::fs::create_dir_all(paths.cache_dir()).unwrap();
        std::fs::write(paths.snapshot_file(&cache_key("ghe", "chef")), "{ nope").unwrap();

        let store = SnapshotStore::new(paths);
        assert!(matches!(
            store.load("ghe", "chef").await,
            Err(CookforgeError::SnapshotFormat(_))
        ));
    }
}

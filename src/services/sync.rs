//! SyncEngine - keeps the per-organization snapshot cache fresh
//!
//! For one organization:
//! - check the organization's `updated_at` (one request)
//! - reuse the cached snapshot when it matches
//! - otherwise re-list every repository, carrying tag data forward for
//!   repositories whose own `updated_at` is unchanged and fetching tags only
//!   for the rest, then save the new snapshot
//!
//! Everything runs in sequence. A failure anywhere in a refresh leaves the
//! prior snapshot on disk untouched.

use futures::TryStreamExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::adapters::ForgePort;
use crate::error::Result;
use crate::storage::SnapshotStore;
use crate::types::{OrganizationSnapshot, Repository, RepositoryCollection};

/// What a single organization sync did
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub org: String,
    /// False when the cached snapshot was reused as-is
    pub refreshed: bool,
    /// Repositories whose tags were fetched during this sync
    pub tags_fetched: usize,
    /// Repositories whose tags were carried over from the prior snapshot
    pub tags_reused: usize,
    pub snapshot: OrganizationSnapshot,
}

pub struct SyncEngine {
    forge: Arc<dyn ForgePort>,
    store: SnapshotStore,
    host: String,
}

impl SyncEngine {
    /// `host` is the remote URL (or host) the cache entries are keyed under
    pub fn new(forge: Arc<dyn ForgePort>, store: SnapshotStore, host: impl Into<String>) -> Self {
        Self {
            forge,
            store,
            host: host.into(),
        }
    }

    pub fn forge(&self) -> &Arc<dyn ForgePort> {
        &self.forge
    }

    /// Bring one organization's snapshot up to date and return it.
    ///
    /// With `force`, the prior snapshot is ignored: every repository's tags
    /// are fetched again.
    pub async fn sync_organization(&self, org: &str, force: bool) -> Result<SyncOutcome> {
        let prior = if force {
            None
        } else {
            self.store.load(&self.host, org).await?
        };

        let remote_org_time = self.forge.organization_updated_at(org).await?;

        if let Some(prior) = prior {
            if prior.is_current(remote_org_time) {
                debug!(org = %org, "snapshot is current");
                return Ok(SyncOutcome {
                    org: org.to_string(),
                    refreshed: false,
                    tags_fetched: 0,
                    tags_reused: 0,
                    snapshot: prior,
                });
            }
            info!(org = %org, cached = %prior.organization_updated_at, remote = %remote_org_time, "snapshot is stale, refreshing");
            return self.refresh(org, remote_org_time, Some(&prior)).await;
        }

        info!(org = %org, "no usable snapshot, fetching");
        self.refresh(org, remote_org_time, None).await
    }

    async fn refresh(
        &self,
        org: &str,
        remote_org_time: chrono::DateTime<chrono::Utc>,
        prior: Option<&OrganizationSnapshot>,
    ) -> Result<SyncOutcome> {
        let mut repositories = RepositoryCollection::new();
        let mut tags_fetched = 0;
        let mut tags_reused = 0;

        let mut listing = self.forge.list_repositories(org);
        while let Some(mut repo) = listing.try_next().await? {
            let cached = prior.and_then(|p| p.repositories.get(&repo.name));
            match cached {
                Some(cached) if cached.updated_at == repo.updated_at => {
                    repo.inherit_tags(cached);
                    tags_reused += 1;
                }
                _ => {
                    let tags = self.forge.list_tags(&repo).await?;
                    debug!(repo = %repo.name, count = tags.len(), "fetched tags");
                    repo.set_tags(tags);
                    tags_fetched += 1;
                }
            }
            repositories.push(repo);
        }
        drop(listing);

        let snapshot = OrganizationSnapshot {
            organization_updated_at: remote_org_time,
            repositories,
        };
        self.store.save(&self.host, org, &snapshot).await?;

        info!(
            org = %org,
            repos = snapshot.repositories.len(),
            tags_fetched,
            tags_reused,
            "snapshot refreshed"
        );

        Ok(SyncOutcome {
            org: org.to_string(),
            refreshed: true,
            tags_fetched,
            tags_reused,
            snapshot,
        })
    }

    /// Sync each organization in the given order and merge the results by
    /// repository name. A later organization's repository replaces an earlier
    /// one with the same name.
    pub async fn aggregate(&self, orgs: &[String]) -> Result<BTreeMap<String, Repository>> {
        let mut merged = BTreeMap::new();
        for org in orgs {
            let outcome = self.sync_organization(org, false).await?;
            for repo in outcome.snapshot.repositories {
                merged.insert(repo.name.clone(), repo);
            }
        }
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MockCallKind, MockForge};
    use crate::error::CookforgeError;
    use crate::storage::CookforgePaths;
    use chrono::{DateTime, TimeZone, Utc};
    use tempfile::TempDir;

    const HOST: &str = "https://ghe.example.com";

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn repo(id: u64, name: &str, updated: i64) -> Repository {
        Repository::new(id, name, at(updated))
    }

    fn setup(forge: MockForge) -> (TempDir, Arc<MockForge>, SyncEngine) {
        let dir = TempDir::new().unwrap();
        let forge = Arc::new(forge);
        let store = SnapshotStore::new(CookforgePaths::with_root(dir.path()));
        let engine = SyncEngine::new(forge.clone(), store, HOST);
        (dir, forge, engine)
    }

    #[tokio::test]
    async fn test_first_sync_fetches_everything() {
        let (_dir, forge, engine) = setup(
            MockForge::new()
                .with_org("chef", at(100), vec![repo(1, "apache2", 10), repo(2, "nginx", 20), repo(3, "users", 30)])
                .with_tags("apache2", ["1.0.0", "1.2.0", "1.1.9", "latest"])
                .with_tags("nginx", ["v2.0.0"]),
        );

        let outcome = engine.sync_organization("chef", false).await.unwrap();
        assert!(outcome.refreshed);
        assert_eq!(outcome.tags_fetched, 3);

        let repos = &outcome.snapshot.repositories;
        assert_eq!(repos.len(), 3);
        assert_eq!(repos.get("apache2").unwrap().tags_last.as_deref(), Some("1.2.0"));
        assert_eq!(repos.get("apache2").unwrap().tags_all.len(), 3);
        assert_eq!(repos.get("nginx").unwrap().tags_last, None);
        assert!(repos.get("nginx").unwrap().tags_all.is_empty());
        // fetch order is preserved
        assert_eq!(repos.get_index(2).unwrap().name, "users");

        // 3 repos at page size 2: pages 1, 2 and the empty page 3
        assert_eq!(forge.count(MockCallKind::ListRepositoriesPage), 3);
    }

    #[tokio::test]
    async fn test_second_sync_only_checks_timestamp() {
        let (_dir, forge, engine) = setup(
            MockForge::new()
                .with_org("chef", at(100), vec![repo(1, "apache2", 10), repo(2, "nginx", 20)])
                .with_tags("apache2", ["1.0.0"]),
        );

        let first = engine.sync_organization("chef", false).await.unwrap();
        forge.clear_calls();

        let second = engine.sync_organization("chef", false).await.unwrap();
        assert!(!second.refreshed);
        assert_eq!(second.snapshot, first.snapshot);
        assert_eq!(forge.count(MockCallKind::OrganizationUpdatedAt), 1);
        assert_eq!(forge.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_unchanged_repo_keeps_tags_without_fetch() {
        let (_dir, forge, engine) = setup(
            MockForge::new()
                .with_org("chef", at(100), vec![repo(1, "apache2", 10), repo(2, "nginx", 20)])
                .with_tags("apache2", ["2.0.0", "1.0.0"])
                .with_tags("nginx", ["0.1.0"]),
        );
        engine.sync_organization("chef", false).await.unwrap();

        // the organization changes, apache2 does not, nginx does
        forge.set_org_updated_at("chef", at(200));
        forge.upsert_repo("chef", repo(2, "nginx", 25));
        forge.set_tags("nginx", ["0.1.0", "0.2.0"]);
        // would be visible if apache2 were refetched
        forge.set_tags("apache2", ["3.0.0"]);
        forge.clear_calls();

        let outcome = engine.sync_organization("chef", false).await.unwrap();
        assert!(outcome.refreshed);
        assert_eq!(outcome.tags_reused, 1);
        assert_eq!(forge.tag_fetches(), vec!["nginx".to_string()]);

        let repos = &outcome.snapshot.repositories;
        assert_eq!(repos.get("apache2").unwrap().tags_last.as_deref(), Some("2.0.0"));
        assert_eq!(repos.get("nginx").unwrap().tags_last.as_deref(), Some("0.2.0"));
        assert_eq!(outcome.snapshot.organization_updated_at, at(200));
    }

    #[tokio::test]
    async fn test_failed_listing_keeps_prior_snapshot() {
        let (dir, forge, engine) = setup(
            MockForge::new()
                .with_org("chef", at(100), vec![repo(1, "a", 10), repo(2, "b", 10), repo(3, "c", 10)])
                .with_tags("a", ["1.0.0"]),
        );
        let first = engine.sync_organization("chef", false).await.unwrap();

        forge.set_org_updated_at("chef", at(200));
        forge.fail_page(Some(2));

        let err = engine.sync_organization("chef", false).await.unwrap_err();
        match err {
            CookforgeError::Forge(e) => assert_eq!(e.status(), Some(500)),
            other => panic!("expected forge error, got {other:?}"),
        }

        let store = SnapshotStore::new(CookforgePaths::with_root(dir.path()));
        let on_disk = store.load(HOST, "chef").await.unwrap().unwrap();
        assert_eq!(on_disk, first.snapshot);
    }

    #[tokio::test]
    async fn test_failed_tag_fetch_keeps_prior_snapshot() {
        let (dir, forge, engine) = setup(MockForge::new().with_org("chef", at(100), vec![repo(1, "a", 10)]));
        forge.fail_tags_for(Some("a"));

        assert!(engine.sync_organization("chef", false).await.is_err());

        let store = SnapshotStore::new(CookforgePaths::with_root(dir.path()));
        assert!(store.load(HOST, "chef").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_force_refetches_all_tags() {
        let (_dir, forge, engine) = setup(
            MockForge::new()
                .with_page_size(1)
                .with_org("chef", at(100), vec![repo(1, "a", 10), repo(2, "b", 10)]),
        );
        engine.sync_organization("chef", false).await.unwrap();
        forge.clear_calls();

        let outcome = engine.sync_organization("chef", true).await.unwrap();
        assert!(outcome.refreshed);
        assert_eq!(outcome.snapshot.repositories.len(), 2);
        assert_eq!(forge.count(MockCallKind::ListTags), 2);
        // one repository per page, then the empty page
        assert_eq!(forge.count(MockCallKind::ListRepositoriesPage), 3);
    }

    #[tokio::test]
    async fn test_aggregate_later_org_wins() {
        let (_dir, _forge, engine) = setup(
            MockForge::new()
                .with_org("org-a", at(1), vec![repo(1, "cookbook-x", 10), repo(2, "only-a", 10)])
                .with_org("org-b", at(1), vec![repo(9, "cookbook-x", 10)]),
        );

        let merged = engine
            .aggregate(&["org-a".to_string(), "org-b".to_string()])
            .await
            .unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged["cookbook-x"].id, 9);
        assert_eq!(merged["only-a"].id, 2);

        let reversed = engine
            .aggregate(&["org-b".to_string(), "org-a".to_string()])
            .await
            .unwrap();
        assert_eq!(reversed["cookbook-x"].id, 1);
    }
}

//! Repository records, the name-unique collection, and the cached snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::LinkType;
use crate::version;

/// Protocol-specific clone/browse URLs of a repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryLinks {
    #[serde(default)]
    pub ssh_url: Option<String>,
    #[serde(default)]
    pub clone_url: Option<String>,
    #[serde(default)]
    pub svn_url: Option<String>,
    #[serde(default)]
    pub git_url: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

impl RepositoryLinks {
    /// The URL for the given link type, if the forge reported one
    pub fn get(&self, link: LinkType) -> Option<&str> {
        let url = match link {
            LinkType::Ssh => &self.ssh_url,
            LinkType::Http | LinkType::Https => &self.clone_url,
            LinkType::Svn => &self.svn_url,
            LinkType::Html => &self.html_url,
            LinkType::Git => &self.git_url,
        };
        url.as_deref().filter(|u| !u.is_empty())
    }
}

/// One remote repository, as listed by the forge and enriched with tag data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Forge-assigned id
    pub id: u64,

    /// Repository name, unique within an organization
    pub name: String,

    #[serde(default)]
    pub full_name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub private: bool,

    #[serde(default)]
    pub homepage: Option<String>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    /// Staleness signal for the tag data
    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub links: RepositoryLinks,

    #[serde(default)]
    pub tags_url: Option<String>,

    /// Version tags only; anything else is dropped when tags are set
    #[serde(default)]
    pub tags_all: Vec<String>,

    /// Highest entry of `tags_all`
    #[serde(default)]
    pub tags_last: Option<String>,
}

impl Repository {
    /// Create a repository with no links or tags
    pub fn new(id: u64, name: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            full_name: None,
            description: None,
            private: false,
            homepage: None,
            created_at: None,
            updated_at,
            pushed_at: None,
            links: RepositoryLinks::default(),
            tags_url: None,
            tags_all: Vec::new(),
            tags_last: None,
        }
    }

    pub fn with_links(mut self, links: RepositoryLinks) -> Self {
        self.links = links;
        self
    }

    pub fn with_tags_url(mut self, url: impl Into<String>) -> Self {
        self.tags_url = Some(url.into());
        self
    }

    /// Replace the tag set, keeping only version tags, and recompute `tags_last`
    pub fn set_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut all: Vec<String> = Vec::new();
        for tag in tags {
            let tag = tag.into();
            if version::is_version_tag(&tag) && !all.contains(&tag) {
                all.push(tag);
            }
        }
        self.tags_last = version::latest_tag(&all);
        self.tags_all = all;
    }

    /// Carry tag data over from an earlier record of the same repository
    pub fn inherit_tags(&mut self, cached: &Repository) {
        self.tags_all = cached.tags_all.clone();
        self.tags_last = cached.tags_last.clone();
    }

    /// Whether a tag with exactly this name exists
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags_all.iter().any(|t| t == tag)
    }

    /// Link for the configured link type
    pub fn link(&self, link: LinkType) -> Option<&str> {
        self.links.get(link)
    }
}

/// Ordered list of repositories, unique by name
///
/// Pushing a repository whose name is already present replaces the earlier
/// entry in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepositoryCollection {
    repos: Vec<Repository>,
}

impl RepositoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, repo: Repository) {
        match self.position(&repo.name) {
            Some(pos) => self.repos[pos] = repo,
            None => self.repos.push(repo),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Repository> {
        self.repos.iter().find(|r| r.name == name)
    }

    pub fn get_index(&self, index: usize) -> Option<&Repository> {
        self.repos.get(index)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.repos.iter().position(|r| r.name == name)
    }

    pub fn len(&self) -> usize {
        self.repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Repository> {
        self.repos.iter()
    }
}

impl FromIterator<Repository> for RepositoryCollection {
    fn from_iter<T: IntoIterator<Item = Repository>>(iter: T) -> Self {
        let mut collection = Self::new();
        for repo in iter {
            collection.push(repo);
        }
        collection
    }
}

impl IntoIterator for RepositoryCollection {
    type Item = Repository;
    type IntoIter = std::vec::IntoIter<Repository>;

    fn into_iter(self) -> Self::IntoIter {
        self.repos.into_iter()
    }
}

impl<'a> IntoIterator for &'a RepositoryCollection {
    type Item = &'a Repository;
    type IntoIter = std::slice::Iter<'a, Repository>;

    fn into_iter(self) -> Self::IntoIter {
        self.repos.iter()
    }
}

/// One repository returned by a forge search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Browse URL
    #[serde(default)]
    pub url: Option<String>,
    /// Relevance as reported by the forge
    #[serde(default)]
    pub score: f64,
}

/// Persisted cache unit for one (host, organization) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationSnapshot {
    /// The organization's `updated_at` when this snapshot was taken
    pub organization_updated_at: DateTime<Utc>,
    pub repositories: RepositoryCollection,
}

impl OrganizationSnapshot {
    /// Reusable only while the organization has not changed remotely
    pub fn is_current(&self, remote_updated_at: DateTime<Utc>) -> bool {
        self.organization_updated_at == remote_updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_set_tags_filters_and_picks_latest() {
        let mut repo = Repository::new(1, "apache2", at(0));
        repo.set_tags(["1.0.0", "v2.0.0", "1.10.0", "1.9.3", "1.0.0", "wip"]);
        assert_eq!(repo.tags_all, vec!["1.0.0", "1.10.0", "1.9.3"]);
        assert_eq!(repo.tags_last.as_deref(), Some("1.10.0"));
    }

    #[test]
    fn test_set_tags_empty_clears_latest() {
        let mut repo = Repository::new(1, "apache2", at(0));
        repo.set_tags(["1.0.0"]);
        repo.set_tags(Vec::<String>::new());
        assert!(repo.tags_all.is_empty());
        assert_eq!(repo.tags_last, None);
    }

    #[test]
    fn test_collection_push_replaces_by_name() {
        let mut repos = RepositoryCollection::new();
        repos.push(Repository::new(1, "a", at(0)));
        repos.push(Repository::new(2, "b", at(0)));
        repos.push(Repository::new(3, "a", at(5)));

        assert_eq!(repos.len(), 2);
        assert_eq!(repos.get("a").unwrap().id, 3);
        assert_eq!(repos.get_index(0).unwrap().name, "a");
        assert_eq!(repos.get_index(1).unwrap().name, "b");
        assert!(repos.get_index(2).is_none());
    }

    #[test]
    fn test_link_selection() {
        let repo = Repository::new(1, "nginx", at(0)).with_links(RepositoryLinks {
            ssh_url: Some("git@forge:ops/nginx.git".into()),
            clone_url: Some("https://forge/ops/nginx.git".into()),
            svn_url: None,
            git_url: Some(String::new()),
            html_url: Some("https://forge/ops/nginx".into()),
        });
        assert_eq!(repo.link(LinkType::Ssh), Some("git@forge:ops/nginx.git"));
        assert_eq!(repo.link(LinkType::Http), Some("https://forge/ops/nginx.git"));
        assert_eq!(repo.link(LinkType::Https), Some("https://forge/ops/nginx.git"));
        assert_eq!(repo.link(LinkType::Svn), None);
        assert_eq!(repo.link(LinkType::Git), None);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let mut repo = Repository::new(7, "users", at(100)).with_links(RepositoryLinks {
            ssh_url: Some("git@forge:ops/users.git".into()),
            ..RepositoryLinks::default()
        });
        repo.set_tags(["0.1.0"]);
        let snapshot = OrganizationSnapshot {
            organization_updated_at: at(200),
            repositories: vec![repo].into_iter().collect(),
        };

        let value = serde_json::to_value(&snapshot).unwrap();
        assert!(value["repositories"].is_array());
        assert_eq!(value["repositories"][0]["ssh_url"], "git@forge:ops/users.git");
        assert_eq!(value["repositories"][0]["tags_last"], "0.1.0");

        let back: OrganizationSnapshot = serde_json::from_value(value).unwrap();
        assert_eq!(back, snapshot);
        assert!(back.is_current(at(200)));
        assert!(!back.is_current(at(201)));
    }
}

//! Mock ForgePort implementation for testing
//!
//! Holds organizations, repositories and tags in memory, serves the repository
//! listing in small pages, and records every call so tests can assert how
//! much network work a sync performed.
//!
//! # Example
//!
//! ```rust,ignore
//! let forge = MockForge::new()
//!     .with_org("chef", org_time, vec![repo])
//!     .with_tags("apache2", ["1.0.0", "1.1.0"]);
//!
//! let repos = forge.collect_repositories("chef").await?;
//! assert_eq!(forge.count(MockCallKind::ListTags), 0);
//! ```

use async_stream::stream;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{ForgeError, ForgePort, ForgeResult};
use crate::types::{Repository, SearchHit};
use crate::version;

/// Record of a call made to the mock forge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    OrganizationUpdatedAt { org: String },
    ListRepositoriesPage { org: String, page: u32 },
    ListTags { repo: String },
    SearchRepositories { query: String },
    DeleteRepository { owner: String, name: String },
}

/// Call kinds, for counting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockCallKind {
    OrganizationUpdatedAt,
    ListRepositoriesPage,
    ListTags,
    SearchRepositories,
    DeleteRepository,
}

impl MockCall {
    pub const fn kind(&self) -> MockCallKind {
        match self {
            MockCall::OrganizationUpdatedAt { .. } => MockCallKind::OrganizationUpdatedAt,
            MockCall::ListRepositoriesPage { .. } => MockCallKind::ListRepositoriesPage,
            MockCall::ListTags { .. } => MockCallKind::ListTags,
            MockCall::SearchRepositories { .. } => MockCallKind::SearchRepositories,
            MockCall::DeleteRepository { .. } => MockCallKind::DeleteRepository,
        }
    }
}

#[derive(Debug, Clone)]
struct MockOrg {
    updated_at: DateTime<Utc>,
    repos: Vec<Repository>,
}

#[derive(Debug, Default)]
struct MockState {
    orgs: HashMap<String, MockOrg>,
    tags: HashMap<String, Vec<String>>,
    /// Page number (1-based) of a listing that fails
    failing_page: Option<u32>,
    failing_tags: Option<String>,
}

pub struct MockForge {
    state: Mutex<MockState>,
    calls: Mutex<Vec<MockCall>>,
    page_size: usize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn not_found(url: String) -> ForgeError {
    ForgeError::Transport {
        status: 404,
        message: "Not Found".to_string(),
        url,
    }
}

impl MockForge {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            calls: Mutex::new(Vec::new()),
            page_size: 2,
        }
    }

    /// Repositories per listing page (default 2)
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_org(self, org: &str, updated_at: DateTime<Utc>, repos: Vec<Repository>) -> Self {
        self.set_org(org, updated_at, repos);
        self
    }

    pub fn with_tags<I, S>(self, repo: &str, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_tags(repo, tags);
        self
    }

    /// Replace an organization wholesale
    pub fn set_org(&self, org: &str, updated_at: DateTime<Utc>, repos: Vec<Repository>) {
        lock(&self.state)
            .orgs
            .insert(org.to_string(), MockOrg { updated_at, repos });
    }

    pub fn set_org_updated_at(&self, org: &str, updated_at: DateTime<Utc>) {
        if let Some(o) = lock(&self.state).orgs.get_mut(org) {
            o.updated_at = updated_at;
        }
    }

    /// Insert or replace one repository of an organization
    pub fn upsert_repo(&self, org: &str, repo: Repository) {
        let mut state = lock(&self.state);
        if let Some(o) = state.orgs.get_mut(org) {
            match o.repos.iter_mut().find(|r| r.name == repo.name) {
                Some(existing) => *existing = repo,
                None => o.repos.push(repo),
            }
        }
    }

    /// Raw tag names served for a repository (non-versions are filtered on read)
    pub fn set_tags<I, S>(&self, repo: &str, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lock(&self.state)
            .tags
            .insert(repo.to_string(), tags.into_iter().map(Into::into).collect());
    }

    /// Make listing page `page` fail with a 500
    pub fn fail_page(&self, page: Option<u32>) {
        lock(&self.state).failing_page = page;
    }

    /// Make tag fetches for `repo` fail with a 500
    pub fn fail_tags_for(&self, repo: Option<&str>) {
        lock(&self.state).failing_tags = repo.map(str::to_string);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.calls).clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    pub fn count(&self, kind: MockCallKind) -> usize {
        lock(&self.calls).iter().filter(|c| c.kind() == kind).count()
    }

    /// Names of repositories whose tags were fetched, in call order
    pub fn tag_fetches(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .filter_map(|c| match c {
                MockCall::ListTags { repo } => Some(repo.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: MockCall) {
        lock(&self.calls).push(call);
    }

    fn page(&self, org: &str, page: u32) -> ForgeResult<Vec<Repository>> {
        self.record(MockCall::ListRepositoriesPage {
            org: org.to_string(),
            page,
        });
        let url = format!("mock://orgs/{org}/repos?page={page}");
        let state = lock(&self.state);
        if state.failing_page == Some(page) {
            return Err(ForgeError::Transport {
                status: 500,
                message: "Internal Server Error".to_string(),
                url,
            });
        }
        let o = state.orgs.get(org).ok_or_else(|| not_found(url))?;
        let start = (page as usize - 1) * self.page_size;
        Ok(o.repos.iter().skip(start).take(self.page_size).cloned().collect())
    }
}

impl Default for MockForge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ForgePort for MockForge {
    async fn organization_updated_at(&self, org: &str) -> ForgeResult<DateTime<Utc>> {
        self.record(MockCall::OrganizationUpdatedAt { org: org.to_string() });
        lock(&self.state)
            .orgs
            .get(org)
            .map(|o| o.updated_at)
            .ok_or_else(|| not_found(format!("mock://orgs/{org}")))
    }

    fn list_repositories<'a>(&'a self, org: &'a str) -> BoxStream<'a, ForgeResult<Repository>> {
        Box::pin(stream! {
            let mut page = 1u32;
            loop {
                let repos = match self.page(org, page) {
                    Ok(repos) => repos,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                if repos.is_empty() {
                    break;
                }
                for repo in repos {
                    yield Ok(repo);
                }
                page += 1;
            }
        })
    }

    async fn list_tags(&self, repo: &Repository) -> ForgeResult<Vec<String>> {
        self.record(MockCall::ListTags { repo: repo.name.clone() });
        let state = lock(&self.state);
        if state.failing_tags.as_deref() == Some(repo.name.as_str()) {
            return Err(ForgeError::Transport {
                status: 500,
                message: "Internal Server Error".to_string(),
                url: format!("mock://repos/{}/tags", repo.name),
            });
        }
        Ok(state
            .tags
            .get(&repo.name)
            .map(|tags| {
                tags.iter()
                    .filter(|t| version::is_version_tag(t))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Case-insensitive substring match on repository names, sorted by name
    async fn search_repositories(&self, query: &str) -> ForgeResult<Vec<SearchHit>> {
        self.record(MockCall::SearchRepositories {
            query: query.to_string(),
        });
        let needle = query.to_ascii_lowercase();
        let state = lock(&self.state);
        let mut hits: Vec<SearchHit> = state
            .orgs
            .iter()
            .flat_map(|(org, o)| o.repos.iter().map(move |r| (org, r)))
            .filter(|(_, r)| r.name.to_ascii_lowercase().contains(&needle))
            .map(|(org, r)| SearchHit {
                name: r.name.clone(),
                full_name: Some(format!("{org}/{}", r.name)),
                description: r.description.clone(),
                url: r.links.html_url.clone(),
                score: 1.0,
            })
            .collect();
        hits.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(hits)
    }

    async fn delete_repository(&self, owner: &str, name: &str) -> ForgeResult<()> {
        self.record(MockCall::DeleteRepository {
            owner: owner.to_string(),
            name: name.to_string(),
        });
        let mut state = lock(&self.state);
        let o = state
            .orgs
            .get_mut(owner)
            .ok_or_else(|| not_found(format!("mock://repos/{owner}/{name}")))?;
        let before = o.repos.len();
        o.repos.retain(|r| r.name != name);
        if o.repos.len() == before {
            return Err(not_found(format!("mock://repos/{owner}/{name}")));
        }
        Ok(())
    }
}

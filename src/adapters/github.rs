//! GitHub adapter implementing ForgePort
//!
//! Speaks the GitHub REST API v3 shape, which GitHub Enterprise appliances
//! serve under `{url}/api/v3`.

use async_stream::stream;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use super::transport::{HttpMethod, Transport};
use super::{ForgeError, ForgePort, ForgeResult};
use crate::types::{Repository, RepositoryLinks, SearchHit};
use crate::version;

/// GitHub repository response from API
#[derive(Debug, Deserialize)]
struct GitHubRepo {
    id: u64,
    name: String,
    full_name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    private: bool,
    homepage: Option<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
    pushed_at: Option<DateTime<Utc>>,
    ssh_url: Option<String>,
    clone_url: Option<String>,
    svn_url: Option<String>,
    git_url: Option<String>,
    html_url: Option<String>,
    tags_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubOrg {
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct GitHubTag {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GitHubSearchItem {
    name: String,
    full_name: Option<String>,
    description: Option<String>,
    html_url: Option<String>,
    #[serde(default)]
    score: f64,
}

#[derive(Debug, Deserialize)]
struct GitHubSearchResult {
    #[serde(default)]
    items: Vec<GitHubSearchItem>,
}

/// GitHub adapter for ForgePort trait
pub struct GitHubAdapter {
    transport: Arc<dyn Transport>,
    api_base: String,
}

impl GitHubAdapter {
    /// `api_base` is the API root, e.g. `https://github.example.com/api/v3`
    pub fn new(transport: Arc<dyn Transport>, api_base: impl Into<String>) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        Self { transport, api_base }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn org_url(&self, org: &str) -> String {
        format!("{}/orgs/{}", self.api_base, urlencoding::encode(org))
    }

    fn repos_page_url(&self, org: &str, page: u32) -> String {
        format!("{}/repos?page={page}", self.org_url(org))
    }

    /// Convert GitHub API response to our Repository type
    fn to_repository(url: &str, gh: GitHubRepo) -> ForgeResult<Repository> {
        if gh.name.trim().is_empty() {
            return Err(ForgeError::InvalidRepository {
                url: url.to_string(),
                reason: format!("repository {} has an empty name", gh.id),
            });
        }

        let mut repo = Repository::new(gh.id, gh.name, gh.updated_at).with_links(RepositoryLinks {
            ssh_url: gh.ssh_url,
            clone_url: gh.clone_url,
            svn_url: gh.svn_url,
            git_url: gh.git_url,
            html_url: gh.html_url,
        });
        repo.full_name = gh.full_name;
        repo.description = gh.description;
        repo.private = gh.private;
        repo.homepage = gh.homepage;
        repo.created_at = gh.created_at;
        repo.pushed_at = gh.pushed_at;
        repo.tags_url = gh.tags_url;
        Ok(repo)
    }

    fn decode_page(url: &str, value: Value) -> ForgeResult<Vec<Repository>> {
        let items = match value {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => {
                return Err(ForgeError::Decode {
                    url: url.to_string(),
                    body: other.to_string(),
                })
            }
        };

        items
            .into_iter()
            .map(|item| {
                let gh: GitHubRepo = serde_json::from_value(item).map_err(|e| ForgeError::InvalidRepository {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
                Self::to_repository(url, gh)
            })
            .collect()
    }

    fn decode_tags(url: &str, value: Value) -> ForgeResult<Vec<String>> {
        let tags: Vec<GitHubTag> = serde_json::from_value(value.clone()).map_err(|_| ForgeError::Decode {
            url: url.to_string(),
            body: value.to_string(),
        })?;

        Ok(tags
            .into_iter()
            .map(|t| t.name)
            .filter(|name| version::is_version_tag(name))
            .collect())
    }

    fn decode_search(url: &str, value: Value) -> ForgeResult<Vec<SearchHit>> {
        let result: GitHubSearchResult = serde_json::from_value(value.clone()).map_err(|_| ForgeError::Decode {
            url: url.to_string(),
            body: value.to_string(),
        })?;
        Ok(result
            .items
            .into_iter()
            .map(|item| SearchHit {
                name: item.name,
                full_name: item.full_name,
                description: item.description,
                url: item.html_url,
                score: item.score,
            })
            .collect())
    }

    async fn fetch_page(&self, org: &str, page: u32) -> ForgeResult<Vec<Repository>> {
        let url = self.repos_page_url(org, page);
        debug!(org = %org, page, "fetching repository page");
        let value = self.transport.get(&url).await?;
        Self::decode_page(&url, value)
    }
}

#[async_trait]
impl ForgePort for GitHubAdapter {
    async fn organization_updated_at(&self, org: &str) -> ForgeResult<DateTime<Utc>> {
        let url = self.org_url(org);
        let value = self.transport.get(&url).await?;
        let gh_org: GitHubOrg = serde_json::from_value(value.clone()).map_err(|_| ForgeError::Decode {
            url: url.clone(),
            body: value.to_string(),
        })?;
        debug!(org = %org, updated_at = %gh_org.updated_at, "organization timestamp");
        Ok(gh_org.updated_at)
    }

    fn list_repositories<'a>(&'a self, org: &'a str) -> BoxStream<'a, ForgeResult<Repository>> {
        Box::pin(stream! {
            let mut page = 1u32;
            loop {
                let repos = match self.fetch_page(org, page).await {
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
        let Some(url) = repo.tags_url.as_deref() else {
            return Ok(Vec::new());
        };
        debug!(repo = %repo.name, "fetching tags");
        let value = self.transport.get(url).await?;
        Self::decode_tags(url, value)
    }

    async fn search_repositories(&self, query: &str) -> ForgeResult<Vec<SearchHit>> {
        let url = format!(
            "{}/search/repositories?q={}&sort=stars&order=desc",
            self.api_base,
            urlencoding::encode(query)
        );
        debug!(query = %query, "searching repositories");
        let value = self.transport.get(&url).await?;
        Self::decode_search(&url, value)
    }

    async fn delete_repository(&self, owner: &str, name: &str) -> ForgeResult<()> {
        let url = format!(
            "{}/repos/{}/{}",
            self.api_base,
            urlencoding::encode(owner),
            urlencoding::encode(name)
        );
        self.transport.request(HttpMethod::Delete, &url, None).await?;
        info!(owner = %owner, repo = %name, "repository deleted");
        Ok(())
    }
}

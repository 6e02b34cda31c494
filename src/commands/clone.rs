//! Clone command - check cookbook repositories out locally
//!
//! `cookforge clone [COOKBOOK] [--all]`
//!
//! Each cookbook is cloned into `<cookbook_path>/<name>`. Existing paths are
//! left alone; cookbooks without a repository or link are reported.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{CookforgeError, Result};
use crate::git::{redact_url, RepoOps};
use crate::package::ArtifactServer;
use crate::services::SyncEngine;
use crate::types::{LinkType, Repository};

use super::{inject_token, repositories_by_precedence};

#[derive(Debug, Clone, Default)]
pub struct CloneOptions {
    pub cookbook: Option<String>,
    /// Every cookbook published on the artifact server
    pub all: bool,
    pub link: LinkType,
    pub token: Option<String>,
    pub cookbook_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloneStatus {
    Cloned,
    /// Destination already exists
    Skipped,
    /// No repository, or no link of the selected type
    Unknown,
}

impl CloneStatus {
    fn label(&self) -> &'static str {
        match self {
            CloneStatus::Cloned => "CLONE",
            CloneStatus::Skipped => "SKIP",
            CloneStatus::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CloneEntry {
    pub name: String,
    pub status: CloneStatus,
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct CloneReport {
    pub entries: Vec<CloneEntry>,
}

impl CloneReport {
    pub fn count(&self, status: &CloneStatus) -> usize {
        self.entries.iter().filter(|e| &e.status == status).count()
    }

    pub fn format(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("Processing [ {:<7} ] {}", e.status.label(), e.name))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

async fn clone_one(
    git: &dyn RepoOps,
    repos: &BTreeMap<String, Repository>,
    name: &str,
    options: &CloneOptions,
) -> Result<CloneEntry> {
    let path = options.cookbook_path.join(name);
    let entry = |status| CloneEntry {
        name: name.to_string(),
        status,
        path: path.clone(),
    };

    let Some(url) = repos.get(name).and_then(|r| r.link(options.link)) else {
        info!(cookbook = %name, "cannot find the repository or its link");
        return Ok(entry(CloneStatus::Unknown));
    };

    if path_exists(&path).await {
        info!(path = %path.display(), "path already exists, skipping");
        return Ok(entry(CloneStatus::Skipped));
    }

    let clone_url = match options.link {
        LinkType::Http | LinkType::Https => inject_token(url, options.token.as_deref()),
        _ => url.to_string(),
    };
    debug!(url = %redact_url(&clone_url), path = %path.display(), "cloning");
    git.clone_repo(&clone_url, &path).await?;

    Ok(entry(CloneStatus::Cloned))
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

pub async fn clone(
    engine: &SyncEngine,
    artifacts: &dyn ArtifactServer,
    git: &dyn RepoOps,
    orgs: &[String],
    options: &CloneOptions,
) -> Result<CloneReport> {
    let names: Vec<String> = match (&options.cookbook, options.all) {
        (Some(name), _) => vec![name.clone()],
        (None, true) => artifacts.list_cookbooks().await?.into_keys().collect(),
        (None, false) => {
            return Err(CookforgeError::Config("specify a cookbook name or --all".into()));
        }
    };

    let repos = repositories_by_precedence(engine, orgs).await?;

    let mut entries = Vec::with_capacity(names.len());
    for name in &names {
        entries.push(clone_one(git, &repos, name, options).await?);
    }
    Ok(CloneReport { entries })
}

//! Deploy command - release a cookbook version
//!
//! `cookforge deploy COOKBOOK [VERSION] [--major|--minor|--patch] [--quick]`
//!
//! 1. Settle the version against what the artifact server already has,
//!    asking before bumping past a published version
//! 2. Refuse frozen versions
//! 3. Clone the repository into the work directory
//! 4. Check out the existing tag, or write the version into the metadata,
//!    commit, tag and push
//! 5. Run the upload command, when one is configured
//!
//! Nothing touches git before step 3, so an aborted resolution leaves no
//! trace.

use std::path::PathBuf;
use tracing::{info, warn};

use crate::cookbook;
use crate::error::{CookforgeError, Result};
use crate::git::RepoOps;
use crate::package::{ArtifactServer, UploadCommand, UploadResult};
use crate::services::{DeployMode, DeploymentVersionDecision, SyncEngine, TagAction, VersionResolver};
use crate::types::LinkType;
use crate::version::{SemVer, VersionBump};

use super::{inject_token, repositories_by_precedence};

const REMOTE: &str = "origin";

#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    pub cookbook: String,
    /// Defaults to the repository's latest tag
    pub version: Option<String>,
    pub bump: VersionBump,
    pub mode: DeployMode,
    pub link: LinkType,
    pub token: Option<String>,
    pub work_dir: PathBuf,
    pub upload: Option<UploadCommand>,
}

#[derive(Debug)]
pub struct DeployReport {
    pub cookbook: String,
    pub decision: DeploymentVersionDecision,
    pub checkout: PathBuf,
    pub upload: Option<UploadResult>,
}

impl DeployReport {
    pub fn format(&self) -> String {
        let d = &self.decision;
        let mut lines = Vec::new();

        match &d.bumped_from {
            Some(from) => lines.push(format!(
                "Cookbook {} version {} ({} bump from {from})",
                self.cookbook, d.version, d.bump
            )),
            None => lines.push(format!("Cookbook {} version {}", self.cookbook, d.version)),
        }

        lines.push(match d.tag_action {
            TagAction::CheckoutExisting => format!("Checked out existing tag {}", d.version),
            TagAction::CreateNew => format!("Tagged and pushed {}", d.version),
        });
        lines.push(format!("Working copy: {}", self.checkout.display()));

        match &self.upload {
            Some(u) if u.success => lines.push("Upload: done".to_string()),
            Some(u) => lines.push(format!("Upload: failed: {}", u.error.as_deref().unwrap_or("unknown error"))),
            None => lines.push("Upload: no upload_command configured".to_string()),
        }

        lines.join("\n")
    }
}

/// Deploy one cookbook.
///
/// `confirm(current, proposed)` is asked whenever `current` is already
/// published; declining aborts before anything is cloned.
pub async fn deploy<F>(
    engine: &SyncEngine,
    artifacts: &dyn ArtifactServer,
    git: &dyn RepoOps,
    orgs: &[String],
    options: &DeployOptions,
    confirm: F,
) -> Result<DeployReport>
where
    F: FnMut(&str, &str) -> bool,
{
    let name = options.cookbook.as_str();
    let repos = repositories_by_precedence(engine, orgs).await?;
    let repo = repos
        .get(name)
        .ok_or_else(|| CookforgeError::MissingRepository(name.to_string()))?;

    let url = repo.link(options.link).ok_or_else(|| CookforgeError::MissingLink {
        name: name.to_string(),
        link: options.link.to_string(),
    })?;

    let requested = match (&options.version, &repo.tags_last) {
        (Some(v), _) => v.clone(),
        (None, Some(latest)) => latest.clone(),
        (None, None) => return Err(CookforgeError::NoVersion(name.to_string())),
    };
    SemVer::parse(&requested)?;

    let published = artifacts.cookbook_versions(name).await?;
    let resolver = VersionResolver::new(published, repo.tags_all.iter().cloned(), options.bump);
    let decision = resolver.resolve(&requested, options.mode, confirm)?;

    if decision.already_published && artifacts.is_frozen(name, &decision.version).await? {
        return Err(CookforgeError::FrozenVersion {
            cookbook: name.to_string(),
            version: decision.version.clone(),
        });
    }

    info!(cookbook = %name, version = %decision.version, action = ?decision.tag_action, "deploying");

    let checkout = options.work_dir.join(name);
    if tokio::fs::try_exists(&checkout).await.unwrap_or(false) {
        warn!(path = %checkout.display(), "removing stale working copy");
        tokio::fs::remove_dir_all(&checkout).await?;
    }
    tokio::fs::create_dir_all(&options.work_dir).await?;

    let clone_url = match options.link {
        LinkType::Http | LinkType::Https => inject_token(url, options.token.as_deref()),
        _ => url.to_string(),
    };
    git.clone_repo(&clone_url, &checkout).await?;

    match decision.tag_action {
        TagAction::CheckoutExisting => {
            let branch = format!("deploy-{}", decision.version);
            git.checkout_new_branch(&checkout, &branch, &decision.version).await?;
        }
        TagAction::CreateNew => {
            cookbook::set_version(&checkout, &decision.version)?;
            git.commit_all(&checkout, &format!("Bump {name} to {}", decision.version))
                .await?;
            git.tag_annotated(&checkout, &decision.version, &format!("Release {name} {}", decision.version))
                .await?;
            git.push(&checkout, REMOTE, "HEAD").await?;
            git.push_tags(&checkout, REMOTE).await?;
        }
    }

    let upload = match &options.upload {
        Some(cmd) => {
            let result = cmd.run(name, &checkout, &decision.version).await?;
            if !result.success {
                return Err(CookforgeError::Upload(
                    result.error.unwrap_or_else(|| "upload command failed".to_string()),
                ));
            }
            Some(result)
        }
        None => None,
    };

    Ok(DeployReport {
        cookbook: name.to_string(),
        decision,
        checkout,
        upload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockForge;
    use crate::git::{GitCall, RecordingGit};
    use crate::package::MockArtifactServer;
    use crate::storage::{CookforgePaths, SnapshotStore};
    use crate::types::{Repository, RepositoryLinks};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn engine(dir: &TempDir, tags: &[&str]) -> SyncEngine {
        let t = Utc.timestamp_opt(1, 0).unwrap();
        let repo = Repository::new(1, "apache2", t).with_links(RepositoryLinks {
            ssh_url: Some("git@ghe:chef/apache2.git".into()),
            ..RepositoryLinks::default()
        });
        let forge = Arc::new(
            MockForge::new()
                .with_org("chef", t, vec![repo])
                .with_tags("apache2", tags.iter().copied()),
        );
        SyncEngine::new(forge, SnapshotStore::new(CookforgePaths::with_root(dir.path().join("state"))), "ghe")
    }

    fn options(dir: &TempDir, version: Option<&str>) -> DeployOptions {
        DeployOptions {
            cookbook: "apache2".into(),
            version: version.map(str::to_string),
            work_dir: dir.path().join("work"),
            ..DeployOptions::default()
        }
    }

    fn orgs() -> Vec<String> {
        vec!["chef".to_string()]
    }

    #[tokio::test]
    async fn test_bump_creates_tag() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, &["1.0.0"]);
        let artifacts = MockArtifactServer::new().with_cookbook("apache2", ["1.0.0"]);
        let git = RecordingGit::new().with_file("metadata.rb", "name 'apache2'\nversion '1.0.0'\n");

        let report = deploy(&engine, &artifacts, &git, &orgs(), &options(&dir, None), |_, _| true)
            .await
            .unwrap();

        assert_eq!(report.decision.version, "1.0.1");
        assert_eq!(report.decision.bumped_from.as_deref(), Some("1.0.0"));
        assert_eq!(cookbook::read_version(&report.checkout).unwrap(), "1.0.1");

        let calls = git.calls();
        assert_eq!(calls.len(), 5);
        assert!(matches!(&calls[0], GitCall::Clone { url, .. } if url == "git@ghe:chef/apache2.git"));
        assert_eq!(calls[2], GitCall::TagAnnotated { tag: "1.0.1".into() });
        assert_eq!(calls[4], GitCall::PushTags { remote: "origin".into() });
    }

    #[tokio::test]
    async fn test_malformed_version_is_rejected_before_git() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, &["1.0.0"]);
        let artifacts = MockArtifactServer::new().with_cookbook("apache2", ["1.0.0"]);
        let git = RecordingGit::new();
        let quick = DeployOptions {
            mode: DeployMode::Quick,
            ..options(&dir, Some("v1.1"))
        };

        let err = deploy(&engine, &artifacts, &git, &orgs(), &quick, |_, _| true)
            .await
            .unwrap_err();

        assert!(matches!(err, CookforgeError::Version(_)));
        assert!(git.calls().is_empty());
        assert!(!dir.path().join("work").join("apache2").exists());
    }

    #[tokio::test]
    async fn test_existing_tag_is_checked_out() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, &["1.0.0", "1.1.0"]);
        let artifacts = MockArtifactServer::new().with_cookbook("apache2", ["1.0.0"]);
        let git = RecordingGit::new();

        let report = deploy(&engine, &artifacts, &git, &orgs(), &options(&dir, None), |_, _| false)
            .await
            .unwrap();

        assert_eq!(report.decision.version, "1.1.0");
        assert_eq!(report.decision.tag_action, TagAction::CheckoutExisting);
        assert_eq!(
            git.calls()[1],
            GitCall::CheckoutNewBranch {
                branch: "deploy-1.1.0".into(),
                start_point: "1.1.0".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_decline_leaves_git_untouched() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, &["1.0.0"]);
        let artifacts = MockArtifactServer::new().with_cookbook("apache2", ["1.0.0"]);
        let git = RecordingGit::new();

        let err = deploy(&engine, &artifacts, &git, &orgs(), &options(&dir, Some("1.0.0")), |_, _| false)
            .await
            .unwrap_err();

        assert!(matches!(err, CookforgeError::DeployDeclined { .. }));
        assert!(git.calls().is_empty());
    }

    #[tokio::test]
    async fn test_frozen_version_refused() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, &["1.0.0"]);
        let artifacts = MockArtifactServer::new()
            .with_cookbook("apache2", ["1.0.0"])
            .with_frozen("apache2", "1.0.0");
        let git = RecordingGit::new();
        let opts = DeployOptions {
            mode: DeployMode::Quick,
            ..options(&dir, Some("1.0.0"))
        };

        let err = deploy(&engine, &artifacts, &git, &orgs(), &opts, |_, _| true)
            .await
            .unwrap_err();
        assert!(matches!(err, CookforgeError::FrozenVersion { .. }));
        assert!(git.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_repository_and_version() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, &[]);
        let artifacts = MockArtifactServer::new();
        let git = RecordingGit::new();

        let opts = DeployOptions {
            cookbook: "nope".into(),
            ..options(&dir, Some("1.0.0"))
        };
        let err = deploy(&engine, &artifacts, &git, &orgs(), &opts, |_, _| true)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot find repository: nope");

        let err = deploy(&engine, &artifacts, &git, &orgs(), &options(&dir, None), |_, _| true)
            .await
            .unwrap_err();
        assert!(matches!(err, CookforgeError::NoVersion(_)));
    }
}

//! Working-directory git operations
//!
//! `RepoOps` is what the deploy and clone commands need from version
//! control. `GitCli` runs the `git` binary with argument vectors;
//! `RecordingGit` records calls instead and is used by tests.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone, Error)]
pub enum GitError {
    #[error("Failed to run git {args}: {message}")]
    Spawn { args: String, message: String },

    #[error("git {args} exited with {code}: {stderr}")]
    Failed {
        args: String,
        code: String,
        stderr: String,
    },
}

pub type GitResult<T> = std::result::Result<T, GitError>;

/// Hide `user:password@` in URLs before they reach logs or errors
pub fn redact_url(arg: &str) -> String {
    if let Some((scheme, rest)) = arg.split_once("://") {
        let authority_end = rest.find('/').unwrap_or(rest.len());
        if let Some(at) = rest[..authority_end].rfind('@') {
            return format!("{scheme}://***@{}", &rest[at + 1..]);
        }
    }
    arg.to_string()
}

fn display_args(args: &[&str]) -> String {
    args.iter().map(|a| redact_url(a)).collect::<Vec<_>>().join(" ")
}

/// Version-control operations on a working directory
#[async_trait]
pub trait RepoOps: Send + Sync {
    /// `git clone -- <url> <dest>`
    async fn clone_repo(&self, url: &str, dest: &Path) -> GitResult<()>;

    /// `git checkout -b <branch> <start_point>`
    async fn checkout_new_branch(&self, dir: &Path, branch: &str, start_point: &str) -> GitResult<()>;

    /// `git commit -a -m <message>`
    async fn commit_all(&self, dir: &Path, message: &str) -> GitResult<()>;

    /// `git tag -a <tag> -m <message>`
    async fn tag_annotated(&self, dir: &Path, tag: &str, message: &str) -> GitResult<()>;

    /// `git push <remote> <refspec>`
    async fn push(&self, dir: &Path, remote: &str, refspec: &str) -> GitResult<()>;

    /// `git push --tags <remote>`
    async fn push_tags(&self, dir: &Path, remote: &str) -> GitResult<()>;
}

/// Runs the `git` executable
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl GitCli {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }

    /// Use a specific git binary
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, dir: Option<&Path>, args: &[&str]) -> GitResult<()> {
        let shown = display_args(args);
        debug!(args = %shown, dir = ?dir, "git");

        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }

        let output = cmd.output().await.map_err(|e| GitError::Spawn {
            args: shown.clone(),
            message: e.to_string(),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitError::Failed {
                args: shown,
                code: output
                    .status
                    .code()
                    .map_or_else(|| "signal".to_string(), |c| c.to_string()),
                stderr: redact_url(stderr.trim()),
            });
        }
        Ok(())
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RepoOps for GitCli {
    async fn clone_repo(&self, url: &str, dest: &Path) -> GitResult<()> {
        let dest = dest.to_string_lossy().into_owned();
        self.run(None, &["clone", "--", url, dest.as_str()]).await
    }

    async fn checkout_new_branch(&self, dir: &Path, branch: &str, start_point: &str) -> GitResult<()> {
        self.run(Some(dir), &["checkout", "-b", branch, start_point]).await
    }

    async fn commit_all(&self, dir: &Path, message: &str) -> GitResult<()> {
        self.run(Some(dir), &["commit", "-a", "-m", message]).await
    }

    async fn tag_annotated(&self, dir: &Path, tag: &str, message: &str) -> GitResult<()> {
        self.run(Some(dir), &["tag", "-a", tag, "-m", message]).await
    }

    async fn push(&self, dir: &Path, remote: &str, refspec: &str) -> GitResult<()> {
        self.run(Some(dir), &["push", remote, refspec]).await
    }

    async fn push_tags(&self, dir: &Path, remote: &str) -> GitResult<()> {
        self.run(Some(dir), &["push", "--tags", remote]).await
    }
}

/// A call recorded by `RecordingGit`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitCall {
    Clone { url: String, dest: PathBuf },
    CheckoutNewBranch { branch: String, start_point: String },
    CommitAll { message: String },
    TagAnnotated { tag: String },
    Push { remote: String, refspec: String },
    PushTags { remote: String },
}

/// Records operations instead of running git.
///
/// `clone_repo` creates the destination directory and writes the seeded files
/// into it, so code that reads the working copy afterwards has something to
/// read.
#[derive(Debug, Default)]
pub struct RecordingGit {
    calls: Mutex<Vec<GitCall>>,
    seed_files: Vec<(String, String)>,
    fail_clone: bool,
}

impl RecordingGit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, name: &str, contents: &str) -> Self {
        self.seed_files.push((name.to_string(), contents.to_string()));
        self
    }

    pub fn failing_clone(mut self) -> Self {
        self.fail_clone = true;
        self
    }

    pub fn calls(&self) -> Vec<GitCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record(&self, call: GitCall) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(call);
    }
}

#[async_trait]
impl RepoOps for RecordingGit {
    async fn clone_repo(&self, url: &str, dest: &Path) -> GitResult<()> {
        self.record(GitCall::Clone {
            url: url.to_string(),
            dest: dest.to_path_buf(),
        });
        if self.fail_clone {
            return Err(GitError::Failed {
                args: format!("clone -- {} {}", redact_url(url), dest.display()),
                code: "128".into(),
                stderr: "repository not found".into(),
            });
        }
        let io_err = |e: std::io::Error| GitError::Spawn {
            args: "clone".into(),
            message: e.to_string(),
        };
        tokio::fs::create_dir_all(dest).await.map_err(io_err)?;
        for (name, contents) in &self.seed_files {
            tokio::fs::write(dest.join(name), contents).await.map_err(io_err)?;
        }
        Ok(())
    }

    async fn checkout_new_branch(&self, _dir: &Path, branch: &str, start_point: &str) -> GitResult<()> {
        self.record(GitCall::CheckoutNewBranch {
            branch: branch.to_string(),
            start_point: start_point.to_string(),
        });
        Ok(())
    }

    async fn commit_all(&self, _dir: &Path, message: &str) -> GitResult<()> {
        self.record(GitCall::CommitAll {
            message: message.to_string(),
        });
        Ok(())
    }

    async fn tag_annotated(&self, _dir: &Path, tag: &str, _message: &str) -> GitResult<()> {
        self.record(GitCall::TagAnnotated { tag: tag.to_string() });
        Ok(())
    }

    async fn push(&self, _dir: &Path, remote: &str, refspec: &str) -> GitResult<()> {
        self.record(GitCall::Push {
            remote: remote.to_string(),
            refspec: refspec.to_string(),
        });
        Ok(())
    }

    async fn push_tags(&self, _dir: &Path, remote: &str) -> GitResult<()> {
        self.record(GitCall::PushTags {
            remote: remote.to_string(),
        });
        Ok(())
    }
}

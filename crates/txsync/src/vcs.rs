//! Version-control queries used by branch selection and git timestamps.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("Failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("git {command} failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("Unexpected git output: {0}")]
    Parse(String),
}

/// The two questions the engine asks a version-control system.
#[async_trait]
pub trait Vcs: Send + Sync {
    async fn current_branch_name(&self) -> Result<String, VcsError>;

    /// Time of the last commit touching `path`; `None` if it was never committed.
    async fn last_commit_time(&self, path: &Path) -> Result<Option<DateTime<Utc>>, VcsError>;
}

/// `git` on the `PATH`, run in a working directory.
#[derive(Debug, Clone)]
pub struct GitVcs {
    workdir: PathBuf,
}

impl GitVcs {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    async fn git(&self, args: &[&str]) -> Result<String, VcsError> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .await?;
        if !output.status.success() {
            return Err(VcsError::Command {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl Vcs for GitVcs {
    async fn current_branch_name(&self) -> Result<String, VcsError> {
        let branch = self.git(&["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        if branch.is_empty() || branch == "HEAD" {
            return Err(VcsError::Parse("not on a branch".to_string()));
        }
        Ok(branch)
    }

    async fn last_commit_time(&self, path: &Path) -> Result<Option<DateTime<Utc>>, VcsError> {
        let path = path.to_string_lossy();
        let stamp = self
            .git(&["log", "-1", "--format=%cI", "--", path.as_ref()])
            .await?;
        parse_commit_time(&stamp)
    }
}

fn parse_commit_time(stamp: &str) -> Result<Option<DateTime<Utc>>, VcsError> {
    if stamp.is_empty() {
        return Ok(None);
    }
    DateTime::parse_from_rfc3339(stamp)
        .map(|t| Some(t.with_timezone(&Utc)))
        .map_err(|_| VcsError::Parse(stamp.to_string()))
}

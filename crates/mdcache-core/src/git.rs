//! Git integration for the deploy trigger.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{Error, Result};

/// Captured output of one git command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// The command line as run, e.g. `git pull`.
    pub command: String,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// `$ command`, stdout and stderr, in that order.
    pub fn transcript(&self) -> String {
        let mut out = format!("$ {}\n", self.command);
        out.push_str(&self.stdout);
        if !self.stdout.is_empty() && !self.stdout.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&self.stderr);
        if !self.stderr.is_empty() && !self.stderr.ends_with('\n') {
            out.push('\n');
        }
        out
    }
}

/// The working tree a deploy updates.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Currently checked-out commit id.
    async fn head_commit(&self) -> Result<String>;

    /// Discard local changes to tracked files.
    async fn hard_reset(&self) -> Result<CommandOutput>;

    /// Fetch and merge the upstream branch.
    async fn pull(&self) -> Result<CommandOutput>;
}

/// [`Repository`] backed by the `git` binary.
#[derive(Debug, Clone)]
pub struct GitRepository {
    dir: PathBuf,
}

impl GitRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn run(&self, args: &[&str]) -> Result<CommandOutput> {
        let command = format!("git {}", args.join(" "));
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::DeployFailure(format!("failed to run git: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            return Err(Error::DeployFailure(format!(
                "{command} failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(CommandOutput {
            command,
            stdout,
            stderr,
        })
    }
}

#[async_trait]
impl Repository for GitRepository {
    async fn head_commit(&self) -> Result<String> {
        let output = self.run(&["rev-parse", "HEAD"]).await?;
        let sha = output.stdout.trim().to_string();
        if sha.is_empty() {
            return Err(Error::DeployFailure(
                "git rev-parse HEAD returned empty output".to_string(),
            ));
        }
        Ok(sha)
    }

    async fn hard_reset(&self) -> Result<CommandOutput> {
        self.run(&["reset", "--hard"]).await
    }

    async fn pull(&self) -> Result<CommandOutput> {
        self.run(&["pull"]).await
    }
}

/// Check whether a directory is inside a git work tree.
pub async fn is_git_repo(dir: &Path) -> bool {
    Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(dir)
        .stdin(Stdio::null())
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}

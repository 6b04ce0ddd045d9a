//! In-memory test doubles.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::git::{CommandOutput, Repository};

/// One call made against a [`RecordingRepository`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitCall {
    HeadCommit,
    HardReset,
    Pull,
}

#[derive(Debug)]
struct State {
    head: String,
    calls: Vec<GitCall>,
}

/// [`Repository`] that records calls instead of running git.
///
/// `pull` moves HEAD to the commit configured with [`pulls_to`](Self::pulls_to).
#[derive(Debug)]
pub struct RecordingRepository {
    state: Mutex<State>,
    pull_target: Option<String>,
    pull_error: Option<String>,
}

impl RecordingRepository {
    pub fn new(head: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(State {
                head: head.into(),
                calls: Vec::new(),
            }),
            pull_target: None,
            pull_error: None,
        }
    }

    pub fn pulls_to(mut self, commit: impl Into<String>) -> Self {
        self.pull_target = Some(commit.into());
        self
    }

    pub fn failing_pull(mut self, message: impl Into<String>) -> Self {
        self.pull_error = Some(message.into());
        self
    }

    pub fn calls(&self) -> Vec<GitCall> {
        self.lock().calls.clone()
    }

    pub fn head(&self) -> String {
        self.lock().head.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Repository for RecordingRepository {
    async fn head_commit(&self) -> Result<String> {
        let mut state = self.lock();
        state.calls.push(GitCall::HeadCommit);
        Ok(state.head.clone())
    }

    async fn hard_reset(&self) -> Result<CommandOutput> {
        self.lock().calls.push(GitCall::HardReset);
        Ok(CommandOutput {
            command: "git reset --hard".to_string(),
            stdout: "HEAD is now at fake\n".to_string(),
            stderr: String::new(),
        })
    }

    async fn pull(&self) -> Result<CommandOutput> {
        let mut state = self.lock();
        state.calls.push(GitCall::Pull);
        if let Some(message) = &self.pull_error {
            return Err(Error::DeployFailure(format!("git pull failed: {message}")));
        }
        if let Some(target) = &self.pull_target {
            state.head = target.clone();
        }
        Ok(CommandOutput {
            command: "git pull".to_string(),
            stdout: "Fast-forward\n".to_string(),
            stderr: String::new(),
        })
    }
}

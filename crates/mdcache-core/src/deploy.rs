//! Webhook-triggered redeploys.
//!
//! A verified push event for the tracked ref resets and pulls the working
//! tree unless HEAD already points at the pushed commit. Restarting is left
//! to the caller via [`DeployOutcome::restart_required`].

use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::DeployConfig;
use crate::error::Result;
use crate::git::{GitRepository, Repository};
use crate::metrics::METRICS;
use crate::obs::{emit_deploy_failed, emit_deploy_finished, emit_deploy_skipped};
use crate::webhook::VerifiedPayload;

/// The parts of a GitHub push event the trigger looks at.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PushEvent {
    #[serde(rename = "ref")]
    pub git_ref: String,

    /// Absent (`null`) when the push deleted the branch.
    #[serde(default)]
    pub head_commit: Option<HeadCommit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HeadCommit {
    pub id: String,
}

/// What the trigger did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    /// Not the tracked ref, or nothing to check out.
    Skipped { reason: String },
    /// HEAD already equals the pushed commit.
    UpToDate { commit: String },
    /// Reset and pull ran; `output` is their combined transcript.
    Deployed { commit: String, output: String },
}

impl DeployOutcome {
    pub fn restart_required(&self) -> bool {
        matches!(self, DeployOutcome::Deployed { .. })
    }

    /// Human-readable report for the webhook response body.
    pub fn message(&self) -> String {
        match self {
            DeployOutcome::Skipped { reason } => format!("skipped: {reason}\n"),
            DeployOutcome::UpToDate { commit } => {
                format!("skipped: already at {commit}\n")
            }
            DeployOutcome::Deployed { commit, output } => {
                format!("deployed {commit}\n{output}")
            }
        }
    }
}

/// Decides on and performs redeploys.
pub struct DeployTrigger {
    repo: Arc<dyn Repository>,
    tracked_ref: String,
    // Serialises deploys so a duplicate delivery sees the updated HEAD.
    in_flight: Mutex<()>,
}

impl std::fmt::Debug for DeployTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployTrigger")
            .field("tracked_ref", &self.tracked_ref)
            .finish_non_exhaustive()
    }
}

impl DeployTrigger {
    pub fn new(repo: Arc<dyn Repository>, tracked_ref: impl Into<String>) -> Self {
        Self {
            repo,
            tracked_ref: tracked_ref.into(),
            in_flight: Mutex::new(()),
        }
    }

    /// Trigger operating on a git working tree.
    pub fn from_config(config: &DeployConfig) -> Self {
        Self::new(
            Arc::new(GitRepository::new(&config.repo_dir)),
            config.tracked_ref.clone(),
        )
    }

    pub fn tracked_ref(&self) -> &str {
        &self.tracked_ref
    }

    /// Parse a verified payload as a push event and handle it.
    pub async fn handle(&self, payload: &VerifiedPayload) -> Result<DeployOutcome> {
        let event: PushEvent = payload.parse()?;
        self.handle_event(&event).await
    }

    /// Run the deploy decision for `event`.
    ///
    /// Git failures surface as [`Error::DeployFailure`](crate::Error::DeployFailure).
    pub async fn handle_event(&self, event: &PushEvent) -> Result<DeployOutcome> {
        if event.git_ref != self.tracked_ref {
            let reason = format!(
                "push to {} does not affect {}",
                event.git_ref, self.tracked_ref
            );
            emit_deploy_skipped(&event.git_ref, &reason);
            return Ok(DeployOutcome::Skipped { reason });
        }

        let Some(head_commit) = &event.head_commit else {
            let reason = format!("push to {} has no head commit", event.git_ref);
            emit_deploy_skipped(&event.git_ref, &reason);
            return Ok(DeployOutcome::Skipped { reason });
        };
        let target = head_commit.id.clone();

        let _guard = self.in_flight.lock().await;

        let current = self.repo.head_commit().await?;
        if current == target {
            emit_deploy_skipped(&event.git_ref, "already at pushed commit");
            return Ok(DeployOutcome::UpToDate { commit: target });
        }

        let started = Instant::now();
        match self.reset_and_pull().await {
            Ok(output) => {
                METRICS.inc_deploys();
                emit_deploy_finished(&target, started.elapsed().as_millis() as u64);
                Ok(DeployOutcome::Deployed {
                    commit: target,
                    output,
                })
            }
            Err(e) => {
                emit_deploy_failed(&target, &e);
                Err(e)
            }
        }
    }

    async fn reset_and_pull(&self) -> Result<String> {
        let reset = self.repo.hard_reset().await?;
        let pull = self.repo.pull().await?;
        Ok(format!("{}{}", reset.transcript(), pull.transcript()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::fakes::{GitCall, RecordingRepository};

    fn push(git_ref: &str, id: Option<&str>) -> PushEvent {
        PushEvent {
            git_ref: git_ref.to_string(),
            head_commit: id.map(|id| HeadCommit { id: id.to_string() }),
        }
    }

    #[tokio::test]
    async fn other_ref_is_skipped_without_git() {
        let repo = Arc::new(RecordingRepository::new("aaa"));
        let trigger = DeployTrigger::new(repo.clone(), "refs/heads/master");

        let outcome = trigger
            .handle_event(&push("refs/heads/feature", Some("bbb")))
            .await
            .unwrap();

        assert!(matches!(outcome, DeployOutcome::Skipped { .. }));
        assert!(!outcome.restart_required());
        assert!(repo.calls().is_empty());
    }

    #[tokio::test]
    async fn branch_deletion_is_skipped() {
        let repo = Arc::new(RecordingRepository::new("aaa"));
        let trigger = DeployTrigger::new(repo.clone(), "refs/heads/master");

        let outcome = trigger
            .handle_event(&push("refs/heads/master", None))
            .await
            .unwrap();
        assert!(matches!(outcome, DeployOutcome::Skipped { .. }));
        assert!(repo.calls().is_empty());
    }

    #[tokio::test]
    async fn same_head_is_up_to_date() {
        let repo = Arc::new(RecordingRepository::new("aaa"));
        let trigger = DeployTrigger::new(repo.clone(), "refs/heads/master");

        let outcome = trigger
            .handle_event(&push("refs/heads/master", Some("aaa")))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DeployOutcome::UpToDate {
                commit: "aaa".to_string()
            }
        );
        assert_eq!(repo.calls(), vec![GitCall::HeadCommit]);
    }

    #[tokio::test]
    async fn new_head_resets_then_pulls() {
        let repo = Arc::new(RecordingRepository::new("aaa").pulls_to("bbb"));
        let trigger = DeployTrigger::new(repo.clone(), "refs/heads/master");

        let outcome = trigger
            .handle_event(&push("refs/heads/master", Some("bbb")))
            .await
            .unwrap();

        assert!(outcome.restart_required());
        assert!(outcome.message().starts_with("deployed bbb\n"));
        assert!(outcome.message().contains("$ git reset --hard"));
        assert!(outcome.message().contains("$ git pull"));
        assert_eq!(
            repo.calls(),
            vec![GitCall::HeadCommit, GitCall::HardReset, GitCall::Pull]
        );
        assert_eq!(repo.head(), "bbb");
    }

    #[tokio::test]
    async fn duplicate_delivery_deploys_once() {
        let repo = Arc::new(RecordingRepository::new("aaa").pulls_to("bbb"));
        let trigger = DeployTrigger::new(repo.clone(), "refs/heads/master");
        let event = push("refs/heads/master", Some("bbb"));

        let first = trigger.handle_event(&event).await.unwrap();
        let second = trigger.handle_event(&event).await.unwrap();

        assert!(first.restart_required());
        assert!(matches!(second, DeployOutcome::UpToDate { .. }));
        let pulls = repo.calls().iter().filter(|c| **c == GitCall::Pull).count();
        assert_eq!(pulls, 1);
    }

    #[tokio::test]
    async fn pull_failure_is_deploy_failure() {
        let repo = Arc::new(RecordingRepository::new("aaa").failing_pull("merge conflict"));
        let trigger = DeployTrigger::new(repo.clone(), "refs/heads/master");

        let err = trigger
            .handle_event(&push("refs/heads/master", Some("bbb")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DeployFailure(ref m) if m.contains("merge conflict")));
    }

    #[tokio::test]
    async fn handle_parses_verified_payload() {
        let body = br#"{"ref":"refs/heads/gh-pages","head_commit":{"id":"ccc","message":"x"}}"#;
        let sigs = crate::webhook::sign(b"s3cret", body).unwrap();
        let payload =
            crate::webhook::verify(body, Some(&sigs.sha1), Some(&sigs.sha256), b"s3cret").unwrap();

        let repo = Arc::new(RecordingRepository::new("aaa"));
        let trigger = DeployTrigger::new(repo.clone(), "refs/heads/master");
        let outcome = trigger.handle(&payload).await.unwrap();
        assert!(matches!(outcome, DeployOutcome::Skipped { ref reason } if reason.contains("gh-pages")));
    }

    #[tokio::test]
    async fn handle_rejects_malformed_json() {
        let body = b"not json";
        let sigs = crate::webhook::sign(b"k", body).unwrap();
        let payload = crate::webhook::verify(body, Some(&sigs.sha1), Some(&sigs.sha256), b"k").unwrap();

        let trigger = DeployTrigger::new(Arc::new(RecordingRepository::new("aaa")), "refs/heads/master");
        assert!(matches!(trigger.handle(&payload).await, Err(Error::Payload(_))));
    }
}

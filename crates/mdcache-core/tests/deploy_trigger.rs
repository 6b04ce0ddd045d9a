//! Webhook deploys against real git working trees.

use std::path::Path;
use std::process::Command;

use mdcache_core::webhook::{sign, SIGNATURE_SHA1_HEADER};
use mdcache_core::{
    DeployConfig, DeployOutcome, DeployTrigger, Error, GitRepository, Repository, WebhookGate,
};

const SECRET: &str = "hook-secret";

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git").args(args).current_dir(dir).output().unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn configure(dir: &Path) {
    git(dir, &["config", "user.name", "test-user"]);
    git(dir, &["config", "user.email", "test@example.com"]);
}

/// An origin repository and a clone of it acting as the deployed site.
struct Deployment {
    origin: tempfile::TempDir,
    _parent: tempfile::TempDir,
    site: std::path::PathBuf,
}

impl Deployment {
    fn new() -> Self {
        let origin = tempfile::tempdir().unwrap();
        git(origin.path(), &["init"]);
        configure(origin.path());
        std::fs::write(origin.path().join("index.md"), "# Home\n").unwrap();
        git(origin.path(), &["add", "."]);
        git(origin.path(), &["commit", "-m", "initial"]);

        let parent = tempfile::tempdir().unwrap();
        git(
            parent.path(),
            &["clone", origin.path().to_str().unwrap(), "site"],
        );
        let site = parent.path().join("site");
        configure(&site);

        Self {
            origin,
            _parent: parent,
            site,
        }
    }

    fn branch_ref(&self) -> String {
        format!("refs/heads/{}", git(self.origin.path(), &["rev-parse", "--abbrev-ref", "HEAD"]))
    }

    fn push_commit(&self, file: &str, contents: &str) -> String {
        std::fs::write(self.origin.path().join(file), contents).unwrap();
        git(self.origin.path(), &["add", "."]);
        git(self.origin.path(), &["commit", "-m", file]);
        git(self.origin.path(), &["rev-parse", "HEAD"])
    }

    fn trigger(&self) -> DeployTrigger {
        DeployTrigger::from_config(&DeployConfig {
            repo_dir: self.site.clone(),
            tracked_ref: self.branch_ref(),
        })
    }
}

fn payload(git_ref: &str, commit: &str) -> Vec<u8> {
    serde_json::json!({
        "ref": git_ref,
        "head_commit": { "id": commit, "message": "update" },
        "repository": { "full_name": "example/site" },
    })
    .to_string()
    .into_bytes()
}

#[tokio::test]
async fn signed_push_pulls_new_commit() {
    let deployment = Deployment::new();
    let commit = deployment.push_commit("about.md", "# About\n");
    let body = payload(&deployment.branch_ref(), &commit);
    let sigs = sign(SECRET.as_bytes(), &body).unwrap();

    let gate = WebhookGate::new(SECRET);
    let verified = gate
        .verify(&body, Some(&sigs.sha1), Some(&sigs.sha256))
        .unwrap();
    let outcome = deployment.trigger().handle(&verified).await.unwrap();

    assert!(outcome.restart_required());
    assert!(matches!(outcome, DeployOutcome::Deployed { commit: ref c, .. } if *c == commit));
    assert!(deployment.site.join("about.md").exists());
    let head = GitRepository::new(&deployment.site).head_commit().await.unwrap();
    assert_eq!(head, commit);
}

#[tokio::test]
async fn redelivery_is_up_to_date() {
    let deployment = Deployment::new();
    let commit = deployment.push_commit("about.md", "# About\n");
    let trigger = deployment.trigger();
    let body = payload(&deployment.branch_ref(), &commit);
    let sigs = sign(SECRET.as_bytes(), &body).unwrap();
    let gate = WebhookGate::new(SECRET);

    for expect_deploy in [true, false] {
        let verified = gate
            .verify(&body, Some(&sigs.sha1), Some(&sigs.sha256))
            .unwrap();
        let outcome = trigger.handle(&verified).await.unwrap();
        assert_eq!(outcome.restart_required(), expect_deploy, "{outcome:?}");
    }
}

#[tokio::test]
async fn local_edits_are_discarded_on_deploy() {
    let deployment = Deployment::new();
    std::fs::write(deployment.site.join("index.md"), "# Edited in place\n").unwrap();
    let commit = deployment.push_commit("about.md", "# About\n");

    let event = serde_json::from_slice(&payload(&deployment.branch_ref(), &commit)).unwrap();
    deployment.trigger().handle_event(&event).await.unwrap();

    assert_eq!(
        std::fs::read_to_string(deployment.site.join("index.md")).unwrap(),
        "# Home\n"
    );
}

#[tokio::test]
async fn tampered_body_never_reaches_git() {
    let deployment = Deployment::new();
    let commit = deployment.push_commit("about.md", "# About\n");
    let body = payload(&deployment.branch_ref(), &commit);
    let sigs = sign(SECRET.as_bytes(), &body).unwrap();

    let mut tampered = body.clone();
    tampered[2] ^= 0x20;
    let err = WebhookGate::new(SECRET)
        .verify(&tampered, Some(&sigs.sha1), Some(&sigs.sha256))
        .unwrap_err();

    assert!(matches!(err, Error::Rejected(ref m) if m.contains(SIGNATURE_SHA1_HEADER)));
    assert!(!deployment.site.join("about.md").exists());
}

#[tokio::test]
async fn missing_work_tree_is_deploy_failure() {
    let dir = tempfile::tempdir().unwrap();
    let trigger = DeployTrigger::from_config(&DeployConfig {
        repo_dir: dir.path().to_path_buf(),
        tracked_ref: "refs/heads/master".to_string(),
    });
    let event =
        serde_json::from_slice(&payload("refs/heads/master", "0123456789abcdef")).unwrap();
    let err = trigger.handle_event(&event).await.unwrap_err();
    assert!(matches!(err, Error::DeployFailure(_)), "{err:?}");
}

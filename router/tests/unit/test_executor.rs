//! Deployment executor, rollback and deployer tests

mod fakes;

use std::sync::Mutex;
use std::time::Duration;

use hookrouter::deploy::adapters::ServiceSupervisor;
use hookrouter::deploy::fsm::{DeploymentEvent, DeploymentState};
use hookrouter::deploy::rollback::RollbackController;
use hookrouter::models::deployment::{DeploymentOutcome, DeploymentRequest, ServiceHealth};
use hookrouter::notify::{Notifier, Severity};
use hookrouter::workers::deployer::Deployer;

use fakes::{project, FakeBuild, FakeVcs, Harness};

fn request(project: &str, hash: &str) -> DeploymentRequest {
    DeploymentRequest::new(project, "main", hash, "fix bug")
}

fn event_name(event: &DeploymentEvent) -> &'static str {
    match event {
        DeploymentEvent::Enqueue => "enqueue",
        DeploymentEvent::Start { .. } => "start",
        DeploymentEvent::BuildPassed => "build_passed",
        DeploymentEvent::Healthy => "healthy",
        DeploymentEvent::Failed(_) => "failed",
        DeploymentEvent::RollbackFinished { restored: true } => "restored",
        DeploymentEvent::RollbackFinished { restored: false } => "not_restored",
        DeploymentEvent::Abort(_) => "abort",
    }
}

/// Run one deployment and return its outcome and progress events
async fn execute(harness: &Harness, hash: &str) -> (DeploymentOutcome, Vec<&'static str>) {
    let events = Mutex::new(Vec::new());
    let progress = |event: DeploymentEvent| events.lock().unwrap().push(event_name(&event));
    let outcome = harness
        .executor
        .execute(&project("site-a"), &request("site-a", hash), &progress)
        .await;
    (outcome, events.into_inner().unwrap())
}

// ================================== EXECUTOR ===================================== //

#[tokio::test]
async fn test_successful_deployment() {
    let vcs = FakeVcs::new("old00000", "new00000");
    let harness = Harness::new(vcs, FakeBuild::passing());

    let (outcome, events) = execute(&harness, "new00000").await;

    assert_eq!(outcome, DeploymentOutcome::Success);
    assert_eq!(events, vec!["start", "build_passed", "healthy"]);
    assert_eq!(harness.vcs.head(), "new00000");
    assert_eq!(harness.vcs.fetches(), 1);
    assert_eq!(harness.vcs.resets(), vec!["origin/main"]);
    assert_eq!(harness.supervisor.restarts(), vec!["gunicorn-site-a.service"]);
    assert_eq!(
        harness.markers.read("site-a").await.unwrap().as_deref(),
        Some("old00000")
    );
    assert_eq!(
        harness.sink.messages(),
        vec![
            (Severity::Info, "site-a: Deployment started".to_string()),
            (Severity::Success, "site-a: Deployment successful!".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_build_failure_rolls_back() {
    let vcs = FakeVcs::new("old00000", "bad00000");
    let harness = Harness::new(vcs, FakeBuild::scripted(&[1]));

    let (outcome, events) = execute(&harness, "bad00000").await;

    match outcome {
        DeploymentOutcome::BuildFailed { exit_code, output } => {
            assert_eq!(exit_code, Some(1));
            assert!(output.contains("exit 1"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(events, vec!["start", "failed", "restored"]);
    assert_eq!(harness.vcs.head(), "old00000");
    assert_eq!(harness.vcs.resets(), vec!["origin/main", "old00000"]);
    // Only the rollback restarts the service
    assert_eq!(harness.supervisor.restarts(), vec!["gunicorn-site-a.service"]);
    assert_eq!(
        harness.sink.severities(),
        vec![Severity::Info, Severity::Warning, Severity::Error]
    );
}

#[tokio::test]
async fn test_unhealthy_service_rolls_back() {
    let vcs = FakeVcs::new("old00000", "new00000");
    let harness = Harness::new(vcs, FakeBuild::passing());
    harness.supervisor.script(&["failed"]);

    let (outcome, events) = execute(&harness, "new00000").await;

    assert_eq!(
        outcome,
        DeploymentOutcome::ServiceUnhealthy(ServiceHealth::Inactive)
    );
    assert_eq!(events, vec!["start", "build_passed", "failed", "restored"]);
    assert_eq!(harness.vcs.head(), "old00000");
    assert_eq!(harness.supervisor.restarts().len(), 2);
    assert!(harness
        .sink
        .messages()
        .contains(&(Severity::Warning, "site-a: Rolled back due to deployment failure".to_string())));
}

#[tokio::test]
async fn test_build_timeout_rolls_back() {
    let vcs = FakeVcs::new("old00000", "new00000");
    let harness = Harness::with_timeout(
        vcs,
        FakeBuild::slow(Duration::from_secs(5)),
        Duration::from_millis(50),
    );

    let (outcome, events) = execute(&harness, "new00000").await;

    assert_eq!(outcome, DeploymentOutcome::TimedOut);
    assert_eq!(events, vec!["start", "failed", "restored"]);
    assert_eq!(harness.vcs.head(), "old00000");
    // The service was never restarted onto the new revision
    assert_eq!(harness.supervisor.restarts(), vec!["gunicorn-site-a.service"]);
}

#[tokio::test]
async fn test_snapshot_failure_skips_rollback() {
    let vcs = FakeVcs::new("old00000", "new00000");
    vcs.fail_current_revision();
    let harness = Harness::new(vcs, FakeBuild::passing());

    let (outcome, events) = execute(&harness, "new00000").await;

    assert!(matches!(outcome, DeploymentOutcome::Error(_)));
    assert_eq!(events, vec!["start", "abort"]);
    assert_eq!(harness.build.calls(), 0);
    assert!(harness.vcs.resets().is_empty());
    assert!(harness.supervisor.restarts().is_empty());
    assert_eq!(
        harness.sink.severities(),
        vec![Severity::Info, Severity::Error]
    );
}

#[tokio::test]
async fn test_restart_failure_rolls_back() {
    let vcs = FakeVcs::new("old00000", "new00000");
    let harness = Harness::new(vcs, FakeBuild::passing());
    harness.supervisor.fail_restarts(1);

    let (outcome, events) = execute(&harness, "new00000").await;

    assert!(matches!(outcome, DeploymentOutcome::Error(_)));
    assert_eq!(events, vec!["start", "build_passed", "failed", "restored"]);
    assert_eq!(harness.vcs.head(), "old00000");
    assert_eq!(harness.vcs.resets(), vec!["origin/main", "old00000"]);
    // The failed restart, then the rollback's restart
    assert_eq!(harness.supervisor.restarts().len(), 2);
}

#[tokio::test]
async fn test_panicking_build_rolls_back() {
    let vcs = FakeVcs::new("old00000", "new00000");
    let harness = Harness::new(vcs, FakeBuild::panicking());

    let (outcome, events) = execute(&harness, "new00000").await;

    match outcome {
        DeploymentOutcome::Error(reason) => assert!(reason.contains("build step crashed")),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(events, vec!["start", "failed", "restored"]);
    assert_eq!(harness.vcs.head(), "old00000");
    assert_eq!(harness.vcs.resets(), vec!["origin/main", "old00000"]);
    assert_eq!(harness.supervisor.restarts(), vec!["gunicorn-site-a.service"]);
}

/// Known gap: rollback only checks that the revert and restart commands ran.
/// A previous revision that is itself broken still counts as rolled back.
#[tokio::test]
async fn test_rollback_does_not_verify_service_health() {
    let vcs = FakeVcs::new("old00000", "new00000");
    let harness = Harness::new(vcs, FakeBuild::passing());
    harness.supervisor.script(&["failed", "failed"]);

    let (outcome, events) = execute(&harness, "new00000").await;

    assert!(!outcome.is_success());
    assert_eq!(events.last(), Some(&"restored"));
    assert!(harness
        .sink
        .messages()
        .contains(&(Severity::Warning, "site-a: Rolled back due to deployment failure".to_string())));

    // The service is still down after the "completed" rollback
    assert_eq!(
        harness.supervisor.health("gunicorn-site-a.service").await,
        ServiceHealth::Inactive
    );
}

/// The marker holds the revision from before the most recent attempt, so two
/// failed pushes in a row both return to the last deployed revision.
#[tokio::test]
async fn test_consecutive_failures_roll_back_to_last_good_revision() {
    let vcs = FakeVcs::new("rev-a000", "rev-b000");
    let harness = Harness::new(vcs, FakeBuild::scripted(&[0, 1, 1]));

    let (outcome, _) = execute(&harness, "rev-b000").await;
    assert_eq!(outcome, DeploymentOutcome::Success);
    assert_eq!(harness.vcs.head(), "rev-b000");

    harness.vcs.push("rev-c000");
    let (outcome, _) = execute(&harness, "rev-c000").await;
    assert!(!outcome.is_success());
    assert_eq!(harness.vcs.head(), "rev-b000");

    harness.vcs.push("rev-d000");
    let (outcome, _) = execute(&harness, "rev-d000").await;
    assert!(!outcome.is_success());
    assert_eq!(harness.vcs.head(), "rev-b000");
    assert_eq!(
        harness.markers.read("site-a").await.unwrap().as_deref(),
        Some("rev-b000")
    );
}

// ================================== ROLLBACK ===================================== //

fn rollback_controller(harness: &Harness) -> RollbackController {
    RollbackController::new(
        harness.vcs.clone(),
        harness.supervisor.clone(),
        harness.markers.clone(),
        Notifier::default().with_sink(harness.sink.clone()),
    )
}

#[tokio::test]
async fn test_rollback_falls_back_to_marker_file() {
    let harness = Harness::new(FakeVcs::new("broken00", "broken00"), FakeBuild::passing());
    harness.markers.record("site-a", "good0000").await.unwrap();
    let controller = rollback_controller(&harness);

    assert!(controller.rollback(&project("site-a"), None).await);
    assert_eq!(harness.vcs.head(), "good0000");
    assert_eq!(harness.supervisor.restarts(), vec!["gunicorn-site-a.service"]);
}

#[tokio::test]
async fn test_rollback_without_marker_does_nothing() {
    let harness = Harness::new(FakeVcs::new("broken00", "broken00"), FakeBuild::passing());
    let controller = rollback_controller(&harness);

    assert!(!controller.rollback(&project("site-a"), None).await);
    assert!(harness.vcs.resets().is_empty());
    assert!(harness.supervisor.restarts().is_empty());
    assert!(harness.sink.messages().is_empty());
}

// ================================== DEPLOYER ===================================== //

#[tokio::test]
async fn test_same_project_deployments_are_serialized() {
    let harness = Harness::new(
        FakeVcs::new("old00000", "new00000"),
        FakeBuild::slow(Duration::from_millis(50)),
    );
    let deployer = Deployer::new(harness.executor.clone());

    let first = deployer.launch(project("site-a"), request("site-a", "new00000"));
    let second = deployer.launch(project("site-a"), request("site-a", "new00000"));
    assert_eq!(deployer.status("site-a").unwrap().queued, 2);

    assert_eq!(first.await.unwrap(), Some(DeploymentOutcome::Success));
    assert_eq!(second.await.unwrap(), Some(DeploymentOutcome::Success));
    assert_eq!(harness.build.calls(), 2);
    assert_eq!(harness.build.max_running(), 1);

    let status = deployer.status("site-a").unwrap();
    assert_eq!(status.state, DeploymentState::Succeeded);
    assert_eq!(status.queued, 0);
    assert_eq!(deployer.active(), 0);
}

#[tokio::test]
async fn test_different_projects_deploy_concurrently() {
    let harness = Harness::new(
        FakeVcs::new("old00000", "new00000"),
        FakeBuild::slow(Duration::from_millis(200)),
    );
    let deployer = Deployer::new(harness.executor.clone());

    let a = deployer.launch(project("site-a"), request("site-a", "new00000"));
    let b = deployer.launch(project("site-b"), request("site-b", "new00000"));
    a.await.unwrap();
    b.await.unwrap();

    assert_eq!(harness.build.max_running(), 2);
    assert!(deployer.status("site-c").is_none());
}

#[tokio::test]
async fn test_wait_idle_returns_after_deployments_finish() {
    let harness = Harness::new(
        FakeVcs::new("old00000", "new00000"),
        FakeBuild::slow(Duration::from_millis(50)),
    );
    let deployer = Deployer::new(harness.executor.clone());

    let _ = deployer.launch(project("site-a"), request("site-a", "new00000"));
    assert_eq!(deployer.active(), 1);

    tokio::time::timeout(
        Duration::from_secs(5),
        deployer.wait_idle(Duration::from_millis(10)),
    )
    .await
    .unwrap();
    assert_eq!(deployer.active(), 0);
    assert_eq!(
        deployer.status("site-a").unwrap().state,
        DeploymentState::Succeeded
    );
}

#[tokio::test]
async fn test_failed_deployment_status_is_rolled_back() {
    let harness = Harness::new(
        FakeVcs::new("old00000", "bad00000"),
        FakeBuild::scripted(&[2]),
    );
    let deployer = Deployer::new(harness.executor.clone());

    let outcome = deployer
        .launch(project("site-a"), request("site-a", "bad00000"))
        .await
        .unwrap();
    assert!(matches!(outcome, Some(DeploymentOutcome::BuildFailed { .. })));

    let status = deployer.status("site-a").unwrap();
    assert_eq!(status.state, DeploymentState::RolledBack);
    assert_eq!(status.commit.as_deref(), Some("bad00000"));
    assert!(status.error.is_some());
}

#[tokio::test]
async fn test_failed_rollback_leaves_project_failed() {
    let vcs = FakeVcs::new("old00000", "bad00000");
    vcs.fail_revision_resets();
    let harness = Harness::new(vcs, FakeBuild::scripted(&[1]));
    let deployer = Deployer::new(harness.executor.clone());

    let outcome = deployer
        .launch(project("site-a"), request("site-a", "bad00000"))
        .await
        .unwrap();
    assert!(matches!(outcome, Some(DeploymentOutcome::BuildFailed { .. })));

    assert_eq!(deployer.status("site-a").unwrap().state, DeploymentState::Failed);
    assert_eq!(harness.vcs.head(), "bad00000");
    assert!(harness.supervisor.restarts().is_empty());
    assert_eq!(
        harness.sink.messages().last(),
        Some(&(
            Severity::Error,
            "site-a: build failed with exit code 1 (not rolled back, manual intervention required)"
                .to_string()
        ))
    );
}

#[tokio::test]
async fn test_panicking_deployment_status_is_rolled_back() {
    let harness = Harness::new(
        FakeVcs::new("old00000", "new00000"),
        FakeBuild::panicking(),
    );
    let deployer = Deployer::new(harness.executor.clone());

    let outcome = deployer
        .launch(project("site-a"), request("site-a", "new00000"))
        .await
        .unwrap();
    assert!(matches!(outcome, Some(DeploymentOutcome::Error(_))));

    assert_eq!(deployer.status("site-a").unwrap().state, DeploymentState::RolledBack);
    assert_eq!(harness.vcs.head(), "old00000");
    assert_eq!(deployer.active(), 0);
}

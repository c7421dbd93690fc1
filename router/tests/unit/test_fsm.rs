//! FSM unit tests

use hookrouter::deploy::fsm::{DeploymentEvent, DeploymentFsm, DeploymentState};

fn start(commit: &str) -> DeploymentEvent {
    DeploymentEvent::Start {
        commit: commit.to_string(),
    }
}

#[test]
fn test_fsm_initial_state() {
    let fsm = DeploymentFsm::new();
    assert_eq!(fsm.state(), DeploymentState::Idle);
    assert!(fsm.error().is_none());
    assert_eq!(fsm.queued(), 0);
}

#[test]
fn test_fsm_push_during_run_is_queued() {
    let mut fsm = DeploymentFsm::new();

    fsm.process(DeploymentEvent::Enqueue).unwrap();
    fsm.process(start("aaaaaaaa")).unwrap();
    assert_eq!(fsm.state(), DeploymentState::Building);

    // Second push arrives mid-run
    fsm.process(DeploymentEvent::Enqueue).unwrap();
    assert_eq!(fsm.state(), DeploymentState::Building);
    assert_eq!(fsm.queued(), 1);

    fsm.process(DeploymentEvent::BuildPassed).unwrap();
    fsm.process(DeploymentEvent::Healthy).unwrap();
    assert_eq!(fsm.state(), DeploymentState::Succeeded);

    // Queued run starts once the first one is done
    fsm.process(start("bbbbbbbb")).unwrap();
    assert_eq!(fsm.state(), DeploymentState::Building);
    assert_eq!(fsm.queued(), 0);
    assert_eq!(fsm.status().commit.as_deref(), Some("bbbbbbbb"));
}

#[test]
fn test_fsm_failed_rollback_ends_failed() {
    let mut fsm = DeploymentFsm::new();

    fsm.process(DeploymentEvent::Enqueue).unwrap();
    fsm.process(start("aaaaaaaa")).unwrap();
    fsm.process(DeploymentEvent::Failed("Deployment timed out".to_string()))
        .unwrap();
    assert_eq!(fsm.state(), DeploymentState::RollingBack);

    fsm.process(DeploymentEvent::RollbackFinished { restored: false })
        .unwrap();
    assert_eq!(fsm.state(), DeploymentState::Failed);
    assert_eq!(fsm.error(), Some("Deployment timed out"));
}

#[test]
fn test_fsm_new_run_clears_previous_error() {
    let mut fsm = DeploymentFsm::new();

    fsm.process(DeploymentEvent::Enqueue).unwrap();
    fsm.process(start("aaaaaaaa")).unwrap();
    fsm.process(DeploymentEvent::Abort("git rev-parse failed".to_string()))
        .unwrap();
    assert_eq!(fsm.state(), DeploymentState::Failed);

    fsm.process(DeploymentEvent::Enqueue).unwrap();
    assert_eq!(fsm.state(), DeploymentState::Queued);
    fsm.process(start("bbbbbbbb")).unwrap();
    assert!(fsm.error().is_none());
}

#[test]
fn test_fsm_abort_while_queued_releases_slot() {
    let mut fsm = DeploymentFsm::new();

    fsm.process(DeploymentEvent::Enqueue).unwrap();
    fsm.process(DeploymentEvent::Enqueue).unwrap();
    fsm.process(DeploymentEvent::Abort("worker crashed".to_string()))
        .unwrap();
    assert_eq!(fsm.state(), DeploymentState::Queued);
    assert_eq!(fsm.queued(), 1);

    fsm.process(DeploymentEvent::Abort("worker crashed".to_string()))
        .unwrap();
    assert_eq!(fsm.state(), DeploymentState::Failed);
    assert_eq!(fsm.queued(), 0);
}

#[test]
fn test_fsm_invalid_transitions() {
    let mut fsm = DeploymentFsm::new();

    // Nothing queued, nothing to start
    assert!(fsm.process(start("aaaaaaaa")).is_err());
    assert!(fsm.process(DeploymentEvent::Healthy).is_err());
    assert!(fsm
        .process(DeploymentEvent::RollbackFinished { restored: true })
        .is_err());
    assert_eq!(fsm.state(), DeploymentState::Idle);
}

#[test]
fn test_fsm_status_serializes_snake_case() {
    let mut fsm = DeploymentFsm::new();
    fsm.process(DeploymentEvent::Enqueue).unwrap();
    fsm.process(start("aaaaaaaa")).unwrap();
    fsm.process(DeploymentEvent::Failed("boom".to_string()))
        .unwrap();

    let json = serde_json::to_value(fsm.status()).unwrap();
    assert_eq!(json["state"], "rolling_back");
    assert_eq!(json["commit"], "aaaaaaaa");
    assert_eq!(json["error"], "boom");
    assert_eq!(json["queued"], 0);
}

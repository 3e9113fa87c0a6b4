//! FSM unit tests

use workflow_forge::errors::PublishStep;
use workflow_forge::publish::{PublishEvent, PublishFsm, PublishState};

fn verified() -> PublishFsm {
    let mut fsm = PublishFsm::new();
    fsm.process(PublishEvent::RepositoryVerified {
        default_branch: "main".to_string(),
    })
    .unwrap();
    fsm
}

#[test]
fn test_fsm_initial_state() {
    let fsm = PublishFsm::new();
    assert_eq!(fsm.state(), PublishState::Idle);
    assert!(fsm.error().is_none());
    assert!(fsm.branch().is_none());
    assert!(!fsm.state().is_terminal());
}

#[test]
fn test_fsm_publish_success_flow() {
    let mut fsm = verified();

    // Verified -> BranchPointResolved
    fsm.process(PublishEvent::BaseResolved {
        sha: "abc123".to_string(),
    })
    .unwrap();
    assert_eq!(fsm.state(), PublishState::BranchPointResolved);
    assert_eq!(fsm.base_sha(), Some("abc123"));

    // BranchPointResolved -> BranchCreated
    fsm.process(PublishEvent::BranchCreated {
        branch: "workflow/deploy-1".to_string(),
    })
    .unwrap();
    assert_eq!(fsm.branch(), Some("workflow/deploy-1"));
    assert_eq!(fsm.next_step(), Some(PublishStep::WriteFile));

    // BranchCreated -> FileWritten -> PullRequestOpened
    fsm.process(PublishEvent::FileWritten).unwrap();
    assert_eq!(fsm.next_step(), Some(PublishStep::OpenPullRequest));
    fsm.process(PublishEvent::PullRequestOpened { number: 12 }).unwrap();

    assert_eq!(fsm.state(), PublishState::PullRequestOpened);
    assert!(fsm.state().is_terminal());
    assert_eq!(fsm.pull_request(), Some(12));
}

#[test]
fn test_fsm_steps_cannot_be_skipped() {
    let mut fsm = PublishFsm::new();
    assert!(fsm.process(PublishEvent::FileWritten).is_err());
    assert!(fsm
        .process(PublishEvent::BranchCreated {
            branch: "b".to_string()
        })
        .is_err());
    assert_eq!(fsm.state(), PublishState::Idle);

    let mut fsm = verified();
    assert!(fsm.process(PublishEvent::PullRequestOpened { number: 1 }).is_err());
    assert_eq!(fsm.state(), PublishState::Verified);
}

#[test]
fn test_fsm_failure_after_branch_keeps_branch() {
    let mut fsm = verified();
    fsm.process(PublishEvent::BaseResolved {
        sha: "abc".to_string(),
    })
    .unwrap();
    fsm.process(PublishEvent::BranchCreated {
        branch: "update-workflow/ci-9".to_string(),
    })
    .unwrap();
    fsm.process(PublishEvent::StepFailed {
        step: PublishStep::WriteFile,
        reason: "sha mismatch".to_string(),
    })
    .unwrap();

    assert_eq!(fsm.state(), PublishState::Failed);
    assert_eq!(fsm.failed_step(), Some(PublishStep::WriteFile));
    assert_eq!(fsm.error(), Some("sha mismatch"));
    assert_eq!(fsm.branch(), Some("update-workflow/ci-9"));
    assert_eq!(fsm.next_step(), None);
}

#[test]
fn test_fsm_terminal_states_are_final() {
    let mut fsm = PublishFsm::new();
    fsm.process(PublishEvent::StepFailed {
        step: PublishStep::VerifyRepository,
        reason: "not found".to_string(),
    })
    .unwrap();

    // No second failure and no resumption
    assert!(fsm
        .process(PublishEvent::StepFailed {
            step: PublishStep::ResolveBaseSha,
            reason: "again".to_string(),
        })
        .is_err());
    assert!(fsm
        .process(PublishEvent::RepositoryVerified {
            default_branch: "main".to_string(),
        })
        .is_err());
    assert_eq!(fsm.failed_step(), Some(PublishStep::VerifyRepository));
}

#[test]
fn test_fsm_state_serialization() {
    let json = serde_json::to_string(&PublishState::BranchPointResolved).unwrap();
    assert_eq!(json, "\"branch_point_resolved\"");
}

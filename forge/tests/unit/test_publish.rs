//! Publish sequence tests against a scripted gateway

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio_util::sync::CancellationToken;

use workflow_forge::errors::{GatewayError, PublishErrorKind, PublishStep};
use workflow_forge::models::UpdateWorkflowRequest;
use workflow_forge::publish::{PublishPlan, Publisher, DEFAULT_OPERATION_TIMEOUT};

use crate::support::*;

const YAML: &str = "name: Build & Publish Image (EC2)\non:\n  push:\n";

fn publisher(gateway: &Arc<FakeGateway>) -> Publisher {
    Publisher::new(gateway.clone(), DEFAULT_OPERATION_TIMEOUT)
}

fn update_plan(sha: &str) -> PublishPlan {
    PublishPlan::update(&UpdateWorkflowRequest {
        owner: "acme".to_string(),
        repository: "svc".to_string(),
        file_path: ".github/workflows/deploy.yml".to_string(),
        content: YAML.to_string(),
        sha: sha.to_string(),
        commit_message: Some("Bump release tag".to_string()),
    })
}

#[tokio::test]
async fn test_publish_runs_steps_in_order() {
    let gateway = Arc::new(FakeGateway::new());
    let plan = PublishPlan::create("acme", "svc", "deploy", YAML);

    let result = publisher(&gateway)
        .publish(&token(), &plan, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        gateway.calls(),
        vec![
            GET_REPOSITORY,
            GET_BRANCH_SHA,
            CREATE_BRANCH,
            PUT_FILE,
            CREATE_PULL_REQUEST
        ]
    );

    // Branch is cut from the default branch tip
    let branches = gateway.branches();
    assert_eq!(branches.len(), 1);
    assert!(branches[0].0.starts_with("workflow/deploy-"));
    assert_eq!(branches[0].1, "sha-of-main");

    // File is committed base64 encoded, without a sha
    let puts = gateway.puts();
    assert_eq!(puts[0].0, ".github/workflows/deploy.yml");
    assert_eq!(puts[0].1.branch, branches[0].0);
    assert_eq!(puts[0].1.message, "Add workflow: deploy");
    assert!(puts[0].1.sha.is_none());
    assert_eq!(BASE64.decode(&puts[0].1.content).unwrap(), YAML.as_bytes());

    // Pull request goes from the new branch into the default branch
    let pulls = gateway.pulls();
    assert_eq!(pulls[0].head, branches[0].0);
    assert_eq!(pulls[0].base, "main");
    assert_eq!(pulls[0].title, "Add workflow: deploy");

    assert_eq!(result.pull_request_number, 1);
    assert_eq!(result.branch, branches[0].0);
    assert_eq!(result.file_url, "https://github.com/acme/svc/pull/1");
    assert_eq!(
        result.message,
        "Pull request #1 created for workflow 'deploy'"
    );
}

#[tokio::test]
async fn test_publish_uses_repository_default_branch() {
    let gateway = Arc::new(FakeGateway::new().with_default_branch("trunk"));
    let plan = PublishPlan::create("acme", "svc", "deploy", YAML);

    tokio_test::assert_ok!(
        publisher(&gateway)
            .publish(&token(), &plan, &CancellationToken::new())
            .await
    );
    assert_eq!(gateway.branches()[0].1, "sha-of-trunk");
    assert_eq!(gateway.pulls()[0].base, "trunk");
}

#[tokio::test]
async fn test_publish_repository_not_found() {
    let gateway = Arc::new(FakeGateway::new().failing(GET_REPOSITORY, GatewayError::NotFound));
    let plan = PublishPlan::create("acme", "ghost", "deploy", YAML);

    let err = publisher(&gateway)
        .publish(&token(), &plan, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.step, PublishStep::VerifyRepository);
    assert_eq!(
        err.kind,
        PublishErrorKind::RepositoryNotFound("acme/ghost".to_string())
    );
    assert!(err.branch.is_none());
    assert_eq!(gateway.calls(), vec![GET_REPOSITORY]);
}

#[tokio::test]
async fn test_publish_missing_default_branch() {
    let gateway = Arc::new(FakeGateway::new().with_default_branch(""));
    let plan = PublishPlan::create("acme", "svc", "deploy", YAML);

    let err = publisher(&gateway)
        .publish(&token(), &plan, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.step, PublishStep::ResolveDefaultBranch);
    assert_eq!(err.kind, PublishErrorKind::MissingDefaultBranch);
    assert_eq!(gateway.calls(), vec![GET_REPOSITORY]);
}

#[tokio::test]
async fn test_publish_empty_repository() {
    let gateway = Arc::new(FakeGateway::new().failing(GET_BRANCH_SHA, GatewayError::NotFound));
    let plan = PublishPlan::create("acme", "svc", "deploy", YAML);

    let err = publisher(&gateway)
        .publish(&token(), &plan, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.step, PublishStep::ResolveBaseSha);
    assert_eq!(
        err.kind,
        PublishErrorKind::EmptyRepository("acme/svc".to_string())
    );
    assert!(err.to_string().contains("initial commit"));
    assert_eq!(gateway.calls(), vec![GET_REPOSITORY, GET_BRANCH_SHA]);
}

#[tokio::test]
async fn test_publish_existing_file_on_create() {
    let gateway = Arc::new(FakeGateway::new().failing(
        PUT_FILE,
        GatewayError::Unprocessable("Invalid request.\n\n\"sha\" wasn't supplied.".to_string()),
    ));
    let plan = PublishPlan::create("acme", "svc", "deploy", YAML);

    let err = publisher(&gateway)
        .publish(&token(), &plan, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.step, PublishStep::WriteFile);
    assert_eq!(
        err.kind,
        PublishErrorKind::WorkflowAlreadyExists(".github/workflows/deploy.yml".to_string())
    );
    // The branch stays behind, no pull request is attempted
    assert!(err.branch.as_deref().unwrap().starts_with("workflow/deploy-"));
    assert!(!gateway.calls().contains(&CREATE_PULL_REQUEST));
}

#[tokio::test]
async fn test_publish_invalid_branch_name_is_not_a_collision() {
    let rejection = GatewayError::Unprocessable(
        "Reference name 'workflow/deploy-1' is not a valid ref name".to_string(),
    );
    let gateway = Arc::new(FakeGateway::new().failing(CREATE_BRANCH, rejection.clone()));
    let plan = PublishPlan::create("acme", "svc", "deploy", YAML);

    let err = publisher(&gateway)
        .publish(&token(), &plan, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.step, PublishStep::CreateBranch);
    assert_eq!(err.kind, PublishErrorKind::Gateway(rejection));
    assert!(err.branch.is_none());
    assert!(!gateway.calls().contains(&PUT_FILE));
}

#[tokio::test]
async fn test_publish_existing_branch() {
    let gateway = Arc::new(FakeGateway::new().failing(
        CREATE_BRANCH,
        GatewayError::Unprocessable("Reference already exists".to_string()),
    ));
    let plan = PublishPlan::create("acme", "svc", "deploy", YAML);

    let err = publisher(&gateway)
        .publish(&token(), &plan, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err.kind, PublishErrorKind::BranchAlreadyExists(ref b) if b.starts_with("workflow/deploy-")));
}

#[tokio::test]
async fn test_update_sends_sha_and_commit_message() {
    let gateway = Arc::new(FakeGateway::new());
    let plan = update_plan("blob-1");

    let result = publisher(&gateway)
        .publish(&token(), &plan, &CancellationToken::new())
        .await
        .unwrap();

    let puts = gateway.puts();
    assert_eq!(puts[0].1.sha.as_deref(), Some("blob-1"));
    assert_eq!(puts[0].1.message, "Bump release tag");
    // The caller's message is for the commit only
    assert_eq!(gateway.pulls()[0].title, "Update workflow: deploy");
    assert!(result.branch.starts_with("update-workflow/deploy-"));
    assert_eq!(
        result.message,
        "Pull request #1 created for workflow 'deploy' update"
    );
}

#[tokio::test]
async fn test_update_with_stale_sha_conflicts() {
    let gateway = Arc::new(FakeGateway::new().failing(
        PUT_FILE,
        GatewayError::Conflict("is at 9f1c but expected blob-0".to_string()),
    ));
    let plan = update_plan("blob-0");

    let err = publisher(&gateway)
        .publish(&token(), &plan, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.step, PublishStep::WriteFile);
    assert_eq!(
        err.kind,
        PublishErrorKind::Conflict(".github/workflows/deploy.yml".to_string())
    );
    assert!(err
        .branch
        .as_deref()
        .unwrap()
        .starts_with("update-workflow/deploy-"));
    assert_eq!(
        gateway.calls(),
        vec![GET_REPOSITORY, GET_BRANCH_SHA, CREATE_BRANCH, PUT_FILE]
    );
}

#[tokio::test]
async fn test_publish_cancelled_before_start() {
    let gateway = Arc::new(FakeGateway::new());
    let plan = PublishPlan::create("acme", "svc", "deploy", YAML);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = publisher(&gateway)
        .publish(&token(), &plan, &cancel)
        .await
        .unwrap_err();

    assert_eq!(err.step, PublishStep::VerifyRepository);
    assert_eq!(err.kind, PublishErrorKind::Cancelled);
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn test_publish_cancelled_mid_sequence() {
    let gateway = Arc::new(FakeGateway::new().stalling(CREATE_BRANCH));
    let plan = PublishPlan::create("acme", "svc", "deploy", YAML);
    let cancel = CancellationToken::new();
    let publisher = publisher(&gateway);
    let token = token();

    let (outcome, _) = tokio::join!(publisher.publish(&token, &plan, &cancel), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
    });

    let err = outcome.unwrap_err();
    assert_eq!(err.step, PublishStep::CreateBranch);
    assert_eq!(err.kind, PublishErrorKind::Cancelled);
    assert!(err.branch.is_none());
    assert_eq!(
        gateway.calls(),
        vec![GET_REPOSITORY, GET_BRANCH_SHA, CREATE_BRANCH]
    );
}

#[tokio::test]
async fn test_publish_times_out_at_stalled_step() {
    let gateway = Arc::new(FakeGateway::new().stalling(PUT_FILE));
    let plan = PublishPlan::create("acme", "svc", "deploy", YAML);
    let publisher = Publisher::new(gateway.clone(), Duration::from_millis(50));

    let err = publisher
        .publish(&token(), &plan, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.step, PublishStep::WriteFile);
    assert_eq!(err.kind, PublishErrorKind::TimedOut);
    assert!(err.branch.is_some());
    assert!(gateway.pulls().is_empty());
}

#[tokio::test]
async fn test_concurrent_publishes_are_independent() {
    let gateway = Arc::new(FakeGateway::new());
    let publisher = publisher(&gateway);
    let cancel = CancellationToken::new();
    let token = token();

    let plans: Vec<PublishPlan> = ["api", "web", "worker"]
        .iter()
        .map(|name| PublishPlan::create("acme", "svc", *name, YAML))
        .collect();

    let results = futures::future::join_all(
        plans
            .iter()
            .map(|plan| publisher.publish(&token, plan, &cancel)),
    )
    .await;

    let mut branches: Vec<String> = results
        .into_iter()
        .map(|result| result.unwrap().branch)
        .collect();
    branches.sort();
    branches.dedup();

    assert_eq!(branches.len(), 3);
    assert_eq!(gateway.pulls().len(), 3);
}

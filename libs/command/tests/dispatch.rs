//! Dispatch and completion tests against a recorded provider.
//!
//! Time is paused, so backoff sleeps complete instantly.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use fleet_command::{BackoffPolicy, CommandDispatcher, CommandDocument, CommandError};
use fleet_id::{CommandId, InstanceId};
use fleet_provider::model::{
    Command, CommandInvocationSummary, InstanceState, InstanceStatus, InvocationStatus,
    StatusSummary,
};
use fleet_provider::request::{
    DescribeInstanceStatusInput, DescribeInstanceStatusOutput, ListCommandInvocationsInput,
    ListCommandInvocationsOutput, SendCommandInput, SendCommandOutput,
};
use fleet_provider::{FixtureProvider, Operation, ProviderError, ProviderRequest, ProviderResponse};
use tokio::sync::watch;

// =============================================================================
// Helpers
// =============================================================================

const TIMEOUT: Duration = Duration::from_secs(60);

fn node(id: &str) -> InstanceId {
    InstanceId::parse(id).unwrap()
}

fn command_id() -> CommandId {
    CommandId::new("5d1c0f5e-0000-4000-8000-00000000abcd").unwrap()
}

fn setup() -> (Arc<FixtureProvider>, CommandDispatcher) {
    let fixture = Arc::new(FixtureProvider::new());
    let dispatcher = CommandDispatcher::new(fixture.clone())
        .with_backoff(BackoffPolicy::starting_at(Duration::from_millis(500)).without_jitter());
    (fixture, dispatcher)
}

fn no_shutdown() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

fn expect_send(fixture: &FixtureProvider, document: &CommandDocument, nodes: &[InstanceId]) {
    fixture.expect(
        ProviderRequest::SendCommand(SendCommandInput {
            document_name: document.name.clone(),
            instance_ids: nodes.to_vec(),
            max_concurrency: nodes.len().min(100).to_string(),
            max_errors: "0".to_string(),
            parameters: document.parameters.clone(),
        }),
        ProviderResponse::SendCommand(SendCommandOutput {
            command: Command {
                command_id: command_id(),
                document_name: Some(document.name.clone()),
            },
        }),
    );
}

fn expect_status(fixture: &FixtureProvider, node_id: &str, status: Option<InvocationStatus>) {
    let invocations = status
        .map(|status| CommandInvocationSummary {
            instance_id: Some(node(node_id)),
            status,
        })
        .into_iter()
        .collect();

    fixture.expect(
        ProviderRequest::ListCommandInvocations(ListCommandInvocationsInput {
            command_id: command_id(),
            instance_id: node(node_id),
        }),
        ProviderResponse::ListCommandInvocations(ListCommandInvocationsOutput {
            command_invocations: invocations,
        }),
    );
}

// =============================================================================
// Completion
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_agent_install_succeeds_on_every_node() {
    let (fixture, dispatcher) = setup();
    let nodes = [node("i-1"), node("i-2")];
    let document = CommandDocument::install_agent();

    expect_send(&fixture, &document, &nodes);
    expect_status(&fixture, "i-1", Some(InvocationStatus::InProgress));
    // Not registered yet.
    expect_status(&fixture, "i-2", None);
    expect_status(&fixture, "i-1", Some(InvocationStatus::Success));
    expect_status(&fixture, "i-2", Some(InvocationStatus::Success));

    let (_tx, mut rx) = no_shutdown();
    let report = dispatcher
        .run(&document, &nodes, TIMEOUT, &mut rx)
        .await
        .unwrap();

    assert_eq!(report.command_id, command_id());
    assert_eq!(report.document, "AWS-ConfigureAWSPackage");
    assert!(report
        .statuses
        .values()
        .all(|status| *status == InvocationStatus::Success));
    assert!(fixture.is_exhausted());

    let sent = fixture.calls()[0].params();
    assert_eq!(
        sent["Parameters"],
        serde_json::json!({
            "action": ["Install"],
            "name": ["AmazonCloudWatchAgent"],
            "version": ["latest"]
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_single_node_failure_names_the_node() {
    let (fixture, dispatcher) = setup();
    let nodes = [node("i-1"), node("i-2")];
    let document = CommandDocument::install_agent();

    expect_send(&fixture, &document, &nodes);
    expect_status(&fixture, "i-1", Some(InvocationStatus::Success));
    expect_status(&fixture, "i-2", Some(InvocationStatus::Failed));

    let (_tx, mut rx) = no_shutdown();
    let err = dispatcher
        .run(&document, &nodes, TIMEOUT, &mut rx)
        .await
        .unwrap_err();

    match &err {
        CommandError::NodeFailed { failed, .. } => {
            assert_eq!(failed, &vec![(node("i-2"), InvocationStatus::Failed)]);
        }
        other => panic!("expected NodeFailed, got {other:?}"),
    }
    assert!(err.to_string().contains("i-2"));
}

#[tokio::test(start_paused = true)]
async fn test_failure_short_circuits_remaining_polls() {
    let (fixture, dispatcher) = setup();
    let nodes = [node("i-1"), node("i-2"), node("i-3")];

    expect_status(&fixture, "i-1", Some(InvocationStatus::TimedOut));

    let (_tx, mut rx) = no_shutdown();
    let err = dispatcher
        .await_completion(&command_id(), "AWS-RunShellScript", &nodes, TIMEOUT, &mut rx)
        .await
        .unwrap_err();

    assert_eq!(err.failed_nodes(), vec![&node("i-1")]);
    assert_eq!(fixture.call_count(Operation::ListCommandInvocations), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_reports_pending_nodes() {
    let (fixture, dispatcher) = setup();
    let nodes = [node("i-1"), node("i-2")];

    // i-1 finishes; i-2 never leaves InProgress.
    expect_status(&fixture, "i-1", Some(InvocationStatus::Success));
    for _ in 0..20 {
        expect_status(&fixture, "i-2", Some(InvocationStatus::InProgress));
    }

    let (_tx, mut rx) = no_shutdown();
    let err = dispatcher
        .await_completion(
            &command_id(),
            "AWS-RunShellScript",
            &nodes,
            Duration::from_secs(5),
            &mut rx,
        )
        .await
        .unwrap_err();

    match err {
        CommandError::TimedOut { pending, .. } => assert_eq!(pending, vec![node("i-2")]),
        other => panic!("expected TimedOut, got {other:?}"),
    }
    // i-1 is not polled again once it succeeded.
    assert_eq!(
        fixture
            .calls()
            .iter()
            .filter(|c| c.params()["InstanceId"] == "i-1")
            .count(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_transient_poll_errors_are_retried() {
    let (fixture, dispatcher) = setup();
    let nodes = [node("i-1")];

    fixture.expect_error(
        ProviderRequest::ListCommandInvocations(ListCommandInvocationsInput {
            command_id: command_id(),
            instance_id: node("i-1"),
        }),
        ProviderError::service(
            Operation::ListCommandInvocations,
            "ThrottlingException",
            "Rate exceeded",
        ),
    );
    expect_status(&fixture, "i-1", Some(InvocationStatus::Success));

    let (_tx, mut rx) = no_shutdown();
    dispatcher
        .await_completion(&command_id(), "AWS-RunShellScript", &nodes, TIMEOUT, &mut rx)
        .await
        .unwrap();
    assert!(fixture.is_exhausted());
}

#[tokio::test(start_paused = true)]
async fn test_non_transient_poll_error_names_node() {
    let (fixture, dispatcher) = setup();
    let nodes = [node("i-1")];

    fixture.expect_error(
        ProviderRequest::ListCommandInvocations(ListCommandInvocationsInput {
            command_id: command_id(),
            instance_id: node("i-1"),
        }),
        ProviderError::service(
            Operation::ListCommandInvocations,
            "AccessDeniedException",
            "not authorized",
        ),
    );

    let (_tx, mut rx) = no_shutdown();
    let err = dispatcher
        .await_completion(&command_id(), "AWS-RunShellScript", &nodes, TIMEOUT, &mut rx)
        .await
        .unwrap_err();
    assert!(matches!(err, CommandError::Poll { ref node_id, .. } if node_id == &node("i-1")));
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_cancelled_before_first_poll() {
    let (fixture, dispatcher) = setup();
    let (tx, mut rx) = no_shutdown();
    tx.send(true).unwrap();

    let err = dispatcher
        .await_completion(&command_id(), "AWS-RunShellScript", &[node("i-1")], TIMEOUT, &mut rx)
        .await
        .unwrap_err();

    assert!(matches!(err, CommandError::Cancelled { .. }));
    assert!(fixture.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_waiting_leaves_command_alone() {
    let (fixture, dispatcher) = setup();
    let nodes = [node("i-1")];
    let document = CommandDocument::init_collectd();

    expect_send(&fixture, &document, &nodes);
    for _ in 0..20 {
        expect_status(&fixture, "i-1", Some(InvocationStatus::InProgress));
    }

    let (tx, mut rx) = no_shutdown();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        let _ = tx.send(true);
    });

    let err = dispatcher
        .run(&document, &nodes, TIMEOUT, &mut rx)
        .await
        .unwrap_err();

    assert!(matches!(err, CommandError::Cancelled { .. }));
    // Only the dispatch itself changed anything.
    assert_eq!(fixture.mutating_calls().len(), 1);
}

// =============================================================================
// Dispatch
// =============================================================================

#[tokio::test]
async fn test_dispatch_caps_concurrency_at_one_hundred() {
    let (fixture, dispatcher) = setup();
    let nodes: Vec<_> = (0..150).map(|i| node(&format!("i-{i:04}"))).collect();
    fixture.expect_operation(
        Operation::SendCommand,
        ProviderResponse::SendCommand(SendCommandOutput {
            command: Command {
                command_id: command_id(),
                document_name: None,
            },
        }),
    );

    dispatcher
        .dispatch(&CommandDocument::init_collectd(), &nodes)
        .await
        .unwrap();

    let params = fixture.calls()[0].params();
    assert_eq!(params["MaxConcurrency"], "100");
    assert_eq!(params["MaxErrors"], "0");
    assert_eq!(params["InstanceIds"].as_array().unwrap().len(), 150);
}

#[tokio::test]
async fn test_dispatch_to_no_nodes_is_refused() {
    let (fixture, dispatcher) = setup();
    let err = dispatcher
        .dispatch(&CommandDocument::install_agent(), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, CommandError::NoTargets { .. }));
    assert!(fixture.calls().is_empty());
}

#[tokio::test]
async fn test_rejected_dispatch() {
    let (fixture, dispatcher) = setup();
    let document = CommandDocument::new("AWS-RunShellScript").params("commands", ["uptime"]);
    let mut parameters = BTreeMap::new();
    parameters.insert("commands".to_string(), vec!["uptime".to_string()]);

    fixture.expect_error(
        ProviderRequest::SendCommand(SendCommandInput {
            document_name: "AWS-RunShellScript".to_string(),
            instance_ids: vec![node("i-1")],
            max_concurrency: "1".to_string(),
            max_errors: "0".to_string(),
            parameters,
        }),
        ProviderError::service(Operation::SendCommand, "InvalidInstanceId", "i-1 is not managed"),
    );

    let err = dispatcher
        .dispatch(&document, &[node("i-1")])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CommandError::DispatchFailed { nodes: 1, ref document, .. } if document == "AWS-RunShellScript"
    ));
}

// =============================================================================
// Readiness
// =============================================================================

fn status(id: &str, code: i32, checks: &str) -> InstanceStatus {
    InstanceStatus {
        instance_id: node(id),
        instance_state: InstanceState {
            code,
            name: if code == 16 { "running" } else { "pending" }.to_string(),
        },
        availability_zone: None,
        system_status: StatusSummary {
            status: checks.to_string(),
            details: vec![],
        },
        instance_status: StatusSummary {
            status: checks.to_string(),
            details: vec![],
        },
    }
}

fn expect_instance_status(fixture: &FixtureProvider, nodes: &[InstanceId], statuses: Vec<InstanceStatus>) {
    fixture.expect(
        ProviderRequest::DescribeInstanceStatus(DescribeInstanceStatusInput {
            instance_ids: nodes.to_vec(),
        }),
        ProviderResponse::DescribeInstanceStatus(DescribeInstanceStatusOutput {
            instance_statuses: statuses,
        }),
    );
}

#[tokio::test(start_paused = true)]
async fn test_waits_until_all_nodes_pass_checks() {
    let (fixture, dispatcher) = setup();
    let nodes = [node("i-1"), node("i-2")];

    expect_instance_status(
        &fixture,
        &nodes,
        vec![status("i-1", 16, "ok"), status("i-2", 0, "initializing")],
    );
    expect_instance_status(
        &fixture,
        &nodes,
        vec![status("i-1", 16, "ok"), status("i-2", 16, "ok")],
    );

    let (_tx, mut rx) = no_shutdown();
    dispatcher
        .wait_until_ready(&nodes, TIMEOUT, &mut rx)
        .await
        .unwrap();
    assert!(fixture.is_exhausted());
}

#[tokio::test(start_paused = true)]
async fn test_nodes_never_ready() {
    let (fixture, dispatcher) = setup();
    let nodes = [node("i-1"), node("i-2")];
    for _ in 0..20 {
        expect_instance_status(&fixture, &nodes, vec![status("i-1", 16, "ok")]);
    }

    let (_tx, mut rx) = no_shutdown();
    let err = dispatcher
        .wait_until_ready(&nodes, Duration::from_secs(5), &mut rx)
        .await
        .unwrap_err();

    match err {
        CommandError::NodesNotReady { pending } => assert_eq!(pending, vec![node("i-2")]),
        other => panic!("expected NodesNotReady, got {other:?}"),
    }
}

//! Command dispatch errors.

use fleet_id::{CommandId, InstanceId};
use fleet_provider::model::InvocationStatus;
use fleet_provider::ProviderError;
use thiserror::Error;

/// Result type for dispatch and wait operations.
pub type CommandResult<T> = Result<T, CommandError>;

/// Errors raised while dispatching or waiting on a remote command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command had no target nodes.
    #[error("refusing to dispatch {document} to an empty node list")]
    NoTargets { document: String },

    /// The provider refused the dispatch.
    #[error("dispatch of {document} to {nodes} node(s) failed: {source}")]
    DispatchFailed {
        document: String,
        nodes: usize,
        #[source]
        source: ProviderError,
    },

    /// At least one node reported a terminal non-success status.
    #[error("command {command_id} failed on {}", describe_failures(.failed))]
    NodeFailed {
        command_id: CommandId,
        failed: Vec<(InstanceId, InvocationStatus)>,
    },

    /// The deadline passed with nodes still running.
    #[error("command {command_id} timed out; pending nodes: {}", join_nodes(.pending))]
    TimedOut {
        command_id: CommandId,
        pending: Vec<InstanceId>,
    },

    /// The caller stopped waiting. A dispatched command keeps running.
    #[error("stopped waiting for {waiting_for}")]
    Cancelled { waiting_for: String },

    /// Nodes did not become ready before the deadline.
    #[error("nodes not ready: {}", join_nodes(.pending))]
    NodesNotReady { pending: Vec<InstanceId> },

    /// Polling failed with a non-transient error.
    #[error("polling command {command_id} on {node_id} failed: {source}")]
    Poll {
        command_id: CommandId,
        node_id: InstanceId,
        #[source]
        source: ProviderError,
    },

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl CommandError {
    /// Nodes that failed, if this is a node failure.
    pub fn failed_nodes(&self) -> Vec<&InstanceId> {
        match self {
            Self::NodeFailed { failed, .. } => failed.iter().map(|(node, _)| node).collect(),
            _ => Vec::new(),
        }
    }
}

fn join_nodes(nodes: &[InstanceId]) -> String {
    nodes
        .iter()
        .map(InstanceId::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

fn describe_failures(failed: &[(InstanceId, InvocationStatus)]) -> String {
    failed
        .iter()
        .map(|(node, status)| format!("{node} ({status})"))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_failure_names_nodes() {
        let err = CommandError::NodeFailed {
            command_id: CommandId::new("cmd-1").unwrap(),
            failed: vec![(InstanceId::parse("i-2").unwrap(), InvocationStatus::Failed)],
        };
        assert_eq!(err.to_string(), "command cmd-1 failed on i-2 (Failed)");
        assert_eq!(err.failed_nodes(), vec![&InstanceId::parse("i-2").unwrap()]);
    }

    #[test]
    fn test_timeout_lists_pending() {
        let err = CommandError::TimedOut {
            command_id: CommandId::new("cmd-1").unwrap(),
            pending: vec![
                InstanceId::parse("i-1").unwrap(),
                InstanceId::parse("i-3").unwrap(),
            ],
        };
        assert!(err.to_string().ends_with("pending nodes: i-1,i-3"));
    }
}

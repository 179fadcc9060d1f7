//! Per-node invocation tracking.
//!
//! Each node's invocation moves Pending -> InProgress -> a terminal status.
//! Once terminal, later reports are ignored: a node that succeeded stays
//! succeeded even if a stale poll says otherwise.

use std::collections::BTreeMap;

use fleet_id::InstanceId;
use fleet_provider::model::InvocationStatus;
use tracing::debug;

/// One node's invocation of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    node_id: InstanceId,
    status: InvocationStatus,
}

impl CommandInvocation {
    pub fn new(node_id: InstanceId) -> Self {
        Self {
            node_id,
            status: InvocationStatus::Pending,
        }
    }

    pub fn node_id(&self) -> &InstanceId {
        &self.node_id
    }

    pub fn status(&self) -> InvocationStatus {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Terminal and not Success.
    pub fn is_failed(&self) -> bool {
        self.status.is_terminal() && !self.status.is_success()
    }

    /// Record a reported status. Returns true if the status changed.
    pub fn observe(&mut self, reported: InvocationStatus) -> bool {
        if self.status.is_terminal() {
            if reported != self.status {
                debug!(
                    node_id = %self.node_id,
                    current = %self.status,
                    reported = %reported,
                    "Ignoring report for finished invocation"
                );
            }
            return false;
        }
        if reported == self.status {
            return false;
        }
        self.status = reported;
        true
    }
}

/// Invocations of one command across all target nodes.
#[derive(Debug, Clone, Default)]
pub struct InvocationSet {
    invocations: BTreeMap<InstanceId, CommandInvocation>,
}

impl InvocationSet {
    pub fn new<'a>(nodes: impl IntoIterator<Item = &'a InstanceId>) -> Self {
        let invocations = nodes
            .into_iter()
            .map(|node| (node.clone(), CommandInvocation::new(node.clone())))
            .collect();
        Self { invocations }
    }

    /// Record a status for a node. Unknown nodes are ignored.
    pub fn observe(&mut self, node_id: &InstanceId, reported: InvocationStatus) -> bool {
        self.invocations
            .get_mut(node_id)
            .is_some_and(|inv| inv.observe(reported))
    }

    /// Nodes not yet in a terminal status.
    pub fn pending(&self) -> Vec<InstanceId> {
        self.invocations
            .values()
            .filter(|inv| !inv.is_terminal())
            .map(|inv| inv.node_id.clone())
            .collect()
    }

    /// Nodes that finished without success, with their status.
    pub fn failed(&self) -> Vec<(InstanceId, InvocationStatus)> {
        self.invocations
            .values()
            .filter(|inv| inv.is_failed())
            .map(|inv| (inv.node_id.clone(), inv.status))
            .collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.invocations.values().all(|inv| inv.status.is_success())
    }

    pub fn statuses(&self) -> BTreeMap<InstanceId, InvocationStatus> {
        self.invocations
            .iter()
            .map(|(node, inv)| (node.clone(), inv.status))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.invocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invocations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn node(id: &str) -> InstanceId {
        InstanceId::parse(id).unwrap()
    }

    #[test]
    fn test_progresses_to_success() {
        let mut inv = CommandInvocation::new(node("i-1"));
        assert_eq!(inv.status(), InvocationStatus::Pending);
        assert!(inv.observe(InvocationStatus::InProgress));
        assert!(!inv.observe(InvocationStatus::InProgress));
        assert!(inv.observe(InvocationStatus::Success));
        assert!(inv.is_terminal());
        assert!(!inv.is_failed());
    }

    #[rstest]
    #[case(InvocationStatus::Success, InvocationStatus::Failed)]
    #[case(InvocationStatus::Failed, InvocationStatus::Success)]
    #[case(InvocationStatus::TimedOut, InvocationStatus::InProgress)]
    #[case(InvocationStatus::Cancelled, InvocationStatus::Pending)]
    fn test_no_exit_from_terminal(
        #[case] terminal: InvocationStatus,
        #[case] later: InvocationStatus,
    ) {
        let mut inv = CommandInvocation::new(node("i-1"));
        inv.observe(terminal);
        assert!(!inv.observe(later));
        assert_eq!(inv.status(), terminal);
    }

    #[test]
    fn test_set_tracks_pending_and_failed() {
        let nodes = [node("i-1"), node("i-2"), node("i-3")];
        let mut set = InvocationSet::new(&nodes);

        set.observe(&nodes[0], InvocationStatus::Success);
        set.observe(&nodes[1], InvocationStatus::Failed);
        set.observe(&nodes[2], InvocationStatus::InProgress);
        set.observe(&node("i-9"), InvocationStatus::Failed);

        assert_eq!(set.pending(), vec![node("i-3")]);
        assert_eq!(set.failed(), vec![(node("i-2"), InvocationStatus::Failed)]);
        assert!(!set.all_succeeded());
        assert_eq!(set.len(), 3);
    }
}

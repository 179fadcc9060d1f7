//! Command dispatch and completion tracking.
//!
//! A command goes out as a single `SendCommand` covering every target node.
//! Completion is tracked per node with `ListCommandInvocations`, polled on a
//! backoff schedule until every node succeeds, one fails, the deadline
//! passes, or the caller stops waiting.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use fleet_id::{CommandId, InstanceId};
use fleet_provider::model::InvocationStatus;
use fleet_provider::request::SendCommandInput;
use fleet_provider::{CloudProvider, ProviderResult};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::backoff::BackoffPolicy;
use crate::document::CommandDocument;
use crate::error::{CommandError, CommandResult};
use crate::invocation::InvocationSet;

/// Upper bound on nodes running a command at once.
pub const MAX_CONCURRENCY_CAP: usize = 100;

/// Failed invocations tolerated before the provider stops the command.
pub const MAX_ERRORS: &str = "0";

/// `MaxConcurrency` for a command targeting `nodes` nodes.
pub fn max_concurrency(nodes: usize) -> String {
    nodes.min(MAX_CONCURRENCY_CAP).to_string()
}

/// Final per-node statuses of a command that succeeded everywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReport {
    pub command_id: CommandId,
    pub document: String,
    pub statuses: BTreeMap<InstanceId, InvocationStatus>,
}

/// Sends commands to nodes and waits for them to finish.
#[derive(Clone)]
pub struct CommandDispatcher {
    pub(crate) provider: Arc<dyn CloudProvider>,
    pub(crate) backoff: BackoffPolicy,
}

impl CommandDispatcher {
    pub fn new(provider: Arc<dyn CloudProvider>) -> Self {
        Self {
            provider,
            backoff: BackoffPolicy::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Send `document` to every node in one call.
    #[instrument(skip_all, fields(document = %document.name, nodes = nodes.len()))]
    pub async fn dispatch(
        &self,
        document: &CommandDocument,
        nodes: &[InstanceId],
    ) -> CommandResult<CommandId> {
        if nodes.is_empty() {
            return Err(CommandError::NoTargets {
                document: document.name.clone(),
            });
        }

        let input = SendCommandInput {
            document_name: document.name.clone(),
            instance_ids: nodes.to_vec(),
            max_concurrency: max_concurrency(nodes.len()),
            max_errors: MAX_ERRORS.to_string(),
            parameters: document.parameters.clone(),
        };

        let command_id = self.provider.send_command(input).await.map_err(|source| {
            CommandError::DispatchFailed {
                document: document.name.clone(),
                nodes: nodes.len(),
                source,
            }
        })?;

        info!(command_id = %command_id, "Dispatched command");
        Ok(command_id)
    }

    /// Current status of one node's invocation.
    ///
    /// An invocation the provider has not registered yet reads as Pending.
    pub async fn poll(
        &self,
        command_id: &CommandId,
        node_id: &InstanceId,
    ) -> ProviderResult<InvocationStatus> {
        let invocations = self
            .provider
            .list_command_invocations(command_id, node_id)
            .await?;

        Ok(invocations
            .into_iter()
            .find(|inv| inv.instance_id.as_ref().is_none_or(|id| id == node_id))
            .map_or(InvocationStatus::Pending, |inv| inv.status))
    }

    /// Poll until every node succeeds.
    ///
    /// Returns on the first node failure, at the deadline, or when `shutdown`
    /// flips to true. None of these touch the command itself.
    #[instrument(skip_all, fields(command_id = %command_id, document = %document, nodes = nodes.len()))]
    pub async fn await_completion(
        &self,
        command_id: &CommandId,
        document: &str,
        nodes: &[InstanceId],
        timeout: Duration,
        shutdown: &mut watch::Receiver<bool>,
    ) -> CommandResult<CommandReport> {
        let deadline = Instant::now() + timeout;
        let mut invocations = InvocationSet::new(nodes);
        let mut attempt = 0u32;

        loop {
            if *shutdown.borrow() {
                return Err(cancelled(command_id));
            }

            for node_id in invocations.pending() {
                let status = match self.poll(command_id, &node_id).await {
                    Ok(status) => status,
                    Err(e) if e.is_transient() => {
                        warn!(node_id = %node_id, error = %e, "Transient poll failure, will retry");
                        continue;
                    }
                    Err(source) => {
                        return Err(CommandError::Poll {
                            command_id: command_id.clone(),
                            node_id,
                            source,
                        });
                    }
                };

                if invocations.observe(&node_id, status) {
                    debug!(node_id = %node_id, status = %status, "Invocation status changed");
                }

                if status.is_terminal() && !status.is_success() {
                    let failed = invocations.failed();
                    warn!(node_id = %node_id, status = %status, "Command failed on node");
                    return Err(CommandError::NodeFailed {
                        command_id: command_id.clone(),
                        failed,
                    });
                }
            }

            if invocations.all_succeeded() {
                info!("Command succeeded on all nodes");
                return Ok(CommandReport {
                    command_id: command_id.clone(),
                    document: document.to_string(),
                    statuses: invocations.statuses(),
                });
            }

            let now = Instant::now();
            if now >= deadline {
                let pending = invocations.pending();
                warn!(pending = pending.len(), "Command timed out");
                return Err(CommandError::TimedOut {
                    command_id: command_id.clone(),
                    pending,
                });
            }

            let delay = self.backoff.delay(attempt).min(deadline - now);
            attempt = attempt.saturating_add(1);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown_requested(shutdown) => {
                    info!("Stopped waiting, command left running");
                    return Err(cancelled(command_id));
                }
            }
        }
    }

    /// Dispatch `document` and wait for it to finish on every node.
    pub async fn run(
        &self,
        document: &CommandDocument,
        nodes: &[InstanceId],
        timeout: Duration,
        shutdown: &mut watch::Receiver<bool>,
    ) -> CommandResult<CommandReport> {
        let command_id = self.dispatch(document, nodes).await?;
        self.await_completion(&command_id, &document.name, nodes, timeout, shutdown)
            .await
    }
}

fn cancelled(command_id: &CommandId) -> CommandError {
    CommandError::Cancelled {
        waiting_for: format!("command {command_id}"),
    }
}

/// Resolves once `shutdown` reads true. Never resolves if the sender is gone.
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

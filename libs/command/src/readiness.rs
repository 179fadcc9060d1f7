//! Waiting for nodes to accept commands.

use std::collections::BTreeSet;
use std::time::Duration;

use fleet_id::InstanceId;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::dispatcher::{shutdown_requested, CommandDispatcher};
use crate::error::{CommandError, CommandResult};

impl CommandDispatcher {
    /// Poll instance status until every node is running with passing checks.
    #[instrument(skip_all, fields(nodes = nodes.len()))]
    pub async fn wait_until_ready(
        &self,
        nodes: &[InstanceId],
        timeout: Duration,
        shutdown: &mut watch::Receiver<bool>,
    ) -> CommandResult<()> {
        let deadline = Instant::now() + timeout;
        let mut pending: Vec<InstanceId> = nodes.to_vec();
        let mut attempt = 0u32;

        loop {
            if *shutdown.borrow() {
                return Err(CommandError::Cancelled {
                    waiting_for: "node readiness".to_string(),
                });
            }

            match self.provider.describe_instance_status(nodes).await {
                Ok(statuses) => {
                    let ready: BTreeSet<&InstanceId> = statuses
                        .iter()
                        .filter(|s| s.is_ready())
                        .map(|s| &s.instance_id)
                        .collect();
                    pending = nodes
                        .iter()
                        .filter(|node| !ready.contains(node))
                        .cloned()
                        .collect();
                }
                Err(e) if e.is_transient() => {
                    warn!(error = %e, "Transient status failure, will retry");
                }
                Err(e) => return Err(e.into()),
            }

            if pending.is_empty() {
                info!("All nodes ready");
                return Ok(());
            }
            debug!(pending = pending.len(), "Waiting for nodes");

            let now = Instant::now();
            if now >= deadline {
                return Err(CommandError::NodesNotReady { pending });
            }

            let delay = self.backoff.delay(attempt).min(deadline - now);
            attempt = attempt.saturating_add(1);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown_requested(shutdown) => {
                    return Err(CommandError::Cancelled {
                        waiting_for: "node readiness".to_string(),
                    });
                }
            }
        }
    }
}

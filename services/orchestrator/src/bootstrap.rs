//! Cluster bootstrap.
//!
//! Converges the cluster's resources in dependency order (instance profile,
//! key pair, subnets, security group), then installs and configures the
//! monitoring agent on every node and publishes the dashboard and alarms.
//! Every step waits for the previous one; the first error stops the run.
//! Shutdown is checked before each resource and throughout every wait.

use std::sync::Arc;
use std::time::Duration;

use fleet_command::{BackoffPolicy, CommandDispatcher, CommandDocument, CommandReport};
use fleet_id::{SecurityGroupId, SubnetId, VpcId};
use fleet_monitoring::{MonitoringPublisher, MonitoringTemplates};
use fleet_provider::CloudProvider;
use fleet_reconcile::{
    KeyMaterialStore, ReconcileAction, Reconciler, ResourceDescriptor, ResourceHandle,
    ResourceKind,
};
use tokio::sync::watch;
use tracing::{info, instrument};

use crate::cluster::ClusterConfig;
use crate::counting::CountingProvider;
use crate::error::{OrchestratorError, OrchestratorResult};

/// Timing for remote commands.
#[derive(Debug, Clone)]
pub struct BootstrapSettings {
    /// Deadline for node readiness and for each command.
    pub command_timeout: Duration,
    pub backoff: BackoffPolicy,
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(600),
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Identities of the converged cluster resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterResources {
    pub instance_profile_arn: String,
    pub key_name: String,
    pub subnet_ids: Vec<SubnetId>,
    pub vpc_id: VpcId,
    pub security_group_id: SecurityGroupId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoringReport {
    pub agent_config_changed: bool,
    pub dashboard_widgets: usize,
    pub alarms: usize,
}

/// Everything a bootstrap run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub resources: ClusterResources,
    pub actions: Vec<(ResourceKind, ReconcileAction)>,
    pub commands: Vec<CommandReport>,
    pub monitoring: Option<MonitoringReport>,

    /// Mutating provider calls issued during this run.
    pub mutating_calls: usize,
}

impl BootstrapReport {
    /// Returns true if the run changed nothing on the provider.
    pub fn is_noop(&self) -> bool {
        self.mutating_calls == 0
    }
}

pub struct Bootstrapper {
    provider: Arc<CountingProvider>,
    keys: Arc<dyn KeyMaterialStore>,
    settings: BootstrapSettings,
}

impl Bootstrapper {
    pub fn new(
        provider: Arc<dyn CloudProvider>,
        keys: Arc<dyn KeyMaterialStore>,
        settings: BootstrapSettings,
    ) -> Self {
        Self {
            provider: Arc::new(CountingProvider::new(provider)),
            keys,
            settings,
        }
    }

    fn provider(&self) -> Arc<dyn CloudProvider> {
        Arc::clone(&self.provider) as Arc<dyn CloudProvider>
    }

    /// Bootstrap `cluster`. Monitoring runs only when `templates` is given.
    #[instrument(skip_all, fields(cluster = %cluster.cluster_name))]
    pub async fn run(
        &self,
        cluster: &ClusterConfig,
        templates: Option<&MonitoringTemplates>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> OrchestratorResult<BootstrapReport> {
        let before = self.provider.mutating_calls();

        let (resources, actions) = self.reconcile_resources(cluster, shutdown).await?;

        let mut commands = Vec::new();
        let monitoring = match templates {
            Some(templates) => Some(
                self.install_monitoring(cluster, templates, shutdown, &mut commands)
                    .await?,
            ),
            None => None,
        };

        let report = BootstrapReport {
            resources,
            actions,
            commands,
            monitoring,
            mutating_calls: self.provider.mutating_calls() - before,
        };
        info!(
            mutating_calls = report.mutating_calls,
            commands = report.commands.len(),
            "Bootstrap complete"
        );
        Ok(report)
    }

    /// Converge profile, key pair, subnets and security group, in that order.
    ///
    /// Stops before the next resource once `shutdown` reads true. A call
    /// already in flight is allowed to finish.
    pub async fn reconcile_resources(
        &self,
        cluster: &ClusterConfig,
        shutdown: &watch::Receiver<bool>,
    ) -> OrchestratorResult<(ClusterResources, Vec<(ResourceKind, ReconcileAction)>)> {
        let reconciler = Reconciler::new(self.provider(), Arc::clone(&self.keys));
        let mut steps = Steps {
            reconciler: &reconciler,
            shutdown,
            actions: Vec::new(),
        };

        let profile = steps
            .converge(cluster.instance_profile_descriptor())
            .await?;
        let ResourceHandle::InstanceProfile { arn, .. } = profile else {
            return Err(OrchestratorError::UnexpectedHandle(ResourceKind::InstanceProfile));
        };

        let key_pair = steps.converge(cluster.key_pair_descriptor()).await?;
        let ResourceHandle::KeyPair { name: key_name } = key_pair else {
            return Err(OrchestratorError::UnexpectedHandle(ResourceKind::KeyPair));
        };

        let subnets = steps.converge(cluster.subnet_descriptor()).await?;
        let ResourceHandle::Subnets { subnet_ids, vpc_id } = subnets else {
            return Err(OrchestratorError::UnexpectedHandle(ResourceKind::Subnet));
        };

        let group = steps
            .converge(cluster.security_group_descriptor(&vpc_id))
            .await?;
        let ResourceHandle::SecurityGroup { group_id } = group else {
            return Err(OrchestratorError::UnexpectedHandle(ResourceKind::SecurityGroup));
        };

        let resources = ClusterResources {
            instance_profile_arn: arn,
            key_name,
            subnet_ids,
            vpc_id,
            security_group_id: group_id,
        };
        info!(
            security_group_id = %resources.security_group_id,
            vpc_id = %resources.vpc_id,
            subnets = resources.subnet_ids.len(),
            "Cluster resources converged"
        );
        Ok((resources, steps.actions))
    }

    /// Install, configure and publish monitoring for the cluster's nodes.
    async fn install_monitoring(
        &self,
        cluster: &ClusterConfig,
        templates: &MonitoringTemplates,
        shutdown: &mut watch::Receiver<bool>,
        commands: &mut Vec<CommandReport>,
    ) -> OrchestratorResult<MonitoringReport> {
        let Some(settings) = cluster.publisher_settings() else {
            return Err(OrchestratorError::InvalidManifest(
                "monitoring templates given without a [monitoring] section".to_string(),
            ));
        };
        let nodes = &cluster.node_ids;
        let timeout = self.settings.command_timeout;

        let dispatcher =
            CommandDispatcher::new(self.provider()).with_backoff(self.settings.backoff.clone());
        let publisher = MonitoringPublisher::new(self.provider(), settings);

        dispatcher
            .wait_until_ready(nodes, timeout, shutdown)
            .await
            .map_err(OrchestratorError::command("node readiness"))?;

        commands.push(
            dispatcher
                .run(&CommandDocument::install_agent(), nodes, timeout, shutdown)
                .await
                .map_err(OrchestratorError::command("agent install"))?,
        );

        let update = publisher
            .publish_agent_config(&templates.agent_config, nodes)
            .await?;

        commands.push(
            dispatcher
                .run(&CommandDocument::init_collectd(), nodes, timeout, shutdown)
                .await
                .map_err(OrchestratorError::command("collectd init"))?,
        );

        if update.changed {
            let configure = CommandDocument::configure_agent(&update.parameter_name);
            commands.push(
                dispatcher
                    .run(&configure, nodes, timeout, shutdown)
                    .await
                    .map_err(OrchestratorError::command("agent configure"))?,
            );
            publisher.record_agent_config(&update).await?;
        } else {
            info!(hash = %update.hash, "Agent config unchanged, skipping restart");
        }

        let dashboard_widgets = publisher
            .publish_dashboard(&templates.dashboard, nodes)
            .await?;
        let alarms = publisher.publish_alarms(&templates.alarms, nodes).await?;

        Ok(MonitoringReport {
            agent_config_changed: update.changed,
            dashboard_widgets,
            alarms,
        })
    }
}

/// Resource convergence in order, with the actions taken so far.
struct Steps<'a> {
    reconciler: &'a Reconciler,
    shutdown: &'a watch::Receiver<bool>,
    actions: Vec<(ResourceKind, ReconcileAction)>,
}

impl Steps<'_> {
    async fn converge(
        &mut self,
        descriptor: ResourceDescriptor,
    ) -> OrchestratorResult<ResourceHandle> {
        let kind = descriptor.kind();
        if *self.shutdown.borrow() {
            info!(resource = %kind, "Shutdown requested, stopping");
            return Err(OrchestratorError::Interrupted(kind));
        }

        let reconciled = self.reconciler.converge(&descriptor).await?;
        self.actions.push((kind, reconciled.action));
        Ok(reconciled.handle)
    }
}

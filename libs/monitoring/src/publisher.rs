//! Publishing rendered monitoring configuration.

use std::sync::Arc;

use fleet_id::InstanceId;
use fleet_provider::request::{PutDashboardInput, PutParameterInput};
use fleet_provider::CloudProvider;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::error::{PublishError, PublishResult};
use crate::hash::ConfigHash;
use crate::render::{
    alarm_name, dashboard_body, render_agent_config, render_alarms, render_dashboard,
};

/// Parameter type used for agent configuration.
const PARAMETER_TYPE: &str = "String";

/// Where and under which names a cluster's monitoring is published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherSettings {
    pub cluster_name: String,
    pub region: String,
    pub dashboard_name: String,
    pub parameter_base: String,
}

/// Result of publishing the agent configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfigUpdate {
    pub parameter_name: String,
    pub hash: ConfigHash,

    /// False if the stored hash already matched and nothing was written.
    pub changed: bool,
}

/// Renders templates for one cluster and publishes them.
#[derive(Clone)]
pub struct MonitoringPublisher {
    provider: Arc<dyn CloudProvider>,
    settings: PublisherSettings,
}

impl MonitoringPublisher {
    pub fn new(provider: Arc<dyn CloudProvider>, settings: PublisherSettings) -> Self {
        Self { provider, settings }
    }

    pub fn settings(&self) -> &PublisherSettings {
        &self.settings
    }

    /// `<base>_<cluster>`, read by the agent on configure.
    pub fn agent_parameter_name(&self) -> String {
        format!(
            "{}_{}",
            self.settings.parameter_base, self.settings.cluster_name
        )
    }

    /// Parameter holding the hash of the last applied agent configuration
    /// and node set.
    pub fn hash_parameter_name(&self) -> String {
        format!("{}_hash", self.agent_parameter_name())
    }

    /// Hash of the last applied agent configuration, if any.
    pub async fn stored_hash(&self) -> PublishResult<Option<ConfigHash>> {
        let parameter = self.hash_parameter_name();
        let stored = self
            .provider
            .get_parameter(&parameter)
            .await
            .map_err(|source| PublishError::ParameterLookup { parameter, source })?;
        Ok(stored.map(|p| ConfigHash::from_stored(p.value)))
    }

    /// Render the agent configuration and write it unless the stored hash
    /// shows it was already applied to exactly `nodes`.
    ///
    /// A node joining or leaving the cluster counts as a change, so nodes
    /// that never loaded the configuration are always configured.
    #[instrument(skip_all, fields(cluster = %self.settings.cluster_name, nodes = nodes.len()))]
    pub async fn publish_agent_config(
        &self,
        template: &Value,
        nodes: &[InstanceId],
    ) -> PublishResult<AgentConfigUpdate> {
        let rendered = render_agent_config(
            template,
            &self.settings.cluster_name,
            &self.settings.region,
        );
        let hash = ConfigHash::applied(&rendered, nodes);
        let parameter_name = self.agent_parameter_name();

        if self.stored_hash().await?.as_ref() == Some(&hash) {
            debug!(parameter = %parameter_name, hash = %hash, "Agent config unchanged");
            return Ok(AgentConfigUpdate {
                parameter_name,
                hash,
                changed: false,
            });
        }

        self.put_parameter(&parameter_name, rendered.to_string())
            .await?;

        info!(parameter = %parameter_name, hash = %hash, "Published agent config");
        Ok(AgentConfigUpdate {
            parameter_name,
            hash,
            changed: true,
        })
    }

    /// Store the hash of an applied configuration. Call after the agent has
    /// picked it up, so a failed restart is retried on the next run.
    pub async fn record_agent_config(&self, update: &AgentConfigUpdate) -> PublishResult<()> {
        if !update.changed {
            return Ok(());
        }
        self.put_parameter(&self.hash_parameter_name(), update.hash.to_string())
            .await
    }

    /// Render and publish the cluster dashboard. Returns the widget count.
    #[instrument(skip_all, fields(dashboard = %self.settings.dashboard_name, nodes = nodes.len()))]
    pub async fn publish_dashboard(
        &self,
        template: &[Value],
        nodes: &[InstanceId],
    ) -> PublishResult<usize> {
        let widgets = render_dashboard(
            template,
            nodes,
            &self.settings.cluster_name,
            &self.settings.region,
        );

        self.provider
            .put_dashboard(PutDashboardInput {
                dashboard_name: self.settings.dashboard_name.clone(),
                dashboard_body: dashboard_body(&widgets),
            })
            .await
            .map_err(|source| {
                PublishError::rejected(format!("dashboard {}", self.settings.dashboard_name), source)
            })?;

        info!(widgets = widgets.len(), "Published dashboard");
        Ok(widgets.len())
    }

    /// Render and publish one alarm per (node, alarm). Returns the count.
    #[instrument(skip_all, fields(cluster = %self.settings.cluster_name, nodes = nodes.len()))]
    pub async fn publish_alarms(
        &self,
        template: &[Value],
        nodes: &[InstanceId],
    ) -> PublishResult<usize> {
        let alarms = render_alarms(
            template,
            nodes,
            &self.settings.cluster_name,
            &self.settings.region,
        );

        for alarm in &alarms {
            let name = alarm_name(&alarm.value).to_string();
            self.provider
                .put_metric_alarm(alarm.value.clone())
                .await
                .map_err(|source| {
                    PublishError::rejected(format!("alarm {name} for {}", alarm.node_id), source)
                })?;
            debug!(alarm = %name, node_id = %alarm.node_id, "Published alarm");
        }

        info!(alarms = alarms.len(), "Published alarms");
        Ok(alarms.len())
    }

    async fn put_parameter(&self, name: &str, value: String) -> PublishResult<()> {
        self.provider
            .put_parameter(PutParameterInput {
                name: name.to_string(),
                parameter_type: PARAMETER_TYPE.to_string(),
                value,
                overwrite: true,
            })
            .await
            .map_err(|source| PublishError::rejected(format!("parameter {name}"), source))
    }
}

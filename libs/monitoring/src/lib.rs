//! Monitoring configuration for fleet clusters.
//!
//! Templates for the agent configuration, the cluster dashboard and the
//! per-node alarms are rendered by substituting `{instance_id}`,
//! `{cluster_name}` and `{region}`, then published to the provider.
//! Rendering is pure; only [`MonitoringPublisher`] talks to the provider.

mod error;
mod hash;
mod publisher;
mod render;
mod template;
mod templates;

pub use error::{PublishError, PublishResult};
pub use hash::{canonical_json, ConfigHash};
pub use publisher::{AgentConfigUpdate, MonitoringPublisher, PublisherSettings};
pub use render::{
    alarm_name, dashboard_body, render_agent_config, render_alarms, render_dashboard, RenderedItem,
};
pub use template::{substitute, Bindings, CLUSTER_NAME, INSTANCE_ID, REGION};
pub use templates::{MonitoringTemplates, TemplatePaths};

//! Cluster manifest.
//!
//! A TOML file describing the resources a cluster needs and, optionally, how
//! it is monitored. Template paths are relative to the manifest's directory.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use fleet_id::{InstanceId, SecurityGroupId, SubnetId, VpcId};
use fleet_monitoring::{PublisherSettings, TemplatePaths};
use fleet_reconcile::{
    GroupIdentity, InstanceProfileDescriptor, KeyPairDescriptor, ResourceDescriptor,
    SecurityGroupDescriptor, SecurityGroupRule, SubnetDescriptor,
};
use fleet_provider::model::PermissionSource;
use serde::Deserialize;

use crate::error::{OrchestratorError, OrchestratorResult};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterConfig {
    pub cluster_name: String,
    pub region: String,

    /// Nodes that receive the monitoring agent.
    #[serde(default)]
    pub node_ids: Vec<InstanceId>,

    pub instance_profile: String,
    pub key_pair: String,

    #[serde(default)]
    pub subnets: SubnetConfig,

    pub security_group: SecurityGroupConfig,

    #[serde(default)]
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubnetConfig {
    #[serde(default)]
    pub ids: Vec<SubnetId>,
    pub vpc_id: Option<VpcId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityGroupConfig {
    pub name: String,

    /// Defaults to "Security group for <cluster> nodes".
    pub description: Option<String>,

    /// VPC to create the group in. Defaults to the subnets' VPC.
    pub vpc_id: Option<VpcId>,

    #[serde(default)]
    pub exclusive_ingress: bool,

    #[serde(default)]
    pub ingress: Vec<IngressRuleConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngressRuleConfig {
    #[serde(default = "default_protocol")]
    pub protocol: String,
    pub from_port: Option<i32>,
    pub to_port: Option<i32>,
    pub cidr: Option<String>,
    pub source_group: Option<SecurityGroupId>,
}

fn default_protocol() -> String {
    "tcp".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitoringConfig {
    pub agent_config: PathBuf,
    pub dashboard: PathBuf,
    pub alarms: PathBuf,
    pub dashboard_name: String,

    #[serde(default = "default_parameter_base")]
    pub parameter_base: String,
}

fn default_parameter_base() -> String {
    "fleet_cloudwatch_agent_config".to_string()
}

impl ClusterConfig {
    /// Read a manifest and resolve template paths against its directory.
    pub fn load(path: &Path) -> OrchestratorResult<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| OrchestratorError::ManifestRead {
                path: path.to_path_buf(),
                source,
            })?;

        let mut config = Self::from_toml_str(&contents)?;
        if let (Some(monitoring), Some(base)) = (config.monitoring.as_mut(), path.parent()) {
            monitoring.agent_config = base.join(&monitoring.agent_config);
            monitoring.dashboard = base.join(&monitoring.dashboard);
            monitoring.alarms = base.join(&monitoring.alarms);
        }
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> OrchestratorResult<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> OrchestratorResult<()> {
        if self.cluster_name.is_empty() {
            return Err(OrchestratorError::InvalidManifest(
                "cluster_name must not be empty".to_string(),
            ));
        }
        for (i, rule) in self.security_group.ingress.iter().enumerate() {
            if rule.cidr.is_some() == rule.source_group.is_some() {
                return Err(OrchestratorError::InvalidManifest(format!(
                    "security_group.ingress[{i}] needs exactly one of cidr or source_group"
                )));
            }
        }
        if self.monitoring.is_some() && self.node_ids.is_empty() {
            return Err(OrchestratorError::InvalidManifest(
                "monitoring requires at least one node id".to_string(),
            ));
        }
        Ok(())
    }

    pub fn instance_profile_descriptor(&self) -> ResourceDescriptor {
        ResourceDescriptor::InstanceProfile(InstanceProfileDescriptor {
            name: self.instance_profile.clone(),
        })
    }

    pub fn key_pair_descriptor(&self) -> ResourceDescriptor {
        ResourceDescriptor::KeyPair(KeyPairDescriptor {
            name: self.key_pair.clone(),
        })
    }

    pub fn subnet_descriptor(&self) -> ResourceDescriptor {
        ResourceDescriptor::Subnet(SubnetDescriptor {
            subnet_ids: self.subnets.ids.clone(),
            vpc_id: self.subnets.vpc_id.clone(),
        })
    }

    /// The security group, placed in `subnet_vpc` unless a VPC is configured.
    pub fn security_group_descriptor(&self, subnet_vpc: &VpcId) -> ResourceDescriptor {
        let sg = &self.security_group;
        let description = sg
            .description
            .clone()
            .unwrap_or_else(|| format!("Security group for {} nodes", self.cluster_name));

        ResourceDescriptor::SecurityGroup(SecurityGroupDescriptor {
            identity: GroupIdentity::Named {
                name: sg.name.clone(),
                vpc_id: sg.vpc_id.clone().unwrap_or_else(|| subnet_vpc.clone()),
            },
            description,
            ingress: self.ingress_rules(),
            exclusive_ingress: sg.exclusive_ingress,
        })
    }

    fn ingress_rules(&self) -> BTreeSet<SecurityGroupRule> {
        self.security_group
            .ingress
            .iter()
            .filter_map(|rule| {
                let source = match (&rule.cidr, &rule.source_group) {
                    (Some(cidr), _) => PermissionSource::Cidr(cidr.clone()),
                    (None, Some(group)) => PermissionSource::Group(group.clone()),
                    (None, None) => return None,
                };
                Some(SecurityGroupRule {
                    protocol: rule.protocol.clone(),
                    from_port: rule.from_port,
                    to_port: rule.to_port.or(rule.from_port),
                    source,
                })
            })
            .collect()
    }

    pub fn template_paths(&self) -> Option<TemplatePaths> {
        self.monitoring.as_ref().map(|m| TemplatePaths {
            agent_config: m.agent_config.clone(),
            dashboard: m.dashboard.clone(),
            alarms: m.alarms.clone(),
        })
    }

    pub fn publisher_settings(&self) -> Option<PublisherSettings> {
        self.monitoring.as_ref().map(|m| PublisherSettings {
            cluster_name: self.cluster_name.clone(),
            region: self.region.clone(),
            dashboard_name: m.dashboard_name.clone(),
            parameter_base: m.parameter_base.clone(),
        })
    }
}

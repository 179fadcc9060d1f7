//! Wire types shared by requests and responses.
//!
//! Field names follow the provider's PascalCase convention so a request body
//! serializes to exactly the parameters the provider expects.

use std::collections::BTreeSet;

use fleet_id::{CommandId, InstanceId, SecurityGroupId, SubnetId, VpcId};
use serde::{Deserialize, Serialize};

// =============================================================================
// Query Filters
// =============================================================================

/// A `Describe*` filter: one attribute name and the values it may take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Filter {
    pub name: String,
    pub values: Vec<String>,
}

impl Filter {
    /// Create a filter.
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

// =============================================================================
// IAM
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceProfile {
    pub instance_profile_name: String,
    pub arn: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Role {
    pub role_name: String,
    pub arn: String,
}

// =============================================================================
// Key Pairs
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyPair {
    pub key_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_fingerprint: Option<String>,
}

// =============================================================================
// Subnets
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Subnet {
    pub subnet_id: SubnetId,
    pub vpc_id: VpcId,
    #[serde(default)]
    pub availability_zone: String,
    #[serde(default = "default_subnet_state")]
    pub state: String,
}

fn default_subnet_state() -> String {
    "available".to_string()
}

impl Subnet {
    /// Returns true if instances can be launched into this subnet.
    pub fn is_available(&self) -> bool {
        self.state == "available"
    }
}

// =============================================================================
// Security Groups
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecurityGroup {
    pub group_id: SecurityGroupId,
    pub group_name: String,
    #[serde(default)]
    pub description: String,
    pub vpc_id: VpcId,
    #[serde(default)]
    pub ip_permissions: Vec<IpPermission>,
}

/// One permission block as the provider stores it.
///
/// A single block can carry several sources; see
/// [`IpPermission::sources`] for the flattened view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IpPermission {
    pub ip_protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_port: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_port: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_ranges: Vec<IpRange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_id_group_pairs: Vec<UserIdGroupPair>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IpRange {
    pub cidr_ip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserIdGroupPair {
    pub group_id: SecurityGroupId,
}

/// Where permitted traffic may come from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PermissionSource {
    Cidr(String),
    Group(SecurityGroupId),
}

impl IpPermission {
    /// Flatten this block into its individual sources.
    pub fn sources(&self) -> BTreeSet<PermissionSource> {
        let cidrs = self
            .ip_ranges
            .iter()
            .map(|r| PermissionSource::Cidr(r.cidr_ip.clone()));
        let groups = self
            .user_id_group_pairs
            .iter()
            .map(|p| PermissionSource::Group(p.group_id.clone()));
        cidrs.chain(groups).collect()
    }
}

// =============================================================================
// Instance Status
// =============================================================================

/// Instance state code the provider uses for "running".
pub const INSTANCE_STATE_RUNNING: i32 = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceStatus {
    pub instance_id: InstanceId,
    pub instance_state: InstanceState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    pub system_status: StatusSummary,
    pub instance_status: StatusSummary,
}

impl InstanceStatus {
    /// Running, with both reachability checks passing.
    pub fn is_ready(&self) -> bool {
        self.instance_state.code == INSTANCE_STATE_RUNNING
            && self.system_status.is_ok()
            && self.instance_status.is_ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceState {
    pub code: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusSummary {
    pub status: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<StatusDetail>,
}

impl StatusSummary {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusDetail {
    pub name: String,
    pub status: String,
}

// =============================================================================
// Remote Commands
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Command {
    pub command_id: CommandId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,
}

/// Status of a single node's invocation as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvocationStatus {
    Pending,
    InProgress,
    Delayed,
    Success,
    Cancelling,
    Cancelled,
    TimedOut,
    Failed,
}

impl InvocationStatus {
    /// Returns true if no further transition can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::Cancelled | Self::TimedOut | Self::Failed
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for InvocationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::InProgress => "InProgress",
            Self::Delayed => "Delayed",
            Self::Success => "Success",
            Self::Cancelling => "Cancelling",
            Self::Cancelled => "Cancelled",
            Self::TimedOut => "TimedOut",
            Self::Failed => "Failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CommandInvocationSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<InstanceId>,
    pub status: InvocationStatus,
}

// =============================================================================
// Parameters
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

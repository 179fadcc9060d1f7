//! Provider operations: one request and one response variant per call.
//!
//! Requests serialize as `{"Action": "<Operation>", "Params": {...}}`; the
//! `Params` object holds exactly the parameters the provider receives. Two
//! requests are equal iff the provider would see the same call.

use std::collections::BTreeMap;

use fleet_id::{CommandId, InstanceId, SecurityGroupId, VpcId};
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, ProviderResult};
use crate::model::{
    Command, CommandInvocationSummary, Filter, InstanceProfile, InstanceStatus, IpPermission,
    KeyPair, Parameter, SecurityGroup, Subnet,
};

// =============================================================================
// Operations
// =============================================================================

/// Provider operation names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    GetInstanceProfile,
    CreateInstanceProfile,
    DescribeKeyPairs,
    CreateKeyPair,
    DescribeSubnets,
    DescribeSecurityGroups,
    CreateSecurityGroup,
    AuthorizeSecurityGroupIngress,
    RevokeSecurityGroupIngress,
    DescribeInstanceStatus,
    SendCommand,
    ListCommandInvocations,
    PutParameter,
    GetParameter,
    PutDashboard,
    PutMetricAlarm,
}

impl Operation {
    /// Returns true if the operation changes provider state.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::CreateInstanceProfile
                | Self::CreateKeyPair
                | Self::CreateSecurityGroup
                | Self::AuthorizeSecurityGroupIngress
                | Self::RevokeSecurityGroupIngress
                | Self::SendCommand
                | Self::PutParameter
                | Self::PutDashboard
                | Self::PutMetricAlarm
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetInstanceProfile => "GetInstanceProfile",
            Self::CreateInstanceProfile => "CreateInstanceProfile",
            Self::DescribeKeyPairs => "DescribeKeyPairs",
            Self::CreateKeyPair => "CreateKeyPair",
            Self::DescribeSubnets => "DescribeSubnets",
            Self::DescribeSecurityGroups => "DescribeSecurityGroups",
            Self::CreateSecurityGroup => "CreateSecurityGroup",
            Self::AuthorizeSecurityGroupIngress => "AuthorizeSecurityGroupIngress",
            Self::RevokeSecurityGroupIngress => "RevokeSecurityGroupIngress",
            Self::DescribeInstanceStatus => "DescribeInstanceStatus",
            Self::SendCommand => "SendCommand",
            Self::ListCommandInvocations => "ListCommandInvocations",
            Self::PutParameter => "PutParameter",
            Self::GetParameter => "GetParameter",
            Self::PutDashboard => "PutDashboard",
            Self::PutMetricAlarm => "PutMetricAlarm",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceProfileInput {
    pub instance_profile_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeKeyPairsInput {
    pub filters: Vec<Filter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateKeyPairInput {
    pub key_name: String,
}

/// An empty filter list means "every subnet in the account" and is omitted
/// from the request entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeSubnetsInput {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeSecurityGroupsInput {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub group_ids: Vec<SecurityGroupId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateSecurityGroupInput {
    pub description: String,
    pub group_name: String,
    pub vpc_id: VpcId,
}

/// Shared by authorize and revoke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IngressInput {
    pub group_id: SecurityGroupId,
    pub ip_permissions: Vec<IpPermission>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeInstanceStatusInput {
    pub instance_ids: Vec<InstanceId>,
}

/// Concurrency and error limits travel as strings on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SendCommandInput {
    pub document_name: String,
    pub instance_ids: Vec<InstanceId>,
    pub max_concurrency: String,
    pub max_errors: String,
    pub parameters: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListCommandInvocationsInput {
    pub command_id: CommandId,
    pub instance_id: InstanceId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutParameterInput {
    pub name: String,
    #[serde(rename = "Type")]
    pub parameter_type: String,
    pub value: String,
    pub overwrite: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetParameterInput {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutDashboardInput {
    pub dashboard_name: String,
    pub dashboard_body: String,
}

/// A provider request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "Action", content = "Params")]
pub enum ProviderRequest {
    GetInstanceProfile(InstanceProfileInput),
    CreateInstanceProfile(InstanceProfileInput),
    DescribeKeyPairs(DescribeKeyPairsInput),
    CreateKeyPair(CreateKeyPairInput),
    DescribeSubnets(DescribeSubnetsInput),
    DescribeSecurityGroups(DescribeSecurityGroupsInput),
    CreateSecurityGroup(CreateSecurityGroupInput),
    AuthorizeSecurityGroupIngress(IngressInput),
    RevokeSecurityGroupIngress(IngressInput),
    DescribeInstanceStatus(DescribeInstanceStatusInput),
    SendCommand(SendCommandInput),
    ListCommandInvocations(ListCommandInvocationsInput),
    PutParameter(PutParameterInput),
    GetParameter(GetParameterInput),
    PutDashboard(PutDashboardInput),
    /// The alarm definition is forwarded verbatim.
    PutMetricAlarm(serde_json::Value),
}

impl ProviderRequest {
    /// The operation this request invokes.
    pub fn operation(&self) -> Operation {
        match self {
            Self::GetInstanceProfile(_) => Operation::GetInstanceProfile,
            Self::CreateInstanceProfile(_) => Operation::CreateInstanceProfile,
            Self::DescribeKeyPairs(_) => Operation::DescribeKeyPairs,
            Self::CreateKeyPair(_) => Operation::CreateKeyPair,
            Self::DescribeSubnets(_) => Operation::DescribeSubnets,
            Self::DescribeSecurityGroups(_) => Operation::DescribeSecurityGroups,
            Self::CreateSecurityGroup(_) => Operation::CreateSecurityGroup,
            Self::AuthorizeSecurityGroupIngress(_) => Operation::AuthorizeSecurityGroupIngress,
            Self::RevokeSecurityGroupIngress(_) => Operation::RevokeSecurityGroupIngress,
            Self::DescribeInstanceStatus(_) => Operation::DescribeInstanceStatus,
            Self::SendCommand(_) => Operation::SendCommand,
            Self::ListCommandInvocations(_) => Operation::ListCommandInvocations,
            Self::PutParameter(_) => Operation::PutParameter,
            Self::GetParameter(_) => Operation::GetParameter,
            Self::PutDashboard(_) => Operation::PutDashboard,
            Self::PutMetricAlarm(_) => Operation::PutMetricAlarm,
        }
    }

    /// The request parameters as the provider receives them.
    pub fn params(&self) -> serde_json::Value {
        serde_json::to_value(self)
            .ok()
            .and_then(|mut v| v.get_mut("Params").map(serde_json::Value::take))
            .unwrap_or(serde_json::Value::Null)
    }
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceProfileOutput {
    pub instance_profile: InstanceProfile,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeKeyPairsOutput {
    #[serde(default)]
    pub key_pairs: Vec<KeyPair>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateKeyPairOutput {
    pub key_name: String,
    pub key_material: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeSubnetsOutput {
    #[serde(default)]
    pub subnets: Vec<Subnet>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeSecurityGroupsOutput {
    #[serde(default)]
    pub security_groups: Vec<SecurityGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateSecurityGroupOutput {
    pub group_id: SecurityGroupId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeInstanceStatusOutput {
    #[serde(default)]
    pub instance_statuses: Vec<InstanceStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SendCommandOutput {
    pub command: Command,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListCommandInvocationsOutput {
    #[serde(default)]
    pub command_invocations: Vec<CommandInvocationSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetParameterOutput {
    pub parameter: Parameter,
}

/// A provider response.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResponse {
    GetInstanceProfile(InstanceProfileOutput),
    CreateInstanceProfile(InstanceProfileOutput),
    DescribeKeyPairs(DescribeKeyPairsOutput),
    CreateKeyPair(CreateKeyPairOutput),
    DescribeSubnets(DescribeSubnetsOutput),
    DescribeSecurityGroups(DescribeSecurityGroupsOutput),
    CreateSecurityGroup(CreateSecurityGroupOutput),
    DescribeInstanceStatus(DescribeInstanceStatusOutput),
    SendCommand(SendCommandOutput),
    ListCommandInvocations(ListCommandInvocationsOutput),
    GetParameter(GetParameterOutput),
    /// Acknowledgement with no payload we care about.
    Ack(Operation),
}

impl ProviderResponse {
    /// The operation this response answers.
    pub fn operation(&self) -> Operation {
        match self {
            Self::GetInstanceProfile(_) => Operation::GetInstanceProfile,
            Self::CreateInstanceProfile(_) => Operation::CreateInstanceProfile,
            Self::DescribeKeyPairs(_) => Operation::DescribeKeyPairs,
            Self::CreateKeyPair(_) => Operation::CreateKeyPair,
            Self::DescribeSubnets(_) => Operation::DescribeSubnets,
            Self::DescribeSecurityGroups(_) => Operation::DescribeSecurityGroups,
            Self::CreateSecurityGroup(_) => Operation::CreateSecurityGroup,
            Self::DescribeInstanceStatus(_) => Operation::DescribeInstanceStatus,
            Self::SendCommand(_) => Operation::SendCommand,
            Self::ListCommandInvocations(_) => Operation::ListCommandInvocations,
            Self::GetParameter(_) => Operation::GetParameter,
            Self::Ack(op) => *op,
        }
    }

    /// Decode a response body for the given operation.
    ///
    /// Acknowledgement-only operations ignore the body.
    pub fn from_json(operation: Operation, body: serde_json::Value) -> ProviderResult<Self> {
        fn decode<T: serde::de::DeserializeOwned>(
            operation: Operation,
            body: serde_json::Value,
        ) -> ProviderResult<T> {
            serde_json::from_value(body).map_err(|source| ProviderError::Decode { operation, source })
        }

        let response = match operation {
            Operation::GetInstanceProfile => Self::GetInstanceProfile(decode(operation, body)?),
            Operation::CreateInstanceProfile => {
                Self::CreateInstanceProfile(decode(operation, body)?)
            }
            Operation::DescribeKeyPairs => Self::DescribeKeyPairs(decode(operation, body)?),
            Operation::CreateKeyPair => Self::CreateKeyPair(decode(operation, body)?),
            Operation::DescribeSubnets => Self::DescribeSubnets(decode(operation, body)?),
            Operation::DescribeSecurityGroups => {
                Self::DescribeSecurityGroups(decode(operation, body)?)
            }
            Operation::CreateSecurityGroup => Self::CreateSecurityGroup(decode(operation, body)?),
            Operation::DescribeInstanceStatus => {
                Self::DescribeInstanceStatus(decode(operation, body)?)
            }
            Operation::SendCommand => Self::SendCommand(decode(operation, body)?),
            Operation::ListCommandInvocations => {
                Self::ListCommandInvocations(decode(operation, body)?)
            }
            Operation::GetParameter => Self::GetParameter(decode(operation, body)?),
            Operation::AuthorizeSecurityGroupIngress
            | Operation::RevokeSecurityGroupIngress
            | Operation::PutParameter
            | Operation::PutDashboard
            | Operation::PutMetricAlarm => Self::Ack(operation),
        };
        Ok(response)
    }
}

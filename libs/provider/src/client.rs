//! The provider client interface.
//!
//! Implementations only provide [`CloudProvider::call`]. The typed helpers
//! build the request, send it, and unpack the matching response variant.

use async_trait::async_trait;
use fleet_id::{CommandId, InstanceId, SecurityGroupId};

use crate::error::{ProviderError, ProviderResult};
use crate::model::{
    CommandInvocationSummary, InstanceProfile, InstanceStatus, KeyPair, Parameter, SecurityGroup,
    Subnet,
};
use crate::request::{
    CreateKeyPairInput, CreateKeyPairOutput, CreateSecurityGroupInput,
    DescribeInstanceStatusInput, DescribeKeyPairsInput, DescribeSecurityGroupsInput,
    DescribeSubnetsInput, GetParameterInput, IngressInput, InstanceProfileInput,
    ListCommandInvocationsInput, Operation, ProviderRequest, ProviderResponse,
    PutDashboardInput, PutParameterInput, SendCommandInput,
};

/// Unpack a specific response variant or fail with `UnexpectedResponse`.
macro_rules! expect_response {
    ($response:expr, $variant:ident) => {
        match $response {
            ProviderResponse::$variant(out) => out,
            other => {
                return Err(ProviderError::UnexpectedResponse {
                    operation: Operation::$variant,
                    actual: other.operation(),
                })
            }
        }
    };
}

/// Unpack an acknowledgement for the given operation.
fn expect_ack(operation: Operation, response: ProviderResponse) -> ProviderResult<()> {
    match response {
        ProviderResponse::Ack(op) if op == operation => Ok(()),
        other => Err(ProviderError::UnexpectedResponse {
            operation,
            actual: other.operation(),
        }),
    }
}

/// Cloud provider client.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Send one request to the provider.
    async fn call(&self, request: ProviderRequest) -> ProviderResult<ProviderResponse>;

    // -------------------------------------------------------------------------
    // IAM
    // -------------------------------------------------------------------------

    /// Look up an instance profile by name. `None` if it does not exist.
    async fn get_instance_profile(&self, name: &str) -> ProviderResult<Option<InstanceProfile>> {
        let request = ProviderRequest::GetInstanceProfile(InstanceProfileInput {
            instance_profile_name: name.to_string(),
        });
        match self.call(request).await {
            Ok(response) => {
                let out = expect_response!(response, GetInstanceProfile);
                Ok(Some(out.instance_profile))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_instance_profile(&self, name: &str) -> ProviderResult<InstanceProfile> {
        let request = ProviderRequest::CreateInstanceProfile(InstanceProfileInput {
            instance_profile_name: name.to_string(),
        });
        let out = expect_response!(self.call(request).await?, CreateInstanceProfile);
        Ok(out.instance_profile)
    }

    // -------------------------------------------------------------------------
    // EC2
    // -------------------------------------------------------------------------

    async fn describe_key_pairs(&self, input: DescribeKeyPairsInput) -> ProviderResult<Vec<KeyPair>> {
        let response = self.call(ProviderRequest::DescribeKeyPairs(input)).await;
        match response {
            Ok(response) => Ok(expect_response!(response, DescribeKeyPairs).key_pairs),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn create_key_pair(&self, key_name: &str) -> ProviderResult<CreateKeyPairOutput> {
        let request = ProviderRequest::CreateKeyPair(CreateKeyPairInput {
            key_name: key_name.to_string(),
        });
        Ok(expect_response!(self.call(request).await?, CreateKeyPair))
    }

    async fn describe_subnets(&self, input: DescribeSubnetsInput) -> ProviderResult<Vec<Subnet>> {
        let response = self.call(ProviderRequest::DescribeSubnets(input)).await?;
        Ok(expect_response!(response, DescribeSubnets).subnets)
    }

    async fn describe_security_groups(
        &self,
        input: DescribeSecurityGroupsInput,
    ) -> ProviderResult<Vec<SecurityGroup>> {
        let response = self
            .call(ProviderRequest::DescribeSecurityGroups(input))
            .await?;
        Ok(expect_response!(response, DescribeSecurityGroups).security_groups)
    }

    async fn create_security_group(
        &self,
        input: CreateSecurityGroupInput,
    ) -> ProviderResult<SecurityGroupId> {
        let response = self.call(ProviderRequest::CreateSecurityGroup(input)).await?;
        Ok(expect_response!(response, CreateSecurityGroup).group_id)
    }

    async fn authorize_ingress(&self, input: IngressInput) -> ProviderResult<()> {
        let response = self
            .call(ProviderRequest::AuthorizeSecurityGroupIngress(input))
            .await?;
        expect_ack(Operation::AuthorizeSecurityGroupIngress, response)
    }

    async fn revoke_ingress(&self, input: IngressInput) -> ProviderResult<()> {
        let response = self
            .call(ProviderRequest::RevokeSecurityGroupIngress(input))
            .await?;
        expect_ack(Operation::RevokeSecurityGroupIngress, response)
    }

    async fn describe_instance_status(
        &self,
        instance_ids: &[InstanceId],
    ) -> ProviderResult<Vec<InstanceStatus>> {
        let request = ProviderRequest::DescribeInstanceStatus(DescribeInstanceStatusInput {
            instance_ids: instance_ids.to_vec(),
        });
        let out = expect_response!(self.call(request).await?, DescribeInstanceStatus);
        Ok(out.instance_statuses)
    }

    // -------------------------------------------------------------------------
    // SSM
    // -------------------------------------------------------------------------

    async fn send_command(&self, input: SendCommandInput) -> ProviderResult<CommandId> {
        let response = self.call(ProviderRequest::SendCommand(input)).await?;
        Ok(expect_response!(response, SendCommand).command.command_id)
    }

    async fn list_command_invocations(
        &self,
        command_id: &CommandId,
        instance_id: &InstanceId,
    ) -> ProviderResult<Vec<CommandInvocationSummary>> {
        let request = ProviderRequest::ListCommandInvocations(ListCommandInvocationsInput {
            command_id: command_id.clone(),
            instance_id: instance_id.clone(),
        });
        let out = expect_response!(self.call(request).await?, ListCommandInvocations);
        Ok(out.command_invocations)
    }

    async fn put_parameter(&self, input: PutParameterInput) -> ProviderResult<()> {
        let response = self.call(ProviderRequest::PutParameter(input)).await?;
        expect_ack(Operation::PutParameter, response)
    }

    /// Read a parameter. `None` if it does not exist.
    async fn get_parameter(&self, name: &str) -> ProviderResult<Option<Parameter>> {
        let request = ProviderRequest::GetParameter(GetParameterInput {
            name: name.to_string(),
        });
        match self.call(request).await {
            Ok(response) => Ok(Some(expect_response!(response, GetParameter).parameter)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    // -------------------------------------------------------------------------
    // CloudWatch
    // -------------------------------------------------------------------------

    async fn put_dashboard(&self, input: PutDashboardInput) -> ProviderResult<()> {
        let response = self.call(ProviderRequest::PutDashboard(input)).await?;
        expect_ack(Operation::PutDashboard, response)
    }

    async fn put_metric_alarm(&self, definition: serde_json::Value) -> ProviderResult<()> {
        let response = self
            .call(ProviderRequest::PutMetricAlarm(definition))
            .await?;
        expect_ack(Operation::PutMetricAlarm, response)
    }
}

#[async_trait]
impl<T: CloudProvider + ?Sized> CloudProvider for std::sync::Arc<T> {
    async fn call(&self, request: ProviderRequest) -> ProviderResult<ProviderResponse> {
        (**self).call(request).await
    }
}

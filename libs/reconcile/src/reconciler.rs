//! Convergence of a single resource.
//!
//! Given a descriptor and its resolved live state, the reconciler issues the
//! smallest set of mutating calls that makes the live state match. Against
//! already-correct state it issues none.

use std::sync::Arc;

use fleet_id::{SecurityGroupId, SubnetId, VpcId};
use fleet_provider::model::{SecurityGroup, Subnet};
use fleet_provider::request::{CreateSecurityGroupInput, DescribeSecurityGroupsInput, IngressInput};
use fleet_provider::CloudProvider;
use tracing::{info, instrument, warn};

use crate::descriptor::{
    permissions_from_rules, rules_from_permissions, GroupIdentity, IngressDelta,
    InstanceProfileDescriptor, KeyPairDescriptor, ResourceDescriptor, ResourceRef,
    SecurityGroupDescriptor, SubnetDescriptor,
};
use crate::error::{ReconcileError, ReconcileResult};
use crate::keys::KeyMaterialStore;
use crate::resolver::{LiveKeyPair, LiveResource, ResolvedState, Resolver};

/// Identity of a converged resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceHandle {
    InstanceProfile { name: String, arn: String },
    KeyPair { name: String },
    Subnets { subnet_ids: Vec<SubnetId>, vpc_id: VpcId },
    SecurityGroup { group_id: SecurityGroupId },
}

/// What the reconciler had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    Unchanged,
    Created,
    Updated,
}

/// Handle plus the action taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub handle: ResourceHandle,
    pub action: ReconcileAction,
}

impl Reconciled {
    fn new(handle: ResourceHandle, action: ReconcileAction) -> Self {
        Self { handle, action }
    }
}

/// Issues create/update calls for divergent resources.
#[derive(Clone)]
pub struct Reconciler {
    provider: Arc<dyn CloudProvider>,
    keys: Arc<dyn KeyMaterialStore>,
}

impl Reconciler {
    pub fn new(provider: Arc<dyn CloudProvider>, keys: Arc<dyn KeyMaterialStore>) -> Self {
        Self { provider, keys }
    }

    /// A resolver sharing this reconciler's provider and key store.
    pub fn resolver(&self) -> Resolver {
        Resolver::new(Arc::clone(&self.provider), Arc::clone(&self.keys))
    }

    /// Resolve then reconcile.
    pub async fn converge(&self, descriptor: &ResourceDescriptor) -> ReconcileResult<Reconciled> {
        let resolved = self.resolver().resolve(descriptor).await?;
        self.reconcile(descriptor, resolved).await
    }

    /// Bring the live resource in line with `descriptor`.
    #[instrument(skip_all, fields(resource = %descriptor.resource_ref()))]
    pub async fn reconcile(
        &self,
        descriptor: &ResourceDescriptor,
        resolved: ResolvedState<LiveResource>,
    ) -> ReconcileResult<Reconciled> {
        let resource = descriptor.resource_ref();

        let live = match resolved {
            ResolvedState::NotFound => None,
            ResolvedState::Found(live) => Some(live),
            ResolvedState::FoundMultiple(all) => {
                return Err(ReconcileError::ResolutionAmbiguous {
                    resource,
                    matches: all.len(),
                    detail: describe_matches(&all),
                });
            }
        };

        let reconciled = match (descriptor, live) {
            (ResourceDescriptor::InstanceProfile(d), None) => {
                self.create_instance_profile(d, &resource).await?
            }
            (ResourceDescriptor::InstanceProfile(_), Some(LiveResource::InstanceProfile(p))) => {
                Reconciled::new(
                    ResourceHandle::InstanceProfile {
                        name: p.instance_profile_name,
                        arn: p.arn,
                    },
                    ReconcileAction::Unchanged,
                )
            }
            (ResourceDescriptor::KeyPair(d), None) => self.create_key_pair(d, &resource).await?,
            (ResourceDescriptor::KeyPair(d), Some(LiveResource::KeyPair(live))) => {
                existing_key_pair(d, live, resource)?
            }
            (ResourceDescriptor::Subnet(_), None) => {
                return Err(ReconcileError::ResourceNotFound {
                    resource,
                    detail: "no available subnet matches".to_string(),
                });
            }
            (ResourceDescriptor::Subnet(d), Some(LiveResource::Subnets(subnets))) => {
                select_subnets(d, subnets, resource)?
            }
            (ResourceDescriptor::SecurityGroup(d), None) => {
                self.create_security_group(d, &resource).await?
            }
            (ResourceDescriptor::SecurityGroup(d), Some(LiveResource::SecurityGroup(group))) => {
                self.update_security_group(d, &group, &resource).await?
            }
            (_, Some(other)) => {
                return Err(ReconcileError::ResourceNotFound {
                    resource,
                    detail: format!("resolved to an unrelated resource: {other:?}"),
                });
            }
        };

        if reconciled.action != ReconcileAction::Unchanged {
            info!(handle = ?reconciled.handle, action = ?reconciled.action, "Reconciled resource");
        }
        Ok(reconciled)
    }

    async fn create_instance_profile(
        &self,
        d: &InstanceProfileDescriptor,
        resource: &ResourceRef,
    ) -> ReconcileResult<Reconciled> {
        let profile = self
            .provider
            .create_instance_profile(&d.name)
            .await
            .map_err(|source| ReconcileError::ReconcileRejected {
                resource: resource.clone(),
                attribute: "instance_profile_name",
                source,
            })?;

        Ok(Reconciled::new(
            ResourceHandle::InstanceProfile {
                name: profile.instance_profile_name,
                arn: profile.arn,
            },
            ReconcileAction::Created,
        ))
    }

    async fn create_key_pair(
        &self,
        d: &KeyPairDescriptor,
        resource: &ResourceRef,
    ) -> ReconcileResult<Reconciled> {
        let created = self
            .provider
            .create_key_pair(&d.name)
            .await
            .map_err(|source| ReconcileError::ReconcileRejected {
                resource: resource.clone(),
                attribute: "key_name",
                source,
            })?;

        self.keys
            .store_private_key(&created.key_name, &created.key_material)
            .map_err(|source| ReconcileError::KeyMaterial {
                resource: resource.clone(),
                source,
            })?;

        Ok(Reconciled::new(
            ResourceHandle::KeyPair {
                name: created.key_name,
            },
            ReconcileAction::Created,
        ))
    }

    async fn create_security_group(
        &self,
        d: &SecurityGroupDescriptor,
        resource: &ResourceRef,
    ) -> ReconcileResult<Reconciled> {
        let GroupIdentity::Named { name, vpc_id } = &d.identity else {
            return Err(ReconcileError::ResourceNotFound {
                resource: resource.clone(),
                detail: "security groups referenced by id are never created".to_string(),
            });
        };

        let group_id = self
            .provider
            .create_security_group(CreateSecurityGroupInput {
                description: d.description.clone(),
                group_name: name.clone(),
                vpc_id: vpc_id.clone(),
            })
            .await
            .map_err(|source| ReconcileError::ReconcileRejected {
                resource: resource.clone(),
                attribute: "group",
                source,
            })?;

        // Read back the new group: the provider may attach default rules.
        let created = self
            .provider
            .describe_security_groups(DescribeSecurityGroupsInput {
                filters: Vec::new(),
                group_ids: vec![group_id.clone()],
            })
            .await
            .map_err(|source| ReconcileError::Lookup {
                resource: resource.clone(),
                source,
            })?;

        let Some(group) = created.into_iter().find(|g| g.group_id == group_id) else {
            return Err(ReconcileError::ResourceNotFound {
                resource: resource.clone(),
                detail: format!("created group {group_id} is not visible yet"),
            });
        };

        self.apply_ingress(d, &group, resource).await?;
        Ok(Reconciled::new(
            ResourceHandle::SecurityGroup { group_id },
            ReconcileAction::Created,
        ))
    }

    async fn update_security_group(
        &self,
        d: &SecurityGroupDescriptor,
        group: &SecurityGroup,
        resource: &ResourceRef,
    ) -> ReconcileResult<Reconciled> {
        if !d.description.is_empty() && d.description != group.description {
            // Descriptions are immutable on the provider side.
            warn!(
                group_id = %group.group_id,
                desired = %d.description,
                live = %group.description,
                "Security group description differs; leaving as is"
            );
        }

        let changed = self.apply_ingress(d, group, resource).await?;
        let action = if changed {
            ReconcileAction::Updated
        } else {
            ReconcileAction::Unchanged
        };
        Ok(Reconciled::new(
            ResourceHandle::SecurityGroup {
                group_id: group.group_id.clone(),
            },
            action,
        ))
    }

    /// Authorize missing and revoke unlisted ingress rules. Returns true if any
    /// call was made.
    async fn apply_ingress(
        &self,
        d: &SecurityGroupDescriptor,
        group: &SecurityGroup,
        resource: &ResourceRef,
    ) -> ReconcileResult<bool> {
        let live = rules_from_permissions(&group.ip_permissions);
        let delta = IngressDelta::between(&d.ingress, &live, d.exclusive_ingress);
        if delta.is_empty() {
            return Ok(false);
        }

        if !delta.authorize.is_empty() {
            self.provider
                .authorize_ingress(IngressInput {
                    group_id: group.group_id.clone(),
                    ip_permissions: permissions_from_rules(&delta.authorize),
                })
                .await
                .map_err(|source| ReconcileError::ReconcileRejected {
                    resource: resource.clone(),
                    attribute: "ingress",
                    source,
                })?;
        }

        if !delta.revoke.is_empty() {
            self.provider
                .revoke_ingress(IngressInput {
                    group_id: group.group_id.clone(),
                    ip_permissions: permissions_from_rules(&delta.revoke),
                })
                .await
                .map_err(|source| ReconcileError::ReconcileRejected {
                    resource: resource.clone(),
                    attribute: "ingress",
                    source,
                })?;
        }

        info!(
            group_id = %group.group_id,
            authorized = delta.authorize.len(),
            revoked = delta.revoke.len(),
            "Applied ingress delta"
        );
        Ok(true)
    }
}

fn existing_key_pair(
    d: &KeyPairDescriptor,
    live: LiveKeyPair,
    resource: ResourceRef,
) -> ReconcileResult<Reconciled> {
    if !live.has_private_key {
        return Err(ReconcileError::ResourceNotFound {
            resource,
            detail: format!(
                "key pair exists but the private key for {} is not available locally",
                d.name
            ),
        });
    }
    Ok(Reconciled::new(
        ResourceHandle::KeyPair {
            name: live.key_pair.key_name,
        },
        ReconcileAction::Unchanged,
    ))
}

fn select_subnets(
    d: &SubnetDescriptor,
    subnets: Vec<Subnet>,
    resource: ResourceRef,
) -> ReconcileResult<Reconciled> {
    let missing: Vec<_> = d
        .subnet_ids
        .iter()
        .filter(|id| !subnets.iter().any(|s| &s.subnet_id == *id))
        .map(ToString::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(ReconcileError::ResourceNotFound {
            resource,
            detail: format!("unavailable subnets: {}", missing.join(",")),
        });
    }

    let mut vpcs: Vec<&VpcId> = subnets.iter().map(|s| &s.vpc_id).collect();
    vpcs.sort();
    vpcs.dedup();
    let vpc_id = match vpcs.as_slice() {
        [only] => (*only).clone(),
        many => {
            return Err(ReconcileError::ResolutionAmbiguous {
                resource,
                matches: many.len(),
                detail: format!(
                    "subnets span VPCs {}; pin a VPC or list subnet ids",
                    many.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
                ),
            });
        }
    };

    Ok(Reconciled::new(
        ResourceHandle::Subnets {
            subnet_ids: subnets.into_iter().map(|s| s.subnet_id).collect(),
            vpc_id,
        },
        ReconcileAction::Unchanged,
    ))
}

fn describe_matches(all: &[LiveResource]) -> String {
    all.iter()
        .map(|r| match r {
            LiveResource::InstanceProfile(p) => p.arn.clone(),
            LiveResource::KeyPair(k) => k.key_pair.key_name.clone(),
            LiveResource::Subnets(s) => format!("{} subnets", s.len()),
            LiveResource::SecurityGroup(g) => g.group_id.to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

//! Resource resolution.
//!
//! The resolver reads live provider state for a descriptor and classifies it.
//! It never mutates the provider. The query it sends is a pure function of
//! the descriptor ([`query_for`]), so the exact parameters can be checked
//! without a provider.

use std::sync::Arc;

use fleet_provider::model::{Filter, InstanceProfile, KeyPair, SecurityGroup, Subnet};
use fleet_provider::request::{
    DescribeKeyPairsInput, DescribeSecurityGroupsInput, DescribeSubnetsInput,
    InstanceProfileInput,
};
use fleet_provider::{CloudProvider, ProviderRequest};
use tracing::{debug, instrument};

use crate::descriptor::{
    GroupIdentity, InstanceProfileDescriptor, KeyPairDescriptor, ResourceDescriptor,
    SecurityGroupDescriptor, SubnetDescriptor,
};
use crate::error::{ReconcileError, ReconcileResult};
use crate::keys::KeyMaterialStore;

/// Outcome of a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedState<T> {
    /// Nothing matched.
    NotFound,

    /// Exactly one match.
    Found(T),

    /// Several matches where one was expected.
    FoundMultiple(Vec<T>),
}

impl<T> ResolvedState<T> {
    fn from_matches(mut matches: Vec<T>) -> Self {
        match matches.len() {
            0 => Self::NotFound,
            1 => Self::Found(matches.remove(0)),
            _ => Self::FoundMultiple(matches),
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn map<U>(self, f: impl Fn(T) -> U) -> ResolvedState<U> {
        match self {
            Self::NotFound => ResolvedState::NotFound,
            Self::Found(t) => ResolvedState::Found(f(t)),
            Self::FoundMultiple(ts) => ResolvedState::FoundMultiple(ts.into_iter().map(f).collect()),
        }
    }
}

/// Live key pair plus whether we hold its private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveKeyPair {
    pub key_pair: KeyPair,
    pub has_private_key: bool,
}

/// Live state of a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveResource {
    InstanceProfile(InstanceProfile),
    KeyPair(LiveKeyPair),
    /// Subnets are a selection, so one match carries the whole set.
    Subnets(Vec<Subnet>),
    SecurityGroup(SecurityGroup),
}

/// The provider query a descriptor resolves with.
pub fn query_for(descriptor: &ResourceDescriptor) -> ProviderRequest {
    match descriptor {
        ResourceDescriptor::InstanceProfile(d) => {
            ProviderRequest::GetInstanceProfile(InstanceProfileInput {
                instance_profile_name: d.name.clone(),
            })
        }
        ResourceDescriptor::KeyPair(d) => ProviderRequest::DescribeKeyPairs(key_pair_query(d)),
        ResourceDescriptor::Subnet(d) => ProviderRequest::DescribeSubnets(subnet_query(d)),
        ResourceDescriptor::SecurityGroup(d) => {
            ProviderRequest::DescribeSecurityGroups(security_group_query(d))
        }
    }
}

fn key_pair_query(d: &KeyPairDescriptor) -> DescribeKeyPairsInput {
    DescribeKeyPairsInput {
        filters: vec![Filter::new("key-name", [d.name.as_str()])],
    }
}

fn subnet_query(d: &SubnetDescriptor) -> DescribeSubnetsInput {
    let mut filters = Vec::new();
    if !d.subnet_ids.is_empty() {
        filters.push(Filter::new(
            "subnet-id",
            d.subnet_ids.iter().map(ToString::to_string),
        ));
    }
    if let Some(vpc_id) = &d.vpc_id {
        filters.push(Filter::new("vpc-id", [vpc_id.to_string()]));
    }
    DescribeSubnetsInput { filters }
}

fn security_group_query(d: &SecurityGroupDescriptor) -> DescribeSecurityGroupsInput {
    match &d.identity {
        GroupIdentity::Named { vpc_id, .. } => DescribeSecurityGroupsInput {
            filters: vec![Filter::new("vpc-id", [vpc_id.to_string()])],
            group_ids: Vec::new(),
        },
        GroupIdentity::Id(id) => DescribeSecurityGroupsInput {
            filters: Vec::new(),
            group_ids: vec![id.clone()],
        },
    }
}

/// Reads live state for descriptors.
#[derive(Clone)]
pub struct Resolver {
    provider: Arc<dyn CloudProvider>,
    keys: Arc<dyn KeyMaterialStore>,
}

impl Resolver {
    pub fn new(provider: Arc<dyn CloudProvider>, keys: Arc<dyn KeyMaterialStore>) -> Self {
        Self { provider, keys }
    }

    /// Resolve any descriptor.
    #[instrument(skip_all, fields(resource = %descriptor.resource_ref()))]
    pub async fn resolve(
        &self,
        descriptor: &ResourceDescriptor,
    ) -> ReconcileResult<ResolvedState<LiveResource>> {
        let state = match descriptor {
            ResourceDescriptor::InstanceProfile(d) => self
                .resolve_instance_profile(d)
                .await?
                .map(LiveResource::InstanceProfile),
            ResourceDescriptor::KeyPair(d) => {
                self.resolve_key_pair(d).await?.map(LiveResource::KeyPair)
            }
            ResourceDescriptor::Subnet(d) => match self.resolve_subnets(d).await? {
                subnets if subnets.is_empty() => ResolvedState::NotFound,
                subnets => ResolvedState::Found(LiveResource::Subnets(subnets)),
            },
            ResourceDescriptor::SecurityGroup(d) => self
                .resolve_security_group(d)
                .await?
                .map(LiveResource::SecurityGroup),
        };

        debug!(
            found = state.is_found(),
            ambiguous = matches!(state, ResolvedState::FoundMultiple(_)),
            "Resolved resource"
        );
        Ok(state)
    }

    pub async fn resolve_instance_profile(
        &self,
        d: &InstanceProfileDescriptor,
    ) -> ReconcileResult<ResolvedState<InstanceProfile>> {
        let profile = self
            .provider
            .get_instance_profile(&d.name)
            .await
            .map_err(|source| ReconcileError::Lookup {
                resource: ResourceDescriptor::InstanceProfile(d.clone()).resource_ref(),
                source,
            })?;
        Ok(profile.map_or(ResolvedState::NotFound, ResolvedState::Found))
    }

    pub async fn resolve_key_pair(
        &self,
        d: &KeyPairDescriptor,
    ) -> ReconcileResult<ResolvedState<LiveKeyPair>> {
        let pairs = self
            .provider
            .describe_key_pairs(key_pair_query(d))
            .await
            .map_err(|source| ReconcileError::Lookup {
                resource: ResourceDescriptor::KeyPair(d.clone()).resource_ref(),
                source,
            })?;

        let matches = pairs
            .into_iter()
            .filter(|p| p.key_name == d.name)
            .map(|key_pair| LiveKeyPair {
                has_private_key: self.keys.has_private_key(&key_pair.key_name),
                key_pair,
            })
            .collect();
        Ok(ResolvedState::from_matches(matches))
    }

    /// Available subnets matching the descriptor, sorted by id.
    pub async fn resolve_subnets(&self, d: &SubnetDescriptor) -> ReconcileResult<Vec<Subnet>> {
        let subnets = self
            .provider
            .describe_subnets(subnet_query(d))
            .await
            .map_err(|source| ReconcileError::Lookup {
                resource: ResourceDescriptor::Subnet(d.clone()).resource_ref(),
                source,
            })?;

        let mut available: Vec<_> = subnets.into_iter().filter(Subnet::is_available).collect();
        available.sort_by(|a, b| a.subnet_id.cmp(&b.subnet_id));
        Ok(available)
    }

    pub async fn resolve_security_group(
        &self,
        d: &SecurityGroupDescriptor,
    ) -> ReconcileResult<ResolvedState<SecurityGroup>> {
        let groups = self
            .provider
            .describe_security_groups(security_group_query(d))
            .await
            .map_err(|source| ReconcileError::Lookup {
                resource: ResourceDescriptor::SecurityGroup(d.clone()).resource_ref(),
                source,
            })?;

        let matches = match &d.identity {
            GroupIdentity::Named { name, vpc_id } => groups
                .into_iter()
                .filter(|g| &g.group_name == name && &g.vpc_id == vpc_id)
                .collect(),
            GroupIdentity::Id(id) => groups.into_iter().filter(|g| &g.group_id == id).collect(),
        };
        Ok(ResolvedState::from_matches(matches))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use fleet_id::{SecurityGroupId, SubnetId, VpcId};

    use super::*;

    #[test]
    fn test_key_pair_query_filters_by_name() {
        let request = query_for(&ResourceDescriptor::KeyPair(KeyPairDescriptor {
            name: "fleet-key".to_string(),
        }));
        assert_eq!(
            request.params(),
            serde_json::json!({"Filters": [{"Name": "key-name", "Values": ["fleet-key"]}]})
        );
    }

    #[test]
    fn test_default_subnet_query_has_no_filters() {
        let request = query_for(&ResourceDescriptor::Subnet(SubnetDescriptor::default()));
        assert_eq!(request.params(), serde_json::json!({}));
    }

    #[test]
    fn test_subnet_query_by_ids() {
        let request = query_for(&ResourceDescriptor::Subnet(SubnetDescriptor {
            subnet_ids: vec![SubnetId::parse("subnet-1").unwrap()],
            vpc_id: None,
        }));
        assert_eq!(
            request.params(),
            serde_json::json!({"Filters": [{"Name": "subnet-id", "Values": ["subnet-1"]}]})
        );
    }

    #[test]
    fn test_security_group_query_by_vpc() {
        let request = query_for(&ResourceDescriptor::SecurityGroup(SecurityGroupDescriptor {
            identity: GroupIdentity::Named {
                name: "fleet-sg".to_string(),
                vpc_id: VpcId::parse("vpc-1").unwrap(),
            },
            description: String::new(),
            ingress: BTreeSet::new(),
            exclusive_ingress: false,
        }));
        assert_eq!(
            request.params(),
            serde_json::json!({"Filters": [{"Name": "vpc-id", "Values": ["vpc-1"]}]})
        );
    }

    #[test]
    fn test_security_group_query_by_id() {
        let request = query_for(&ResourceDescriptor::SecurityGroup(SecurityGroupDescriptor {
            identity: GroupIdentity::Id(SecurityGroupId::parse("sg-1").unwrap()),
            description: String::new(),
            ingress: BTreeSet::new(),
            exclusive_ingress: false,
        }));
        assert_eq!(request.params(), serde_json::json!({"GroupIds": ["sg-1"]}));
    }

    #[test]
    fn test_instance_profile_query() {
        let request = query_for(&ResourceDescriptor::InstanceProfile(
            InstanceProfileDescriptor {
                name: "fleet-v1".to_string(),
            },
        ));
        assert_eq!(
            request.params(),
            serde_json::json!({"InstanceProfileName": "fleet-v1"})
        );
    }

    #[test]
    fn test_from_matches() {
        assert_eq!(ResolvedState::<u8>::from_matches(vec![]), ResolvedState::NotFound);
        assert_eq!(ResolvedState::from_matches(vec![1]), ResolvedState::Found(1));
        assert_eq!(
            ResolvedState::from_matches(vec![1, 2]),
            ResolvedState::FoundMultiple(vec![1, 2])
        );
    }
}

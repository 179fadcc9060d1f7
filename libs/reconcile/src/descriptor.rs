//! Declarative resource descriptors.
//!
//! A descriptor names a resource and the attributes it should have. It is
//! built once from cluster configuration, compared against live state, and
//! never changed afterwards; a new configuration produces a new descriptor.

use std::collections::{BTreeMap, BTreeSet};

use fleet_id::{SecurityGroupId, SubnetId, VpcId};
use fleet_provider::model::{IpPermission, IpRange, PermissionSource, UserIdGroupPair};

/// Resource types the reconciler manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    InstanceProfile,
    KeyPair,
    Subnet,
    SecurityGroup,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InstanceProfile => "instance profile",
            Self::KeyPair => "key pair",
            Self::Subnet => "subnet",
            Self::SecurityGroup => "security group",
        };
        f.write_str(s)
    }
}

/// Kind plus identity, for error messages and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub name: String,
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

// =============================================================================
// Descriptors
// =============================================================================

/// IAM instance profile attached to every node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceProfileDescriptor {
    pub name: String,
}

/// SSH key pair used to reach the nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPairDescriptor {
    pub name: String,
}

/// Subnets nodes may be launched into.
///
/// No ids and no VPC means "every available subnet in the account".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubnetDescriptor {
    pub subnet_ids: Vec<SubnetId>,
    pub vpc_id: Option<VpcId>,
}

/// How a security group is identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupIdentity {
    /// A group with this name inside this VPC. Created if absent.
    Named { name: String, vpc_id: VpcId },

    /// A pre-existing group referenced by id. Never created.
    Id(SecurityGroupId),
}

/// Security group with its desired ingress rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroupDescriptor {
    pub identity: GroupIdentity,
    pub description: String,
    pub ingress: BTreeSet<SecurityGroupRule>,

    /// Revoke live ingress rules that are not listed in `ingress`.
    pub exclusive_ingress: bool,
}

/// A desired resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceDescriptor {
    InstanceProfile(InstanceProfileDescriptor),
    KeyPair(KeyPairDescriptor),
    Subnet(SubnetDescriptor),
    SecurityGroup(SecurityGroupDescriptor),
}

impl ResourceDescriptor {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::InstanceProfile(_) => ResourceKind::InstanceProfile,
            Self::KeyPair(_) => ResourceKind::KeyPair,
            Self::Subnet(_) => ResourceKind::Subnet,
            Self::SecurityGroup(_) => ResourceKind::SecurityGroup,
        }
    }

    /// Reference used in errors and logs.
    pub fn resource_ref(&self) -> ResourceRef {
        let name = match self {
            Self::InstanceProfile(d) => d.name.clone(),
            Self::KeyPair(d) => d.name.clone(),
            Self::Subnet(d) => subnet_label(d),
            Self::SecurityGroup(d) => match &d.identity {
                GroupIdentity::Named { name, vpc_id } => format!("{name} ({vpc_id})"),
                GroupIdentity::Id(id) => id.to_string(),
            },
        };
        ResourceRef {
            kind: self.kind(),
            name,
        }
    }
}

fn subnet_label(d: &SubnetDescriptor) -> String {
    match (&d.subnet_ids[..], &d.vpc_id) {
        ([], None) => "*".to_string(),
        ([], Some(vpc)) => format!("* in {vpc}"),
        (ids, None) => join_ids(ids),
        (ids, Some(vpc)) => format!("{} in {vpc}", join_ids(ids)),
    }
}

fn join_ids<T: std::fmt::Display>(ids: &[T]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

// =============================================================================
// Security Group Rules
// =============================================================================

/// A single ingress permission: one protocol, one port range, one source.
///
/// The provider groups several sources into one permission block; rules are
/// the flattened form, so set operations on rules give exact deltas.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SecurityGroupRule {
    pub protocol: String,
    pub from_port: Option<i32>,
    pub to_port: Option<i32>,
    pub source: PermissionSource,
}

impl SecurityGroupRule {
    /// TCP rule for a port range from a CIDR block.
    pub fn tcp(from_port: i32, to_port: i32, cidr: impl Into<String>) -> Self {
        Self {
            protocol: "tcp".to_string(),
            from_port: Some(from_port),
            to_port: Some(to_port),
            source: PermissionSource::Cidr(cidr.into()),
        }
    }

    /// All traffic from another security group.
    pub fn all_from_group(group_id: SecurityGroupId) -> Self {
        Self {
            protocol: "-1".to_string(),
            from_port: None,
            to_port: None,
            source: PermissionSource::Group(group_id),
        }
    }
}

/// Flatten provider permission blocks into rules.
pub fn rules_from_permissions(permissions: &[IpPermission]) -> BTreeSet<SecurityGroupRule> {
    permissions
        .iter()
        .flat_map(|perm| {
            perm.sources().into_iter().map(move |source| SecurityGroupRule {
                protocol: perm.ip_protocol.clone(),
                from_port: perm.from_port,
                to_port: perm.to_port,
                source,
            })
        })
        .collect()
}

/// Group rules back into provider permission blocks.
///
/// Rules sharing protocol and port range end up in one block. Output order is
/// deterministic.
pub fn permissions_from_rules<'a, I>(rules: I) -> Vec<IpPermission>
where
    I: IntoIterator<Item = &'a SecurityGroupRule>,
{
    let mut blocks: BTreeMap<(String, Option<i32>, Option<i32>), IpPermission> = BTreeMap::new();

    for rule in rules {
        let key = (rule.protocol.clone(), rule.from_port, rule.to_port);
        let block = blocks.entry(key).or_insert_with(|| IpPermission {
            ip_protocol: rule.protocol.clone(),
            from_port: rule.from_port,
            to_port: rule.to_port,
            ip_ranges: Vec::new(),
            user_id_group_pairs: Vec::new(),
        });
        match &rule.source {
            PermissionSource::Cidr(cidr) => block.ip_ranges.push(IpRange {
                cidr_ip: cidr.clone(),
            }),
            PermissionSource::Group(group_id) => block.user_id_group_pairs.push(UserIdGroupPair {
                group_id: group_id.clone(),
            }),
        }
    }

    blocks.into_values().collect()
}

/// Ingress changes needed to move live rules to desired rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngressDelta {
    pub authorize: BTreeSet<SecurityGroupRule>,
    pub revoke: BTreeSet<SecurityGroupRule>,
}

impl IngressDelta {
    /// Compute the delta. Extra live rules are only revoked when `exclusive`.
    pub fn between(
        desired: &BTreeSet<SecurityGroupRule>,
        live: &BTreeSet<SecurityGroupRule>,
        exclusive: bool,
    ) -> Self {
        let authorize = desired.difference(live).cloned().collect();
        let revoke = if exclusive {
            live.difference(desired).cloned().collect()
        } else {
            BTreeSet::new()
        };
        Self { authorize, revoke }
    }

    pub fn is_empty(&self) -> bool {
        self.authorize.is_empty() && self.revoke.is_empty()
    }
}

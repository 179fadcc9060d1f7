//! Resource resolution and reconciliation.
//!
//! This library converges provider resources to declarative descriptors.
//! Key concepts:
//!
//! - **Descriptor**: what a resource should look like (from configuration).
//! - **Resolution**: what the provider actually has ([`Resolver`]).
//! - **Reconciliation**: the calls that make the two match ([`Reconciler`]).
//!
//! # Invariants
//!
//! - Resolution never mutates provider state.
//! - The query for a descriptor is a deterministic function of it.
//! - Reconciling already-converged state issues no mutating calls.
//! - Nothing is retried internally; errors name the resource and go to the
//!   caller.

pub mod descriptor;
pub mod error;
pub mod keys;
pub mod reconciler;
pub mod resolver;

pub use descriptor::{
    GroupIdentity, InstanceProfileDescriptor, KeyPairDescriptor, ResourceDescriptor,
    ResourceKind, ResourceRef, SecurityGroupDescriptor, SecurityGroupRule, SubnetDescriptor,
};
pub use error::{ReconcileError, ReconcileResult};
pub use keys::{FsKeyStore, KeyMaterialStore, MemoryKeyStore};
pub use reconciler::{ReconcileAction, Reconciled, Reconciler, ResourceHandle};
pub use resolver::{query_for, LiveResource, ResolvedState, Resolver};

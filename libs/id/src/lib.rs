//! # fleet-id
//!
//! Typed identifiers for resources assigned by the cloud provider.
//!
//! ## ID Format
//!
//! Provider resource IDs use a prefixed format: `{prefix}-{suffix}`
//!
//! Examples:
//! - `i-0a1b2c3d4e5f67890`
//! - `sg-0123456789abcdef0`
//! - `subnet-0bb1c79de3EXAMPLE`
//!
//! The suffix is opaque to us. Parsing only checks the prefix and that the
//! suffix is non-empty ASCII alphanumeric, so test fixtures such as `i-1`
//! are accepted.
//!
//! Command IDs are different: the provider hands out a bare UUID, so
//! [`CommandId`] carries no prefix.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

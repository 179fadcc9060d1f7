//! Typed ID definitions for provider resources.

use crate::define_id;

// =============================================================================
// Compute
// =============================================================================

define_id!(InstanceId, "i");

// =============================================================================
// Networking
// =============================================================================

define_id!(VpcId, "vpc");
define_id!(SubnetId, "subnet");
define_id!(SecurityGroupId, "sg");

// =============================================================================
// Remote Commands
// =============================================================================

/// Identifier the provider assigns to a dispatched command.
///
/// Opaque: no prefix, no format checks beyond non-empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommandId(String);

impl CommandId {
    /// Wraps a provider-assigned command ID.
    pub fn new(id: impl Into<String>) -> Result<Self, crate::IdError> {
        let id = id.into();
        if id.is_empty() {
            return Err(crate::IdError::Empty);
        }
        Ok(Self(id))
    }

    /// Returns the raw provider string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CommandId {
    type Err = crate::IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl serde::Serialize for CommandId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for CommandId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Tests
// =============================================================================

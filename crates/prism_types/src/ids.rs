//! # Identifier Types
//!
//! Newtype wrappers for every identifier that flows through the Prism engine.
//! Client-generated identifiers are backed by UUIDs; identifiers issued by the
//! fulfillment backend (unit, session, fulfillment and area ids) are opaque
//! strings and are wrapped so they cannot be confused with one another.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one placed slot instance in the running scene.
///
/// This is a wrapper around UUID that provides type safety and ensures
/// instance ids cannot be confused with other kinds of ids in the system.
///
/// # Examples
///
/// ```rust
/// use prism_types::InstanceId;
///
/// let instance_id = InstanceId::new();
/// println!("Instance: {}", instance_id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub Uuid);

impl InstanceId {
    /// Creates a new random instance ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses an instance ID from a string representation.
    pub fn from_str(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Correlation reference linking a Start event to its Update/End events for
/// one engagement lifecycle (gaze, audio or video).
///
/// A new reference is minted when an engagement starts and is carried on every
/// event of that engagement until its End is flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(pub Uuid);

impl CorrelationId {
    /// Mints a fresh correlation reference.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! opaque_string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Wraps a backend-issued identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the raw identifier string.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// True when the backend sent an empty identifier.
            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

opaque_string_id! {
    /// Identifier of one catalog content unit, issued by the backend.
    UnitId
}

opaque_string_id! {
    /// Identifier of one fulfillment resolution, issued by the backend.
    FulfillmentId
}

opaque_string_id! {
    /// Identifier of one logical area (scene) of the project.
    AreaId
}

opaque_string_id! {
    /// Identifier of the current engine session, issued by the backend.
    SessionId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_ids_are_unique() {
        assert_ne!(InstanceId::new(), InstanceId::new());
    }

    #[test]
    fn opaque_ids_detect_blank_values() {
        assert!(UnitId::new("").is_empty());
        assert!(UnitId::new("   ").is_empty());
        assert!(!UnitId::new("unit-1").is_empty());
    }

    #[test]
    fn instance_id_round_trips_through_string() {
        let id = InstanceId::new();
        let parsed = InstanceId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }
}

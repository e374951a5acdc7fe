//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Observation records created through the store get a strongly-typed ID so
//! traffic-flow, road-surface, and surface-prediction identifiers can never be
//! mixed up. All IDs use UUID v7 (time-ordered) for efficient indexing.
//!
//! Roads and road segments keep the opaque string identities they were seeded
//! with and are not wrapped here.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a traffic-flow observation.
    TrafficFlowObservedId
}

define_id! {
    /// Unique identifier for a road-surface observation.
    RoadSurfaceObservedId
}

define_id! {
    /// Unique identifier for one entry in a segment's surface-prediction history.
    SurfacePredictionId
}

//! # Prism Types
//!
//! Shared type definitions for the Prism content engine. These types provide
//! the building blocks for slot configuration, fulfillment wire traffic,
//! engagement analytics and the spatial volumes used to scope them.
//!
//! ## Key Types
//!
//! - [`InstanceId`] / [`UnitId`] / [`FulfillmentId`] - identifier newtypes
//! - [`ContentSlotConfig`] - static per-unit configuration
//! - [`FulfillmentRequest`] / [`FulfillmentResponse`] - fulfillment wire model
//! - [`EngagementEvent`] - correlated analytics events
//! - [`AreaVolume`] - per-area bounding volume
//!
//! ## Design Principles
//!
//! - **Type Safety**: Wrapper types prevent id confusion (UnitId vs AreaId)
//! - **Serialization**: All wire types support JSON serialization
//! - **No I/O**: Pure data; all transport lives behind engine capabilities

pub mod config;
pub mod events;
pub mod fulfillment;
pub mod ids;
pub mod math;
pub mod session;

pub use config::{ContentKind, ContentSlotConfig, FulfillmentBehaviour, LodStatus};
pub use events::{current_timestamp, EngagementEvent, EventMetadata, GazeAction, MediaAction};
pub use fulfillment::{
    CustomMetadataEntry, FulfillmentRequest, FulfillmentResponse, FulfillmentStatusCode,
    RequestMetadata, ResponseMetadata, UnitChecksum, UnitFulfillmentRequest,
    UnitFulfillmentResponse, UnitFulfillmentUpdate,
};
pub use ids::{AreaId, CorrelationId, FulfillmentId, InstanceId, SessionId, UnitId};
pub use math::{AreaVolume, Pose, Rotation, Vec3};
pub use session::{SessionDescriptor, SessionParameters};

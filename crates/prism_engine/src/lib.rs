//! # Prism Engine
//!
//! Client-side content engine for interactive 3D scenes: fulfills placed
//! content slots from a remote catalog, keeps per-instance level-of-detail
//! state, and correlates engagement analytics for the running session.
//!
//! ## Architecture
//!
//! - [`PrismEngine`] - facade and per-frame tick driver
//! - [`FulfillmentEngine`] - batched fulfillment passes and checksum polling
//! - [`EventCorrelator`] - gaze, media, player and conversion analytics
//! - [`AreaBoundsTracker`] - per-area bounding volumes
//! - [`ApiClient`] / [`SceneProvider`] - capability seams the host implements
//!
//! The engine is driven cooperatively: the host calls
//! [`PrismEngine::tick`] once per logical frame and all state mutation
//! happens behind one shared context, so network continuations never race
//! the tick.
//!
//! ## Usage
//!
//! ```no_run
//! use prism_engine::{EngineConfig, PrismEngine};
//! # use prism_engine::{ApiClient, SceneProvider};
//! # use std::sync::Arc;
//! # async fn run(transport: Arc<dyn ApiClient>, scene: Arc<dyn SceneProvider>) {
//! let mut engine = PrismEngine::new(EngineConfig::default(), transport, scene);
//! engine.start_session(Default::default()).await.unwrap();
//! engine.start_automatic_fulfillment().await.unwrap();
//! loop {
//!     engine.tick().await;
//! }
//! # }
//! ```

pub mod analytics;
pub mod area_bounds;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod fulfillment;
pub mod instance;
pub mod lod;
pub mod logging;
pub mod metadata;
pub mod scene;
pub mod transport;

pub use analytics::EventCorrelator;
pub use area_bounds::AreaBoundsTracker;
pub use config::{EngineConfig, FULFILLMENT_CHUNK_SIZE};
pub use context::{EngineContext, SharedContext};
pub use engine::PrismEngine;
pub use error::{EngineError, TransportError};
pub use fulfillment::FulfillmentEngine;
pub use instance::{FulfillmentObserver, SlotInstance};
pub use lod::LodState;
pub use logging::{setup_logging, setup_logging_with_format};
pub use metadata::CustomMetadataRegistry;
pub use scene::{GazeHit, SceneProvider};
pub use transport::ApiClient;

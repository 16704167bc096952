//! Engine configuration.
//!
//! Session-independent settings supplied by the host application when the
//! engine is constructed. Defaults match the thresholds the analytics and
//! fulfillment subsystems were tuned with.

use serde::{Deserialize, Serialize};

/// Maximum number of instances per fulfillment request chunk.
pub const FULFILLMENT_CHUNK_SIZE: usize = 50;

/// Configuration for one engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Project identifier sent when starting sessions.
    pub project_id: String,
    /// Optional API key forwarded on fulfillment requests.
    pub project_api_key: Option<String>,
    /// Dynamic tags persisted in project configuration, always included in
    /// fulfillment requests.
    pub persisted_dynamic_tags: Vec<String>,
    /// Whether checksum polling runs after the instant pass.
    pub polling_enabled: bool,
    /// Polling interval in seconds. Values under 1 are rejected.
    pub polling_interval_seconds: u64,
    /// Minimum hit-point movement (meters) before a gaze Update is recorded.
    pub gaze_position_threshold: f64,
    /// Minimum observer movement (meters) before a player sample is taken.
    pub player_position_threshold: f64,
    /// Maximum gaze raycast distance in meters.
    pub gaze_max_distance: f64,
    /// Radius of the observer overlap probe used for area gating.
    pub area_probe_radius: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            project_api_key: None,
            persisted_dynamic_tags: Vec::new(),
            polling_enabled: true,
            polling_interval_seconds: 30,
            gaze_position_threshold: 0.05,
            player_position_threshold: 0.5,
            gaze_max_distance: 10.0,
            area_probe_radius: 0.1,
        }
    }
}

//! # Session Model
//!
//! Types describing the backend session the engine operates inside.

use crate::ids::SessionId;
use serde::{Deserialize, Serialize};

/// The session handle returned by the transport when a session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    pub id: SessionId,
}

/// Optional parameters supplied when starting a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionParameters {
    /// Server-side user tag ids attached to the session at creation.
    pub user_tag_ids: Vec<String>,
    /// External consumer identifiers forwarded to the backend.
    pub external_ids: Vec<String>,
    /// When set, analytics tracking begins as soon as the session starts.
    pub commence_analytics_on_start: bool,
}

//! Transport capability.
//!
//! The engine talks to the backend exclusively through this trait; the wire
//! format and HTTP plumbing are the host application's concern. Requests that
//! fault are reported by the engine and never retried.

use crate::error::TransportError;
use async_trait::async_trait;
use prism_types::{
    EngagementEvent, FulfillmentRequest, FulfillmentResponse, SessionDescriptor, SessionId,
    SessionParameters, UnitChecksum, UnitId,
};

/// Asynchronous client for the fulfillment/analytics backend.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Starts a backend session for the given project.
    async fn start_session(
        &self,
        project_id: &str,
        parameters: &SessionParameters,
    ) -> Result<SessionDescriptor, TransportError>;

    /// Closes the session. Called after all pending analytics are flushed.
    async fn stop_session(&self, session_id: &SessionId) -> Result<(), TransportError>;

    /// Resolves content for one chunk of units.
    async fn fulfill(
        &self,
        request: &FulfillmentRequest,
    ) -> Result<FulfillmentResponse, TransportError>;

    /// Fetches the current content checksums for a set of units.
    async fn get_checksums(
        &self,
        unit_ids: &[UnitId],
    ) -> Result<Vec<UnitChecksum>, TransportError>;

    /// Ships a batch of engagement events to the collector.
    async fn send_events(&self, events: &[EngagementEvent]) -> Result<(), TransportError>;

    /// Attaches a user tag to the running session.
    async fn add_session_tag(
        &self,
        session_id: &SessionId,
        tag_id: &str,
    ) -> Result<(), TransportError>;

    /// Detaches a user tag from the running session.
    async fn remove_session_tag(
        &self,
        session_id: &SessionId,
        tag_id: &str,
    ) -> Result<(), TransportError>;
}

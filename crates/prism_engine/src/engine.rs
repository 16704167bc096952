//! Engine facade and tick driver.
//!
//! [`PrismEngine`] composes the session context, fulfillment engine, event
//! correlator and area bounds tracker behind the surface application code
//! talks to. The host drives it with one [`tick`](PrismEngine::tick) per
//! logical frame; network continuations run on the same logical task, so the
//! in-memory maps see a single writer.
//!
//! Tick ordering: LOD evaluation first, then range-trigger checks, then gaze,
//! then player sampling.

use crate::analytics::EventCorrelator;
use crate::area_bounds::AreaBoundsTracker;
use crate::config::EngineConfig;
use crate::context::{EngineContext, SharedContext};
use crate::error::EngineError;
use crate::fulfillment::FulfillmentEngine;
use crate::instance::{FulfillmentObserver, SlotInstance};
use crate::scene::SceneProvider;
use crate::transport::ApiClient;
use prism_types::{
    AreaId, ContentSlotConfig, FulfillmentId, InstanceId, MediaAction, SessionId,
    SessionParameters, UnitId, Vec3,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// The engine. One per running scene session.
pub struct PrismEngine {
    context: SharedContext,
    transport: Arc<dyn ApiClient>,
    scene: Arc<dyn SceneProvider>,
    fulfillment: FulfillmentEngine,
    correlator: EventCorrelator,
    bounds: AreaBoundsTracker,
    polling_handle: Option<tokio::task::JoinHandle<()>>,
}

impl PrismEngine {
    pub fn new(
        config: EngineConfig,
        transport: Arc<dyn ApiClient>,
        scene: Arc<dyn SceneProvider>,
    ) -> Self {
        let gaze_threshold = config.gaze_position_threshold;
        let context: SharedContext = Arc::new(RwLock::new(EngineContext::new(config)));
        let fulfillment = FulfillmentEngine::new(context.clone(), transport.clone());
        let correlator = EventCorrelator::new(context.clone(), transport.clone(), gaze_threshold);
        Self {
            context,
            transport,
            scene,
            fulfillment,
            correlator,
            bounds: AreaBoundsTracker::new(),
            polling_handle: None,
        }
    }

    /// Shared handle to the engine context, for configuration-time access
    /// (custom metadata handlers, dynamic tags).
    pub fn context(&self) -> SharedContext {
        self.context.clone()
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    /// Starts a backend session. A no-op (with a warning) when a session is
    /// already running.
    pub async fn start_session(
        &mut self,
        parameters: SessionParameters,
    ) -> Result<SessionId, EngineError> {
        {
            let context = self.context.read().await;
            if let Some(existing) = context.session_id() {
                warn!("A session is already running with ID {existing}");
                return Ok(existing.clone());
            }
            if context.config.project_id.is_empty() && context.config.project_api_key.is_none() {
                warn!("A project id or project API key are usually required to start a session");
            }
        }

        let project_id = self.context.read().await.config.project_id.clone();
        let descriptor = self
            .transport
            .start_session(&project_id, &parameters)
            .await
            .map_err(|e| EngineError::transport("start_session", e))?;

        info!("Session started with ID {}", descriptor.id);
        self.context.write().await.set_session(descriptor.id.clone());

        if parameters.commence_analytics_on_start {
            info!("Analytics set to start on session start");
            if let Err(e) = self.start_analytics().await {
                error!("Could not start analytics: {e}");
            }
        }

        Ok(descriptor.id)
    }

    /// Stops the running session: flushes pending engagement state, sends the
    /// final analytics batch, then closes the session on the backend. The
    /// polling loop observes the cleared session and stops on its next tick.
    pub async fn stop_session(&mut self) -> Result<(), EngineError> {
        let session_id = {
            let context = self.context.read().await;
            match context.session_id() {
                Some(id) => id.clone(),
                None => {
                    error!("There is no current running session so it cannot be stopped");
                    return Err(EngineError::NoActiveSession("stop_session"));
                }
            }
        };

        info!("Stopping session with ID {session_id}");
        self.correlator
            .flush_session_stop(self.scene.observer_pose())
            .await;

        self.transport
            .stop_session(&session_id)
            .await
            .map_err(|e| EngineError::transport("stop_session", e))?;

        self.context.write().await.clear_session();
        self.correlator.set_ready(false);
        // The polling task observes the cleared session and exits on its next
        // tick; dropping the handle here lets a future session restart it.
        self.polling_handle = None;
        Ok(())
    }

    /// Enables engagement tracking. Requires a running session and an
    /// observer pose source; without the latter analytics stay disabled but
    /// fulfillment is unaffected.
    pub async fn start_analytics(&mut self) -> Result<(), EngineError> {
        if self.context.read().await.session_id().is_none() {
            error!("Session must be started for analytics to run");
            return Err(EngineError::NoActiveSession("start_analytics"));
        }
        if self.scene.observer_pose().is_none() {
            warn!("An observer must be assigned for analytics");
            return Err(EngineError::MissingObserver);
        }
        self.correlator.set_ready(true);
        Ok(())
    }

    pub fn stop_analytics(&mut self) {
        self.correlator.set_ready(false);
    }

    // ========================================================================
    // Placement
    // ========================================================================

    /// Places one slot instance into the running scene. The initial LOD state
    /// is computed from the current observer distance and the area's bounds
    /// grow to include the position.
    pub async fn place_instance(
        &mut self,
        unit_id: UnitId,
        area_id: AreaId,
        position: Vec3,
        config: ContentSlotConfig,
    ) -> InstanceId {
        let distance = self.distance_to_observer(position);
        let instance = SlotInstance::new(unit_id, area_id.clone(), position, config, distance);
        let id = self.context.write().await.registry.insert(instance);
        self.bounds.on_instance_placed(&area_id, position);
        id
    }

    /// Removes an instance, shrinking nothing: the area's bound is deleted
    /// only when its last instance goes.
    pub async fn remove_instance(&mut self, id: InstanceId) {
        let removed = self.context.write().await.registry.remove(id);
        if let Some(instance) = removed {
            self.bounds.on_instance_removed(&instance.area_id);
        }
    }

    /// Subscribes a content consumer to one instance's updates.
    pub async fn observe_instance(&self, id: InstanceId, observer: Arc<dyn FulfillmentObserver>) {
        self.context.write().await.registry.observe(id, observer);
    }

    /// Recomputes an area's bounds from the current placements.
    pub async fn reset_area_bounds(&mut self, area_id: &AreaId) {
        let positions: Vec<Vec3> = self
            .context
            .read()
            .await
            .registry
            .iter()
            .filter(|i| &i.area_id == area_id)
            .map(|i| i.position)
            .collect();
        self.bounds.reset_bounds(area_id, &positions);
    }

    /// The bounds tracker, for host-side inspection.
    pub fn area_bounds(&self) -> &AreaBoundsTracker {
        &self.bounds
    }

    // ========================================================================
    // Fulfillment
    // ========================================================================

    /// Runs the instant pass and, when polling is enabled, starts the
    /// checksum polling loop.
    pub async fn start_automatic_fulfillment(&mut self) -> Result<(), EngineError> {
        self.fulfillment.run_instant_fulfillment().await?;

        let (enabled, interval) = {
            let context = self.context.read().await;
            (
                context.config.polling_enabled,
                context.config.polling_interval_seconds,
            )
        };
        if enabled && self.polling_handle.is_none() {
            self.polling_handle = Some(self.fulfillment.start_polling(interval)?);
        }
        Ok(())
    }

    /// Runs the instant pass only, leaving polling untouched.
    pub async fn run_instant_fulfillment(&self) -> Result<(), EngineError> {
        self.fulfillment.run_instant_fulfillment().await
    }

    /// Starts the checksum polling loop with an explicit interval.
    pub fn start_polling(&mut self, interval_seconds: u64) -> Result<(), EngineError> {
        if self.polling_handle.is_none() {
            self.polling_handle = Some(self.fulfillment.start_polling(interval_seconds)?);
        }
        Ok(())
    }

    /// Runs fulfillment for an explicit set of instances.
    pub async fn run_manual_fulfillment(
        &self,
        ids: &[InstanceId],
        extra_tags: &[String],
    ) -> Result<(), EngineError> {
        self.fulfillment.run_manual_fulfillment(ids, extra_tags).await
    }

    /// Adds a session-scoped dynamic tag to future fulfillment requests.
    pub async fn add_dynamic_tag(&self, tag: &str) {
        self.context.write().await.add_dynamic_tag(tag);
    }

    /// Removes a session-scoped dynamic tag.
    pub async fn remove_dynamic_tag(&self, tag: &str) {
        self.context.write().await.remove_dynamic_tag(tag);
    }

    /// Attaches a server-side user tag to the running session.
    pub async fn add_session_tag(&self, tag_id: &str) -> Result<(), EngineError> {
        let Some(session_id) = self.context.read().await.session_id().cloned() else {
            warn!("Cannot add tag before the session has started");
            return Err(EngineError::NoActiveSession("add_session_tag"));
        };
        self.transport
            .add_session_tag(&session_id, tag_id)
            .await
            .map_err(|e| EngineError::transport("add_session_tag", e))?;
        info!("User tag with ID '{tag_id}' added to current session");
        Ok(())
    }

    /// Detaches a server-side user tag from the running session.
    pub async fn remove_session_tag(&self, tag_id: &str) -> Result<(), EngineError> {
        let Some(session_id) = self.context.read().await.session_id().cloned() else {
            warn!("Cannot remove tag before the session has started");
            return Err(EngineError::NoActiveSession("remove_session_tag"));
        };
        self.transport
            .remove_session_tag(&session_id, tag_id)
            .await
            .map_err(|e| EngineError::transport("remove_session_tag", e))?;
        info!("User tag with ID '{tag_id}' removed from current session");
        Ok(())
    }

    // ========================================================================
    // Analytics entry points
    // ========================================================================

    /// Logs one audio engagement action for an instance.
    pub async fn log_audio(&mut self, instance_id: InstanceId, action: MediaAction) {
        let fulfillment_id = self.active_fulfillment_id(instance_id).await;
        self.correlator
            .log_audio(instance_id, fulfillment_id.as_ref(), action)
            .await;
    }

    /// Logs one video engagement action for an instance.
    pub async fn log_video(&mut self, instance_id: InstanceId, action: MediaAction) {
        let fulfillment_id = self.active_fulfillment_id(instance_id).await;
        self.correlator
            .log_video(instance_id, fulfillment_id.as_ref(), action)
            .await;
    }

    /// Logs a conversion for a fulfilled instance.
    pub async fn log_conversion(&mut self, instance_id: InstanceId) {
        let fulfillment_id = self.active_fulfillment_id(instance_id).await;
        self.correlator
            .log_conversion(instance_id, fulfillment_id.as_ref())
            .await;
    }

    // ========================================================================
    // Tick driver
    // ========================================================================

    /// One logical frame. LOD evaluation runs before engagement sampling so
    /// quality selection is settled when events are recorded.
    pub async fn tick(&mut self) {
        if self.context.read().await.session_id().is_none() {
            return;
        }

        self.evaluate_lod().await;
        self.fire_range_triggers().await;

        let (max_distance, player_threshold, probe_radius) = {
            let context = self.context.read().await;
            (
                context.config.gaze_max_distance,
                context.config.player_position_threshold,
                context.config.area_probe_radius,
            )
        };
        self.correlator
            .track_gaze(self.scene.as_ref(), max_distance)
            .await;
        self.correlator
            .track_player(
                self.scene.as_ref(),
                &self.bounds,
                player_threshold,
                probe_radius,
            )
            .await;
    }

    async fn evaluate_lod(&mut self) {
        let Some(observer) = self.scene.observer_pose() else {
            return;
        };

        let transitions = {
            let mut context = self.context.write().await;
            let mut transitions = Vec::new();
            for instance in context.registry.iter_mut() {
                let position = self
                    .scene
                    .instance_position(instance.id)
                    .unwrap_or(instance.position);
                let distance = observer.position.distance(&position);
                if let Some(status) = instance.lod.evaluate(&instance.config, distance) {
                    transitions.push((instance.id, status));
                }
            }
            for (id, status) in &transitions {
                context.registry.notify_lod_change(*id, *status);
            }
            transitions
        };

        for (id, status) in transitions {
            info!("Instance {id} LOD changed to {status:?}");
        }
    }

    async fn fire_range_triggers(&mut self) {
        let due: Vec<InstanceId> = {
            let Some(observer) = self.scene.observer_pose() else {
                return;
            };
            let context = self.context.read().await;
            context
                .registry
                .iter()
                .filter(|instance| {
                    let position = self
                        .scene
                        .instance_position(instance.id)
                        .unwrap_or(instance.position);
                    instance.range_trigger_due(observer.position.distance(&position))
                })
                .map(|instance| instance.id)
                .collect()
        };

        if due.is_empty() {
            return;
        }

        {
            let mut context = self.context.write().await;
            for id in &due {
                if let Some(instance) = context.registry.get_mut(*id) {
                    instance.range_triggered = true;
                }
            }
        }

        if let Err(e) = self.fulfillment.run_manual_fulfillment(&due, &[]).await {
            error!("Range-triggered fulfillment failed: {e}");
        }
    }

    async fn active_fulfillment_id(&self, instance_id: InstanceId) -> Option<FulfillmentId> {
        self.context
            .read()
            .await
            .registry
            .get(instance_id)
            .and_then(|i| i.active_fulfillment_id.clone())
    }

    fn distance_to_observer(&self, position: Vec3) -> f64 {
        match self.scene.observer_pose() {
            Some(pose) => pose.position.distance(&position),
            // No observer yet: treat the instance as at the observer so LOD
            // starts inside the high-quality range.
            None => 0.0,
        }
    }
}

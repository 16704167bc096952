//! Fulfillment engine: batching, chunking and checksum polling.
//!
//! Resolves content for placed instances in chunks of up to
//! [`FULFILLMENT_CHUNK_SIZE`](crate::config::FULFILLMENT_CHUNK_SIZE) units per
//! request. Three entry points share the chunked dispatch path: the instant
//! pass (run once per session for `Instant` behaviour instances), manual
//! fulfillment (application-driven, also used by range triggers), and the
//! checksum polling loop (periodic, gated on the instant pass having
//! finished).
//!
//! Each pass owns its own [`PassJoin`] state, so an instant pass and a polled
//! pass can never share completion counters. A single `in_flight` guard keeps
//! polling single-flight: a tick is skipped while any engine-driven pass is
//! outstanding.

use crate::config::FULFILLMENT_CHUNK_SIZE;
use crate::context::SharedContext;
use crate::error::EngineError;
use crate::transport::ApiClient;
use futures::future::join_all;
use prism_types::{
    FulfillmentBehaviour, FulfillmentRequest, InstanceId, RequestMetadata, UnitChecksum,
    UnitFulfillmentRequest,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};

/// Join state for one chunked dispatch pass.
///
/// Pending is fixed when the pass is chunked; complete is incremented once per
/// chunk return, success or fault. The pass is finished exactly when the two
/// are equal.
#[derive(Debug, Default)]
pub struct PassJoin {
    pending: AtomicUsize,
    complete: AtomicUsize,
}

impl PassJoin {
    pub fn new(pending: usize) -> Self {
        Self {
            pending: AtomicUsize::new(pending),
            complete: AtomicUsize::new(0),
        }
    }

    /// Records one chunk as returned.
    pub fn mark_complete(&self) {
        self.complete.fetch_add(1, Ordering::SeqCst);
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn complete(&self) -> usize {
        self.complete.load(Ordering::SeqCst)
    }

    /// True once every chunk constituent has returned.
    pub fn is_complete(&self) -> bool {
        self.pending() == self.complete()
    }
}

#[derive(Debug, Default)]
struct EngineState {
    instant_finished: bool,
    in_flight: bool,
}

/// The fulfillment engine. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct FulfillmentEngine {
    context: SharedContext,
    transport: Arc<dyn ApiClient>,
    state: Arc<RwLock<EngineState>>,
}

impl FulfillmentEngine {
    pub fn new(context: SharedContext, transport: Arc<dyn ApiClient>) -> Self {
        Self {
            context,
            transport,
            state: Arc::new(RwLock::new(EngineState::default())),
        }
    }

    /// Runs the once-per-session instant pass over every active instance with
    /// `Instant` behaviour.
    ///
    /// Finding no such instances is a warning, not an error: the pass is
    /// marked finished so polling can begin.
    pub async fn run_instant_fulfillment(&self) -> Result<(), EngineError> {
        {
            let mut state = self.state.write().await;
            if state.in_flight {
                warn!("A fulfillment pass is already in flight, skipping instant pass");
                return Ok(());
            }
            state.in_flight = true;
        }

        let ids = {
            let context = self.context.read().await;
            context
                .registry
                .ids_with_behaviour(FulfillmentBehaviour::Instant)
        };

        let result = if ids.is_empty() {
            warn!("No units found, no instant fulfillment to run");
            Ok(())
        } else {
            info!(
                "{} units to fulfill with 'Instant' fulfillment behaviour",
                ids.len()
            );
            let outcome = self.run_pass(&ids, &[], "instant").await;
            if outcome.is_ok() {
                info!("Instant fulfillment complete");
            }
            outcome
        };

        let mut state = self.state.write().await;
        state.instant_finished = true;
        state.in_flight = false;
        result
    }

    /// Runs fulfillment for an explicit set of instances, with optional
    /// ad-hoc dynamic tags applied to this request only.
    pub async fn run_manual_fulfillment(
        &self,
        ids: &[InstanceId],
        extra_tags: &[String],
    ) -> Result<(), EngineError> {
        info!("Running manual fulfillment for {} instance(s)", ids.len());
        self.run_pass(ids, extra_tags, "manual").await
    }

    /// Spawns the checksum polling loop.
    ///
    /// Polling ticks are skipped while a previous pass is in flight and never
    /// run before the instant pass has finished. The loop stops when the
    /// session ends. Intervals under one second are rejected for performance
    /// reasons.
    pub fn start_polling(
        &self,
        interval_seconds: u64,
    ) -> Result<tokio::task::JoinHandle<()>, EngineError> {
        if interval_seconds < 1 {
            warn!("Polling rates under 1 second are not supported for performance reasons");
            return Err(EngineError::PollingIntervalTooSmall);
        }

        let engine = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(interval_seconds));
            ticker.tick().await; // the first tick completes immediately
            loop {
                ticker.tick().await;
                if engine.context.read().await.session_id().is_none() {
                    debug!("Session ended, stopping fulfillment polling");
                    break;
                }
                if let Err(e) = engine.run_polled_fulfillment().await {
                    error!("Polled fulfillment tick failed: {e}");
                }
            }
        });
        Ok(handle)
    }

    /// One polling tick: fetch checksums for fulfilled instances, adopt
    /// baselines, re-fulfill the stale ones.
    pub async fn run_polled_fulfillment(&self) -> Result<(), EngineError> {
        {
            let mut state = self.state.write().await;
            if !state.instant_finished || state.in_flight {
                debug!("Skipping polling tick, a pass is in flight or instant has not finished");
                return Ok(());
            }
            state.in_flight = true;
        }

        let result = self.poll_once().await;

        self.state.write().await.in_flight = false;
        result
    }

    async fn poll_once(&self) -> Result<(), EngineError> {
        let (ids, unit_ids) = {
            let context = self.context.read().await;
            let ids = context.registry.fulfilled_ids();
            let unit_ids = context.registry.unit_ids_for(&ids);
            (ids, unit_ids)
        };

        if ids.is_empty() {
            return Ok(());
        }

        let checksums = match self.transport.get_checksums(&unit_ids).await {
            Ok(checksums) => checksums,
            Err(e) => {
                error!("Failed getting unit checksums: {e}");
                return Err(EngineError::transport("get_checksums", e));
            }
        };

        let stale = {
            let mut context = self.context.write().await;
            reconcile_checksums(&mut context.registry, &ids, &checksums)
        };

        if stale.is_empty() {
            return Ok(());
        }

        info!("{} units polled for fulfillment", stale.len());
        let stale_ids: Vec<InstanceId> = stale.iter().map(|(id, _)| *id).collect();
        let outcome = self.run_pass(&stale_ids, &[], "polled").await;

        // The new checksum is adopted only once the re-fulfillment pass went
        // through; a faulted pass leaves the stored value stale so the next
        // tick retries.
        if outcome.is_ok() {
            let mut context = self.context.write().await;
            for (id, checksum) in stale {
                if let Some(instance) = context.registry.get_mut(id) {
                    instance.last_fulfillment_checksum = Some(checksum);
                }
            }
        }
        outcome
    }

    /// Chunks a selection and dispatches every chunk concurrently with a
    /// per-pass join.
    async fn run_pass(
        &self,
        ids: &[InstanceId],
        extra_tags: &[String],
        label: &'static str,
    ) -> Result<(), EngineError> {
        if self.context.read().await.session_id().is_none() {
            warn!("You cannot run fulfillment without a valid session");
            return Err(EngineError::NoActiveSession("fulfillment pass"));
        }

        let chunks: Vec<Vec<InstanceId>> = ids
            .chunks(FULFILLMENT_CHUNK_SIZE)
            .map(|c| c.to_vec())
            .collect();
        let join = PassJoin::new(chunks.len());

        let results = join_all(
            chunks
                .into_iter()
                .map(|chunk| self.dispatch_chunk(chunk, extra_tags.to_vec(), &join)),
        )
        .await;

        debug_assert!(join.is_complete());
        let failures = results.iter().filter(|r| r.is_err()).count();
        debug!(
            pass = label,
            chunks = join.pending(),
            failures,
            "fulfillment pass joined"
        );

        // Chunk faults were already logged; the pass itself completes so the
        // remaining instances are unaffected.
        results.into_iter().find(|r| r.is_err()).unwrap_or(Ok(()))
    }

    /// Dispatches one chunk: emits the synchronous `Started` signals, sends
    /// the request, applies the response.
    async fn dispatch_chunk(
        &self,
        ids: Vec<InstanceId>,
        extra_tags: Vec<String>,
        join: &PassJoin,
    ) -> Result<(), EngineError> {
        let request = {
            let context = self.context.read().await;
            let session_id = match context.session_id() {
                Some(id) => id.clone(),
                None => {
                    warn!("Session ended before chunk dispatch");
                    join.mark_complete();
                    return Err(EngineError::NoActiveSession("chunk dispatch"));
                }
            };

            let units: Vec<UnitFulfillmentRequest> = ids
                .iter()
                .filter_map(|id| context.registry.get(*id))
                .map(|instance| UnitFulfillmentRequest {
                    unit_id: instance.unit_id.clone(),
                    metadata: RequestMetadata::for_kind(
                        instance.config.kind,
                        &instance.config.min_quality_id,
                        &instance.config.max_quality_id,
                    ),
                })
                .collect();

            // Started signals go out strictly before the network call so
            // consumers can show a loading state.
            for id in &ids {
                if let Some(instance) = context.registry.get(*id) {
                    context
                        .registry
                        .notify_fulfillment(*id, &instance.started_update());
                }
            }

            FulfillmentRequest {
                session_id,
                dynamic_tags: context.resolved_dynamic_tags(&extra_tags),
                project_api_key: context.config.project_api_key.clone(),
                units,
            }
        };

        let response = match self.transport.fulfill(&request).await {
            Ok(response) => response,
            Err(e) => {
                error!("Fulfillment request faulted: {e}");
                join.mark_complete();
                return Err(EngineError::transport("fulfill", e));
            }
        };

        {
            let mut context = self.context.write().await;
            for unit in &response.units {
                context.registry.apply_unit_response(unit);
                context.custom_metadata.handle_response(unit);
            }
        }
        join.mark_complete();
        Ok(())
    }
}

/// Applies one checksum fetch to the registry.
///
/// Instances with no stored checksum adopt the fetched value as their baseline
/// without triggering a request; instances whose stored checksum differs are
/// returned for re-fulfillment, paired with the fetched value so the caller
/// can adopt it once the pass succeeds. Checksums for unit ids with no live
/// instance are ignored.
fn reconcile_checksums(
    registry: &mut crate::context::InstanceRegistry,
    ids: &[InstanceId],
    checksums: &[UnitChecksum],
) -> Vec<(InstanceId, String)> {
    let mut stale = Vec::new();
    let mut matched_units: std::collections::HashSet<&str> = std::collections::HashSet::new();

    for id in ids {
        let Some(instance) = registry.get_mut(*id) else {
            continue;
        };
        let Some(fetched) = checksums.iter().find(|c| c.unit_id == instance.unit_id) else {
            continue;
        };
        matched_units.insert(fetched.unit_id.as_str());

        match &instance.last_fulfillment_checksum {
            None => {
                // First observation establishes the baseline.
                instance.last_fulfillment_checksum = Some(fetched.checksum.clone());
            }
            Some(stored) if stored != &fetched.checksum => {
                stale.push((*id, fetched.checksum.clone()));
            }
            Some(_) => {}
        }
    }

    for checksum in checksums {
        if !matched_units.contains(checksum.unit_id.as_str()) {
            debug!(
                "Checksum for unit {} does not match any live instance, ignoring",
                checksum.unit_id
            );
        }
    }

    stale
}

//! Session-scoped engine context.
//!
//! The context replaces the process-wide client singletons of earlier designs
//! with an explicitly constructed value whose lifecycle is tied to session
//! start/stop. It owns the engine configuration, the current session id, the
//! dynamic tag sets and the registry of placed instances. All mutation happens
//! from the tick loop or from awaited engine calls, behind one
//! `tokio::sync::RwLock`.

use crate::config::EngineConfig;
use crate::instance::{FulfillmentObserver, SlotInstance};
use crate::metadata::CustomMetadataRegistry;
use prism_types::{
    FulfillmentBehaviour, InstanceId, LodStatus, SessionId, UnitFulfillmentResponse,
    UnitFulfillmentUpdate, UnitId,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Shared handle to the engine context.
pub type SharedContext = Arc<RwLock<EngineContext>>;

/// Registry of placed slot instances and their content observers.
#[derive(Default)]
pub struct InstanceRegistry {
    instances: HashMap<InstanceId, SlotInstance>,
    observers: HashMap<InstanceId, Vec<Arc<dyn FulfillmentObserver>>>,
}

impl InstanceRegistry {
    /// Registers an instance, returning its id.
    pub fn insert(&mut self, instance: SlotInstance) -> InstanceId {
        let id = instance.id;
        self.instances.insert(id, instance);
        id
    }

    /// Removes an instance and its observers.
    pub fn remove(&mut self, id: InstanceId) -> Option<SlotInstance> {
        self.observers.remove(&id);
        self.instances.remove(&id)
    }

    pub fn get(&self, id: InstanceId) -> Option<&SlotInstance> {
        self.instances.get(&id)
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut SlotInstance> {
        self.instances.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SlotInstance> {
        self.instances.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SlotInstance> {
        self.instances.values_mut()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Ids of instances with the given behaviour and a usable unit id.
    pub fn ids_with_behaviour(&self, behaviour: FulfillmentBehaviour) -> Vec<InstanceId> {
        self.instances
            .values()
            .filter(|i| !i.unit_id.is_empty())
            .filter(|i| i.config.fulfillment_behaviour == behaviour)
            .map(|i| i.id)
            .collect()
    }

    /// Ids of instances already fulfilled this session; the polling
    /// selection.
    pub fn fulfilled_ids(&self) -> Vec<InstanceId> {
        self.instances
            .values()
            .filter(|i| !i.unit_id.is_empty())
            .filter(|i| i.fulfilled_since_session_start)
            .map(|i| i.id)
            .collect()
    }

    /// Subscribes an observer to one instance's fulfillment and LOD updates.
    pub fn observe(&mut self, id: InstanceId, observer: Arc<dyn FulfillmentObserver>) {
        self.observers.entry(id).or_default().push(observer);
    }

    /// Fans one update out to the observers of an instance.
    pub fn notify_fulfillment(&self, id: InstanceId, update: &UnitFulfillmentUpdate) {
        if let Some(observers) = self.observers.get(&id) {
            for observer in observers {
                observer.handle_fulfillment(update);
            }
        }
    }

    /// Fans one LOD transition out to the observers of an instance.
    pub fn notify_lod_change(&self, id: InstanceId, status: LodStatus) {
        if let Some(observers) = self.observers.get(&id) {
            for observer in observers {
                observer.handle_lod_change(status);
            }
        }
    }

    /// Applies a unit response to every instance referencing that unit and
    /// notifies their observers. Multiple placements of one unit all update.
    pub fn apply_unit_response(&mut self, response: &UnitFulfillmentResponse) -> usize {
        let matched: Vec<InstanceId> = self
            .instances
            .values()
            .filter(|i| i.unit_id == response.unit_id)
            .map(|i| i.id)
            .collect();

        for id in &matched {
            let update = self
                .instances
                .get_mut(id)
                .map(|instance| instance.apply_response(response));
            if let Some(update) = update {
                self.notify_fulfillment(*id, &update);
            }
        }
        matched.len()
    }

    /// Unit ids (deduplicated) for a set of instances.
    pub fn unit_ids_for(&self, ids: &[InstanceId]) -> Vec<UnitId> {
        let mut seen = std::collections::HashSet::new();
        ids.iter()
            .filter_map(|id| self.instances.get(id))
            .filter(|i| seen.insert(i.unit_id.clone()))
            .map(|i| i.unit_id.clone())
            .collect()
    }
}

/// Session-lifecycle state shared by every engine component.
pub struct EngineContext {
    pub config: EngineConfig,
    session: Option<SessionId>,
    active_dynamic_tags: Vec<String>,
    pub registry: InstanceRegistry,
    /// Typed handlers for project-defined response metadata, resolved at
    /// configuration time.
    pub custom_metadata: CustomMetadataRegistry,
}

impl EngineContext {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            session: None,
            active_dynamic_tags: Vec::new(),
            registry: InstanceRegistry::default(),
            custom_metadata: CustomMetadataRegistry::new(),
        }
    }

    /// Current session id, if a session is running.
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    pub fn set_session(&mut self, session: SessionId) {
        self.session = Some(session);
    }

    pub fn clear_session(&mut self) {
        self.session = None;
    }

    /// Adds a session-scoped dynamic tag to future fulfillment requests.
    /// Tags already present (persisted or ad-hoc) are not duplicated.
    pub fn add_dynamic_tag(&mut self, tag: &str) {
        if self.config.persisted_dynamic_tags.iter().any(|t| t == tag)
            || self.active_dynamic_tags.iter().any(|t| t == tag)
        {
            info!("Failed to add dynamic tag \"{tag}\"; tag already exists");
            return;
        }
        info!("Adding dynamic tag \"{tag}\" to future fulfillment requests");
        self.active_dynamic_tags.push(tag.to_string());
    }

    /// Removes a session-scoped dynamic tag. Persisted tags cannot be removed
    /// at runtime.
    pub fn remove_dynamic_tag(&mut self, tag: &str) {
        if let Some(index) = self.active_dynamic_tags.iter().position(|t| t == tag) {
            self.active_dynamic_tags.remove(index);
            info!("Dynamic tag \"{tag}\" successfully removed");
            return;
        }
        if self.config.persisted_dynamic_tags.iter().any(|t| t == tag) {
            info!("Failed to remove dynamic tag \"{tag}\"; tag is part of project configuration");
            return;
        }
        info!("Failed to remove dynamic tag \"{tag}\"; tag not currently in use");
    }

    /// Union of persisted tags, session ad-hoc tags and per-request extras,
    /// first occurrence wins.
    pub fn resolved_dynamic_tags(&self, extras: &[String]) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.config
            .persisted_dynamic_tags
            .iter()
            .chain(self.active_dynamic_tags.iter())
            .chain(extras.iter())
            .filter(|t| seen.insert(t.as_str().to_string()))
            .cloned()
            .collect()
    }
}

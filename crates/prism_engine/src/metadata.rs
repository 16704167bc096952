//! Custom metadata dispatch.
//!
//! Fulfillment responses can carry project-defined key/value metadata. The
//! registry maps metadata keys to typed handlers resolved at configuration
//! time; keys without a registered handler are skipped with a debug log.

use prism_types::UnitFulfillmentResponse;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::{debug, warn};

type Handler = Box<dyn Fn(&serde_json::Value) + Send + Sync>;

/// Typed handler registry keyed by metadata-key identifier.
#[derive(Default)]
pub struct CustomMetadataRegistry {
    handlers: HashMap<String, Handler>,
}

impl CustomMetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a raw JSON handler for a metadata key.
    pub fn register(&mut self, key: impl Into<String>, handler: Handler) {
        self.handlers.insert(key.into(), handler);
    }

    /// Registers a handler receiving the deserialized value. Payloads that
    /// fail to deserialize are dropped with a warning.
    pub fn register_typed<T, F>(&mut self, key: impl Into<String>, handler: F)
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        let key = key.into();
        let log_key = key.clone();
        self.register(
            key,
            Box::new(move |value| match serde_json::from_value::<T>(value.clone()) {
                Ok(typed) => handler(typed),
                Err(e) => {
                    warn!("Custom metadata for key \"{log_key}\" has an unexpected shape: {e}")
                }
            }),
        );
    }

    /// Dispatches every custom metadata entry of one unit response.
    pub fn handle_response(&self, response: &UnitFulfillmentResponse) {
        for entry in &response.custom_metadata {
            match self.handlers.get(&entry.key) {
                Some(handler) => handler(&entry.value),
                None => debug!(
                    "No handler registered for custom metadata key \"{}\", skipping",
                    entry.key
                ),
            }
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_types::{CustomMetadataEntry, FulfillmentId, UnitId};
    use std::sync::{Arc, Mutex};

    fn response(entries: Vec<CustomMetadataEntry>) -> UnitFulfillmentResponse {
        UnitFulfillmentResponse {
            unit_id: UnitId::new("unit-1"),
            fulfillment_id: FulfillmentId::new("f-1"),
            metadata: None,
            custom_metadata: entries,
        }
    }

    #[test]
    fn typed_handler_receives_deserialized_value() {
        let mut registry = CustomMetadataRegistry::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        registry.register_typed::<u32, _>("score", move |value| {
            sink.lock().unwrap().push(value);
        });

        registry.handle_response(&response(vec![CustomMetadataEntry {
            key: "score".to_string(),
            value: serde_json::json!(42),
        }]));

        assert_eq!(*received.lock().unwrap(), vec![42]);
    }

    #[test]
    fn unknown_keys_and_bad_payloads_are_skipped() {
        let mut registry = CustomMetadataRegistry::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        registry.register_typed::<u32, _>("score", move |value| {
            sink.lock().unwrap().push(value);
        });

        registry.handle_response(&response(vec![
            CustomMetadataEntry {
                key: "unregistered".to_string(),
                value: serde_json::json!("ignored"),
            },
            CustomMetadataEntry {
                key: "score".to_string(),
                value: serde_json::json!("not a number"),
            },
        ]));

        assert!(received.lock().unwrap().is_empty());
    }
}

//! The per-operation execution context.

use super::{ImageRecord, InputItem};
use crate::config::{ConfigStore, PicBedSettings, PIC_BED_KEY};
use crate::errors::{PicflowError, RequestFailedError};
use crate::events::{EventSink, NoOpEventSink};
use crate::interfaces::{KeyTranslator, Translator};
use crate::lifecycle::LifecycleRegistries;
use crate::request::{RequestAdapter, RequestOptions, RequestResponse};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Handles shared by every context a runtime creates.
#[derive(Clone)]
pub struct SharedResources {
    /// Layered configuration.
    pub config: Arc<ConfigStore>,
    /// The five lifecycle registries.
    pub registries: Arc<LifecycleRegistries>,
    /// Outbound requests.
    pub request: Arc<RequestAdapter>,
    /// Event sink.
    pub events: Arc<dyn EventSink>,
    /// Message lookup for notifications.
    pub translator: Arc<dyn Translator>,
}

impl SharedResources {
    /// Creates resources with empty registries, no events and key translation.
    #[must_use]
    pub fn new(config: Arc<ConfigStore>, request: Arc<RequestAdapter>) -> Self {
        Self {
            config,
            registries: Arc::new(LifecycleRegistries::new()),
            request,
            events: Arc::new(NoOpEventSink),
            translator: Arc::new(KeyTranslator),
        }
    }

    /// Sets the registries.
    #[must_use]
    pub fn with_registries(mut self, registries: Arc<LifecycleRegistries>) -> Self {
        self.registries = registries;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Sets the translator.
    #[must_use]
    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = translator;
        self
    }
}

impl std::fmt::Debug for SharedResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedResources")
            .field("config", &self.config)
            .field("registries", &self.registries)
            .finish_non_exhaustive()
    }
}

/// State for one upload operation.
///
/// `input` is supplied by the caller and `output` is rebuilt by the
/// transformer on every run. Everything else is shared with the runtime.
pub struct ExecutionContext {
    run_id: Uuid,
    /// Caller-supplied inputs.
    pub input: Vec<InputItem>,
    /// Image records, filled by the transformer and completed by the uploader.
    pub output: Vec<ImageRecord>,
    resources: SharedResources,
}

impl ExecutionContext {
    /// Creates a context with a fresh run id.
    #[must_use]
    pub fn new(resources: SharedResources, input: Vec<InputItem>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            input,
            output: Vec::new(),
            resources,
        }
    }

    /// The id of this operation, used in logs and events.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The shared resources.
    #[must_use]
    pub fn resources(&self) -> &SharedResources {
        &self.resources
    }

    /// The configuration store.
    #[must_use]
    pub fn config(&self) -> &ConfigStore {
        &self.resources.config
    }

    /// The lifecycle registries.
    #[must_use]
    pub fn registries(&self) -> &LifecycleRegistries {
        &self.resources.registries
    }

    /// The request adapter.
    #[must_use]
    pub fn request_adapter(&self) -> &RequestAdapter {
        &self.resources.request
    }

    /// Sends a request through the shared adapter.
    ///
    /// # Errors
    ///
    /// See [`RequestAdapter::request`].
    pub async fn request(&self, options: &RequestOptions) -> Result<RequestResponse, RequestFailedError> {
        self.resources.request.request(options).await
    }

    /// Reads configuration; see [`ConfigStore::get_config`].
    #[must_use]
    pub fn get_config(&self, path: Option<&str>) -> Value {
        self.resources.config.get_config(path)
    }

    /// Merges configuration in memory; see [`ConfigStore::set_config`].
    ///
    /// # Errors
    ///
    /// Returns `Config` if `partial` is not an object.
    pub fn set_config(&self, partial: Value) -> Result<(), PicflowError> {
        self.resources.config.set_config(partial)
    }

    /// Merges and persists configuration; see [`ConfigStore::save_config`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigPersist` if persisting fails.
    pub fn save_config(&self, partial: Value) -> Result<(), PicflowError> {
        self.resources.config.save_config(partial)
    }

    /// The typed `picBed` subtree.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the subtree has the wrong shape.
    pub fn pic_bed(&self) -> Result<PicBedSettings, PicflowError> {
        self.resources.config.get_config_as(PIC_BED_KEY)
    }

    /// Emits an event, tagging it with this run's id.
    pub async fn emit(&self, event_type: &str, data: Value) {
        self.resources
            .events
            .emit(event_type, Some(self.tag(data)))
            .await;
    }

    /// Emits an event without awaiting.
    pub fn try_emit(&self, event_type: &str, data: Value) {
        self.resources.events.try_emit(event_type, Some(self.tag(data)));
    }

    fn tag(&self, data: Value) -> Value {
        match data {
            Value::Object(mut map) => {
                map.entry("runId")
                    .or_insert_with(|| Value::String(self.run_id.to_string()));
                Value::Object(map)
            }
            Value::Null => serde_json::json!({ "runId": self.run_id.to_string() }),
            other => serde_json::json!({ "runId": self.run_id.to_string(), "data": other }),
        }
    }

    /// Looks up a user-facing message.
    #[must_use]
    pub fn translate(&self, key: &str, args: &HashMap<String, String>) -> String {
        self.resources.translator.translate(key, args)
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("run_id", &self.run_id)
            .field("input", &self.input)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

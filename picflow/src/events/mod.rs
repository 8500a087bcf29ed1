//! Pipeline events.
//!
//! This module provides:
//! - The `EventSink` trait hosts implement to observe uploads
//! - Built-in sinks (no-op, tracing, collecting)
//! - The event names the executor emits
//!
//! Sinks are passed explicitly through the runtime; there is no global sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use crate::lifecycle::LifecycleStage;
use serde_json::{json, Value};
use uuid::Uuid;

/// Progress update, payload `{"runId", "percent"}`. `-1` means failed.
pub const UPLOAD_PROGRESS: &str = "upload.progress";
/// The run finished, payload carries the output records.
pub const UPLOAD_FINISHED: &str = "upload.finished";
/// The run failed, payload carries the error.
pub const UPLOAD_FAILED: &str = "upload.failed";
/// A user-facing notification, payload `{"title", "body"}`.
pub const NOTIFICATION: &str = "notification";
/// A plugin was registered.
pub const PLUGIN_REGISTERED: &str = "plugin.registered";
/// A plugin was unregistered.
pub const PLUGIN_UNREGISTERED: &str = "plugin.unregistered";

/// Progress percentages emitted at fixed points of a run.
pub mod progress {
    /// The run started.
    pub const STARTED: i32 = 0;
    /// Transforming finished.
    pub const TRANSFORMED: i32 = 30;
    /// Uploading is about to start.
    pub const UPLOADING: i32 = 60;
    /// The run finished.
    pub const DONE: i32 = 100;
    /// The run failed.
    pub const FAILED: i32 = -1;
}

/// The event name emitted when `stage` starts, e.g. `stage.before_upload`.
#[must_use]
pub fn stage_event(stage: LifecycleStage) -> &'static str {
    match stage {
        LifecycleStage::BeforeTransform => "stage.before_transform",
        LifecycleStage::Transformer => "stage.transformer",
        LifecycleStage::BeforeUpload => "stage.before_upload",
        LifecycleStage::Uploader => "stage.uploader",
        LifecycleStage::AfterUpload => "stage.after_upload",
    }
}

/// Builds a progress payload.
#[must_use]
pub fn progress_payload(run_id: Uuid, percent: i32) -> Value {
    json!({ "runId": run_id.to_string(), "percent": percent })
}

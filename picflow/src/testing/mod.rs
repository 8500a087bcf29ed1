//! Testing utilities for picflow hosts and plugins.
//!
//! This module provides:
//! - Mock uploaders, handlers and transports
//! - In-memory resources and contexts

mod fixtures;
mod mocks;

pub use crate::events::CollectingEventSink;
pub use fixtures::{resources_with_transport, test_context, test_resources};
pub use mocks::{
    call_log, CallLog, FailingHandler, MockUploader, RecordingHandler, StaticTransport,
};

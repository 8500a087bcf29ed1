//! Ready-made resources and contexts for tests.

use std::sync::Arc;

use super::StaticTransport;
use crate::config::ConfigStore;
use crate::context::{ExecutionContext, InputItem, SharedResources};
use crate::request::{HttpTransport, RequestAdapter};

/// Resources over an in-memory config store and a transport answering
/// `200` with an empty body.
#[must_use]
pub fn test_resources() -> SharedResources {
    resources_with_transport(Arc::new(StaticTransport::ok(Vec::new())))
}

/// Resources over an in-memory config store and `transport`.
#[must_use]
pub fn resources_with_transport(transport: Arc<dyn HttpTransport>) -> SharedResources {
    SharedResources::new(
        Arc::new(ConfigStore::in_memory()),
        Arc::new(RequestAdapter::new(transport)),
    )
}

/// A fresh context over [`test_resources`].
#[must_use]
pub fn test_context(input: Vec<InputItem>) -> ExecutionContext {
    ExecutionContext::new(test_resources(), input)
}

//! Mock uploaders, handlers and transports.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::context::{ExecutionContext, ImageRecord};
use crate::errors::{PicflowError, RequestFailedError};
use crate::plugin::{StageHandler, UploadGranularity, Uploader};
use crate::request::{HttpTransport, RawResponse, RequestOptions};

/// An uploader that assigns `<base_url>/<file_name>` without network I/O.
#[derive(Debug)]
pub struct MockUploader {
    base_url: String,
    granularity: UploadGranularity,
    calls: AtomicUsize,
}

impl MockUploader {
    /// Creates a per-image uploader.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            granularity: UploadGranularity::PerImage,
            calls: AtomicUsize::new(0),
        }
    }

    /// Switches to batch granularity.
    #[must_use]
    pub fn batch(mut self) -> Self {
        self.granularity = UploadGranularity::Batch;
        self
    }

    /// Number of upload calls received.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Uploader for MockUploader {
    fn granularity(&self) -> UploadGranularity {
        self.granularity
    }

    async fn upload_image(
        &self,
        _ctx: &ExecutionContext,
        image: &mut ImageRecord,
    ) -> Result<(), PicflowError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        image.img_url = Some(format!("{}/{}", self.base_url, image.file_name));
        Ok(())
    }

    async fn upload_batch(&self, ctx: &mut ExecutionContext) -> Result<(), PicflowError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for image in &mut ctx.output {
            image.img_url = Some(format!("{}/{}", self.base_url, image.file_name));
        }
        Ok(())
    }
}

/// Shared, ordered log of handler invocations.
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Creates an empty call log.
#[must_use]
pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// A handler that appends its label to a shared log.
#[derive(Debug)]
pub struct RecordingHandler {
    label: String,
    log: CallLog,
}

impl RecordingHandler {
    /// Creates a handler writing `label` to `log`.
    #[must_use]
    pub fn new(label: impl Into<String>, log: CallLog) -> Self {
        Self {
            label: label.into(),
            log,
        }
    }
}

#[async_trait]
impl StageHandler for RecordingHandler {
    async fn handle(&self, _ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        self.log.lock().push(self.label.clone());
        Ok(())
    }
}

/// A handler that always fails.
#[derive(Debug, Clone)]
pub struct FailingHandler {
    message: String,
}

impl FailingHandler {
    /// Creates a handler failing with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl StageHandler for FailingHandler {
    async fn handle(&self, _ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        anyhow::bail!("{}", self.message)
    }
}

/// A transport answering every request with the same response.
#[derive(Debug)]
pub struct StaticTransport {
    response: RawResponse,
    requests: Mutex<Vec<String>>,
}

impl StaticTransport {
    /// Answers with `response`.
    #[must_use]
    pub fn new(response: RawResponse) -> Self {
        Self {
            response,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers `200` with `body`.
    #[must_use]
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(RawResponse::new(200, body))
    }

    /// URLs requested so far.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpTransport for StaticTransport {
    async fn send(&self, request: &RequestOptions) -> Result<RawResponse, RequestFailedError> {
        self.requests.lock().push(request.url.clone());
        Ok(self.response.clone())
    }
}

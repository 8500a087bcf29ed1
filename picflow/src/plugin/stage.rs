//! Traits for the entries that live in lifecycle registries.

use crate::context::{ExecutionContext, ImageRecord};
use crate::errors::PicflowError;
use async_trait::async_trait;
use std::fmt;

/// Builds image records from the context input.
///
/// A transformer reads `ctx.input` and fills `ctx.output`. One transformer
/// runs per upload, selected by `picBed.transformer`.
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Populates `ctx.output`.
    async fn transform(&self, ctx: &mut ExecutionContext) -> Result<(), PicflowError>;
}

/// How an uploader wants to receive records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UploadGranularity {
    /// The executor calls [`Uploader::upload_image`] once per record.
    #[default]
    PerImage,
    /// The executor calls [`Uploader::upload_batch`] once.
    Batch,
}

/// Sends image records to a storage backend and records their URLs.
///
/// Implement [`upload_image`](Self::upload_image) for per-image backends, or
/// override [`upload_batch`](Self::upload_batch) and return
/// [`UploadGranularity::Batch`] for backends that take the whole set.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// The granularity the executor should use.
    fn granularity(&self) -> UploadGranularity {
        UploadGranularity::PerImage
    }

    /// Uploads one record, setting `image.img_url` on success.
    async fn upload_image(
        &self,
        _ctx: &ExecutionContext,
        image: &mut ImageRecord,
    ) -> Result<(), PicflowError> {
        Err(PicflowError::Internal(format!(
            "uploader cannot upload '{}' individually",
            image.file_name
        )))
    }

    /// Uploads every record in `ctx.output`.
    ///
    /// Stops at the first failure; records already uploaded keep their URLs.
    async fn upload_batch(&self, ctx: &mut ExecutionContext) -> Result<(), PicflowError> {
        let mut output = std::mem::take(&mut ctx.output);
        let mut result = Ok(());
        for image in &mut output {
            if let Err(e) = self.upload_image(ctx, image).await {
                result = Err(e);
                break;
            }
        }
        ctx.output = output;
        result
    }
}

/// A handler run in one of the handler stages.
///
/// Handlers may read and mutate the whole context. Errors abort the upload
/// and are reported with the stage and the handler's registered name.
#[async_trait]
pub trait StageHandler: Send + Sync {
    /// Runs the handler.
    async fn handle(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()>;
}

/// Adapts a synchronous closure into a [`StageHandler`].
pub struct FnHandler<F>
where
    F: Fn(&mut ExecutionContext) -> anyhow::Result<()> + Send + Sync,
{
    func: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&mut ExecutionContext) -> anyhow::Result<()> + Send + Sync,
{
    /// Wraps `func`.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> fmt::Debug for FnHandler<F>
where
    F: Fn(&mut ExecutionContext) -> anyhow::Result<()> + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> StageHandler for FnHandler<F>
where
    F: Fn(&mut ExecutionContext) -> anyhow::Result<()> + Send + Sync,
{
    async fn handle(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        (self.func)(ctx)
    }
}

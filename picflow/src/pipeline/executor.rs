//! Drives one upload through the five lifecycle stages.

use super::PipelineState;
use crate::context::{ExecutionContext, ImageRecord};
use crate::errors::{PicflowError, StageHandlerError, TransformerNotFoundError, UploaderNotFoundError};
use crate::events::{
    progress, progress_payload, stage_event, NOTIFICATION, UPLOAD_FAILED, UPLOAD_FINISHED,
    UPLOAD_PROGRESS,
};
use crate::lifecycle::LifecycleStage;
use crate::plugin::UploadGranularity;
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Runs the stage sequence against an execution context.
///
/// `beforeTransform → transformer → beforeUpload → uploader → afterUpload`.
/// Handler stages run every registered entry in order; the transformer and
/// uploader stages run the one entry named in `picBed`. The first error
/// stops the run and leaves `ctx.output` as it was at that point.
#[derive(Debug)]
pub struct PipelineExecutor {
    state: PipelineState,
    history: Vec<PipelineState>,
}

impl Default for PipelineExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineExecutor {
    /// Creates an idle executor.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: PipelineState::Idle,
            history: vec![PipelineState::Idle],
        }
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Every state entered during the last run, starting with `Idle`.
    #[must_use]
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    fn transition(&mut self, next: PipelineState) {
        debug!(from = %self.state, to = %next, "Pipeline state transition");
        self.state = next;
        self.history.push(next);
    }

    /// Runs one upload.
    ///
    /// Returns the output records on success. Records that received a URL
    /// have their payload dropped.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if `ctx.input` is empty
    /// - `StageHandler` if a handler fails, naming the stage and entry
    /// - `TransformerNotFound` / `UploaderNotFound` if the configured entry
    ///   is not registered
    /// - any error returned by the transformer or uploader
    pub async fn execute(&mut self, ctx: &mut ExecutionContext) -> Result<Vec<ImageRecord>, PicflowError> {
        let span = info_span!("upload", run_id = %ctx.run_id());
        self.run(ctx).instrument(span).await
    }

    async fn run(&mut self, ctx: &mut ExecutionContext) -> Result<Vec<ImageRecord>, PicflowError> {
        self.state = PipelineState::Idle;
        self.history = vec![PipelineState::Idle];
        ctx.output.clear();

        let start = Instant::now();
        ctx.emit(UPLOAD_PROGRESS, progress_payload(ctx.run_id(), progress::STARTED))
            .await;

        match self.run_stages(ctx).await {
            Ok(()) => {
                self.transition(PipelineState::Done);
                for image in ctx.output.iter_mut().filter(|i| i.is_uploaded()) {
                    image.strip_payload();
                }
                info!(
                    images = ctx.output.len(),
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Upload finished"
                );
                ctx.emit(UPLOAD_PROGRESS, progress_payload(ctx.run_id(), progress::DONE))
                    .await;
                ctx.emit(UPLOAD_FINISHED, json!({ "output": ctx.output })).await;
                Ok(ctx.output.clone())
            }
            Err(e) => {
                let failed_in = self.state;
                self.transition(PipelineState::Failed);
                error!(error = %e, kind = e.kind(), state = %failed_in, "Upload failed");
                ctx.emit(UPLOAD_PROGRESS, progress_payload(ctx.run_id(), progress::FAILED))
                    .await;
                ctx.emit(
                    UPLOAD_FAILED,
                    json!({ "state": failed_in.to_string(), "error": e.to_dict() }),
                )
                .await;
                let args = HashMap::from([("error".to_string(), e.to_string())]);
                let notification = json!({
                    "title": ctx.translate("UPLOAD_FAILED", &args),
                    "body": ctx.translate("CHECK_SETTINGS_AND_NETWORK", &args),
                    "text": e.to_string(),
                });
                ctx.emit(NOTIFICATION, notification).await;
                Err(e)
            }
        }
    }

    async fn run_stages(&mut self, ctx: &mut ExecutionContext) -> Result<(), PicflowError> {
        if ctx.input.is_empty() {
            return Err(PicflowError::InvalidInput("nothing to upload".to_string()));
        }

        self.run_handlers(LifecycleStage::BeforeTransform, ctx).await?;
        self.transform(ctx).await?;
        ctx.emit(UPLOAD_PROGRESS, progress_payload(ctx.run_id(), progress::TRANSFORMED))
            .await;

        self.run_handlers(LifecycleStage::BeforeUpload, ctx).await?;
        ctx.emit(UPLOAD_PROGRESS, progress_payload(ctx.run_id(), progress::UPLOADING))
            .await;
        self.upload(ctx).await?;

        self.run_handlers(LifecycleStage::AfterUpload, ctx).await
    }

    async fn enter(&mut self, stage: LifecycleStage, ctx: &ExecutionContext) {
        self.transition(PipelineState::running(stage));
        ctx.emit(stage_event(stage), json!({ "stage": stage.as_str() }))
            .await;
    }

    async fn run_handlers(
        &mut self,
        stage: LifecycleStage,
        ctx: &mut ExecutionContext,
    ) -> Result<(), PicflowError> {
        self.enter(stage, ctx).await;
        let entries = match ctx.registries().handlers(stage) {
            Some(registry) => registry.entries(),
            None => Vec::new(),
        };
        for (name, handler) in entries {
            debug!(stage = %stage, handler = %name, "Running handler");
            handler
                .handle(ctx)
                .await
                .map_err(|e| StageHandlerError::new(stage.as_str(), name.as_str(), e))?;
        }
        Ok(())
    }

    async fn transform(&mut self, ctx: &mut ExecutionContext) -> Result<(), PicflowError> {
        self.enter(LifecycleStage::Transformer, ctx).await;
        let id = ctx.pic_bed()?.transformer;
        let transformer = ctx
            .registries()
            .transformer
            .get(&id)
            .ok_or_else(|| TransformerNotFoundError::new(id.as_str()))?;

        debug!(transformer = %id, inputs = ctx.input.len(), "Transforming");
        ctx.output.clear();
        transformer.transform(ctx).await
    }

    async fn upload(&mut self, ctx: &mut ExecutionContext) -> Result<(), PicflowError> {
        self.enter(LifecycleStage::Uploader, ctx).await;
        let pic_bed = ctx.pic_bed()?;
        let Some(id) = pic_bed.active_uploader().map(str::to_string) else {
            warn!("No uploader configured in picBed.uploader or picBed.current");
            return Err(UploaderNotFoundError::new("").into());
        };
        let uploader = ctx
            .registries()
            .uploader
            .get(&id)
            .ok_or_else(|| UploaderNotFoundError::new(id.as_str()))?;

        let granularity = uploader.granularity();
        debug!(uploader = %id, images = ctx.output.len(), ?granularity, "Uploading");
        let result = match granularity {
            UploadGranularity::PerImage => {
                let mut output = std::mem::take(&mut ctx.output);
                let mut result = Ok(());
                for image in &mut output {
                    if let Err(e) = uploader.upload_image(ctx, image).await {
                        result = Err(e);
                        break;
                    }
                }
                ctx.output = output;
                result
            }
            UploadGranularity::Batch => uploader.upload_batch(ctx).await,
        };

        let now = Utc::now();
        for image in ctx.output.iter_mut().filter(|i| i.is_uploaded()) {
            image.stamp(&id, now);
        }
        result
    }
}

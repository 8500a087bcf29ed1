//! End-to-end runs through the executor with the built-in transformers.

#[cfg(test)]
mod tests {
    use crate::config::{ConfigStore, MemoryPersistence};
    use crate::context::{ExecutionContext, InputItem, SharedResources};
    use crate::errors::PicflowError;
    use crate::events::{NOTIFICATION, UPLOAD_FAILED, UPLOAD_FINISHED, UPLOAD_PROGRESS};
    use crate::plugin::FnHandler;
    use crate::pipeline::{PipelineExecutor, PipelineState};
    use crate::request::RequestAdapter;
    use crate::testing::{
        call_log, CollectingEventSink, FailingHandler, MockUploader, RecordingHandler,
        StaticTransport,
    };
    use crate::transformers::{PathTransformer, PATH_TRANSFORMER};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    struct Harness {
        ctx: ExecutionContext,
        events: Arc<CollectingEventSink>,
        persistence: Arc<MemoryPersistence>,
    }

    fn harness(input: Vec<InputItem>) -> Harness {
        let persistence = Arc::new(MemoryPersistence::new());
        let config = ConfigStore::load(persistence.clone()).unwrap();
        let events = Arc::new(CollectingEventSink::new());
        let resources = SharedResources::new(
            Arc::new(config),
            Arc::new(RequestAdapter::new(Arc::new(StaticTransport::ok(Vec::new())))),
        )
        .with_events(events.clone());

        let ctx = ExecutionContext::new(resources, input);
        ctx.registries()
            .transformer
            .register(PATH_TRANSFORMER, Arc::new(PathTransformer))
            .unwrap();
        ctx.registries()
            .uploader
            .register("mock", Arc::new(MockUploader::new("https://example")))
            .unwrap();
        ctx.set_config(json!({"picBed.uploader": "mock"})).unwrap();

        Harness {
            ctx,
            events,
            persistence,
        }
    }

    fn percents(events: &CollectingEventSink) -> Vec<i64> {
        events
            .payloads(UPLOAD_PROGRESS)
            .iter()
            .filter_map(|p| p["percent"].as_i64())
            .collect()
    }

    #[tokio::test]
    async fn test_uploads_local_file_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.png");
        std::fs::write(&file, b"\x89PNG").unwrap();

        let Harness {
            mut ctx,
            events,
            persistence,
        } = harness(vec![InputItem::Path(file)]);
        let mut executor = PipelineExecutor::new();

        let output = executor.execute(&mut ctx).await.unwrap();

        assert_eq!(output.len(), 1);
        assert_eq!(output[0].file_name, "a.png");
        assert_eq!(output[0].extname, ".png");
        assert_eq!(output[0].img_url.as_deref(), Some("https://example/a.png"));
        assert_eq!(output[0].uploader.as_deref(), Some("mock"));
        assert!(output[0].payload.is_none());
        assert_eq!(executor.state(), PipelineState::Done);

        assert_eq!(percents(&events), vec![0, 30, 60, 100]);
        let finished = events.payloads(UPLOAD_FINISHED);
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0]["output"][0]["imgUrl"], "https://example/a.png");
        assert_eq!(finished[0]["runId"], ctx.run_id().to_string());
        assert!(events.payloads(UPLOAD_FAILED).is_empty());

        assert_eq!(persistence.write_count(), 0);
    }

    #[tokio::test]
    async fn test_stage_events_follow_stage_order() {
        let Harness { mut ctx, events, .. } = harness(vec![InputItem::parse(
            "data:image/jpeg;base64,aGk=",
        )]);

        PipelineExecutor::new().execute(&mut ctx).await.unwrap();

        let stages: Vec<_> = events
            .events_of_type("stage.")
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(
            stages,
            vec![
                "stage.before_transform",
                "stage.transformer",
                "stage.before_upload",
                "stage.uploader",
                "stage.after_upload",
            ]
        );
    }

    #[tokio::test]
    async fn test_handlers_run_in_registration_order() {
        let Harness { mut ctx, .. } = harness(vec![InputItem::parse("data:image/png;base64,aGk=")]);
        let log = call_log();
        let registries = ctx.registries();
        registries
            .before_transform
            .register("first", Arc::new(RecordingHandler::new("bt:first", log.clone())))
            .unwrap();
        registries
            .before_transform
            .register("second", Arc::new(RecordingHandler::new("bt:second", log.clone())))
            .unwrap();
        registries
            .before_upload
            .register("compress", Arc::new(RecordingHandler::new("bu:compress", log.clone())))
            .unwrap();
        registries
            .after_upload
            .register("copy", Arc::new(RecordingHandler::new("au:copy", log.clone())))
            .unwrap();

        PipelineExecutor::new().execute(&mut ctx).await.unwrap();

        assert_eq!(
            *log.lock(),
            vec!["bt:first", "bt:second", "bu:compress", "au:copy"]
        );
    }

    #[tokio::test]
    async fn test_failing_handler_stops_the_run() {
        let Harness {
            mut ctx, events, ..
        } = harness(vec![InputItem::parse("data:image/png;base64,aGk=")]);
        let log = call_log();
        ctx.registries()
            .before_upload
            .register("guard", Arc::new(FailingHandler::new("image too large")))
            .unwrap();
        ctx.registries()
            .after_upload
            .register("audit", Arc::new(RecordingHandler::new("audit", log.clone())))
            .unwrap();
        let mut executor = PipelineExecutor::new();

        let err = executor.execute(&mut ctx).await.unwrap_err();

        let PicflowError::StageHandler(inner) = err else {
            panic!("expected a stage handler error");
        };
        assert_eq!(inner.stage, "beforeUpload");
        assert_eq!(inner.entry, "guard");
        assert!(inner.to_string().contains("image too large"));

        assert_eq!(executor.state(), PipelineState::Failed);
        assert_eq!(
            executor.history(),
            &[
                PipelineState::Idle,
                PipelineState::RunningBeforeTransform,
                PipelineState::Transforming,
                PipelineState::RunningBeforeUpload,
                PipelineState::Failed,
            ]
        );
        assert!(log.lock().is_empty());
        assert!(ctx.output[0].img_url.is_none());

        assert_eq!(percents(&events), vec![0, 30, -1]);
        let failed = events.payloads(UPLOAD_FAILED);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0]["state"], "running_before_upload");
        let notifications = events.payloads(NOTIFICATION);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0]["title"], "UPLOAD_FAILED");
        assert!(events.payloads(UPLOAD_FINISHED).is_empty());
    }

    #[tokio::test]
    async fn test_operation_config_is_not_persisted() {
        let Harness {
            mut ctx,
            persistence,
            ..
        } = harness(vec![InputItem::parse("data:image/png;base64,aGk=")]);
        ctx.registries()
            .uploader
            .register("other", Arc::new(MockUploader::new("https://other")))
            .unwrap();
        ctx.registries()
            .before_upload
            .register(
                "switch",
                Arc::new(FnHandler::new(|ctx: &mut ExecutionContext| {
                    ctx.set_config(json!({"picBed.uploader": "other"}))?;
                    Ok(())
                })),
            )
            .unwrap();

        let output = PipelineExecutor::new().execute(&mut ctx).await.unwrap();

        assert!(output[0]
            .img_url
            .as_deref()
            .is_some_and(|url| url.starts_with("https://other/")));
        assert_eq!(ctx.get_config(Some("picBed.uploader")), json!("other"));
        assert_eq!(persistence.write_count(), 0);
        assert!(persistence.persisted().is_none());
    }

    #[tokio::test]
    async fn test_unreadable_file_fails_in_transformer() {
        let Harness {
            mut ctx, events, ..
        } = harness(vec![InputItem::parse("/no/such/dir/a.png")]);
        let mut executor = PipelineExecutor::new();

        let err = executor.execute(&mut ctx).await.unwrap_err();

        assert!(matches!(err, PicflowError::InvalidInput(_)));
        assert_eq!(events.payloads(UPLOAD_FAILED)[0]["state"], "transforming");
        assert!(ctx.output.is_empty());
    }
}

//! The default transformer: files, URLs and inline content.

use crate::context::{ExecutionContext, ImageRecord, InputItem};
use crate::errors::PicflowError;
use crate::plugin::Transformer;
use crate::request::RequestOptions;
use async_trait::async_trait;
use futures::future::try_join_all;
use std::path::Path;
use tracing::debug;

/// Reads local files, downloads URLs and passes inline content through.
///
/// Inputs are loaded concurrently; output order matches input order.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathTransformer;

impl PathTransformer {
    async fn load(ctx: &ExecutionContext, item: &InputItem) -> Result<ImageRecord, PicflowError> {
        match item {
            InputItem::Path(path) => {
                let bytes = tokio::fs::read(path).await.map_err(|e| {
                    PicflowError::InvalidInput(format!("cannot read '{}': {e}", path.display()))
                })?;
                debug!(path = %path.display(), size = bytes.len(), "Read image file");
                Ok(ImageRecord::from_bytes(file_name_of_path(path), bytes))
            }
            InputItem::Url(url) => {
                let bytes = ctx
                    .request(&RequestOptions::get(url.as_str()).array_buffer())
                    .await?
                    .into_bytes();
                debug!(url = %url, size = bytes.len(), "Downloaded image");
                Ok(ImageRecord::from_bytes(file_name_of_url(url), bytes))
            }
            InputItem::Base64 { base64, file_name } => {
                Ok(ImageRecord::from_base64(file_name.as_str(), base64.as_str()))
            }
            InputItem::Bytes { bytes, file_name } => {
                Ok(ImageRecord::from_bytes(file_name.as_str(), bytes.clone()))
            }
        }
    }
}

#[async_trait]
impl Transformer for PathTransformer {
    async fn transform(&self, ctx: &mut ExecutionContext) -> Result<(), PicflowError> {
        let records = {
            let shared: &ExecutionContext = ctx;
            try_join_all(shared.input.iter().map(|item| Self::load(shared, item))).await?
        };
        ctx.output = records;
        Ok(())
    }
}

fn file_name_of_path(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// The last path segment of `url`, without query or fragment.
fn file_name_of_url(url: &str) -> String {
    let without_suffix = url.split(['?', '#']).next().unwrap_or(url);
    let after_scheme = without_suffix
        .split_once("://")
        .map_or(without_suffix, |(_, rest)| rest);
    match after_scheme.split_once('/') {
        Some((_, path)) => path
            .rsplit('/')
            .find(|s| !s.is_empty())
            .unwrap_or("image")
            .to_string(),
        None => "image".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{resources_with_transport, test_context, StaticTransport};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn test_file_name_of_url() {
        assert_eq!(file_name_of_url("https://cdn.example.com/img/a.png?x=1#top"), "a.png");
        assert_eq!(file_name_of_url("https://cdn.example.com/img/"), "img");
        assert_eq!(file_name_of_url("https://cdn.example.com"), "image");
    }

    #[tokio::test]
    async fn test_reads_files_in_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.jpg");
        std::fs::write(&a, b"aaa").unwrap();
        std::fs::write(&b, b"bb").unwrap();

        let mut ctx = test_context(vec![InputItem::Path(b), InputItem::Path(a)]);
        PathTransformer.transform(&mut ctx).await.unwrap();

        let names: Vec<_> = ctx.output.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names, vec!["b.jpg", "a.png"]);
        assert_eq!(ctx.output[0].extname, ".jpg");
        assert_eq!(&*ctx.output[1].bytes().unwrap(), b"aaa");
    }

    #[tokio::test]
    async fn test_missing_file_is_invalid_input() {
        let mut ctx = test_context(vec![InputItem::parse("/definitely/not/here.png")]);
        let err = PathTransformer.transform(&mut ctx).await.unwrap_err();
        assert!(matches!(err, PicflowError::InvalidInput(_)));
        assert!(ctx.output.is_empty());
    }

    #[tokio::test]
    async fn test_downloads_urls_through_adapter() {
        let transport = Arc::new(StaticTransport::ok(vec![9_u8, 8, 7]));
        let resources = resources_with_transport(transport.clone());
        let mut ctx = ExecutionContext::new(
            resources,
            vec![InputItem::parse("https://img.example/cat.gif?size=2")],
        );

        PathTransformer.transform(&mut ctx).await.unwrap();
        assert_eq!(ctx.output[0].file_name, "cat.gif");
        assert_eq!(ctx.output[0].bytes().unwrap().into_owned(), vec![9_u8, 8, 7]);
        assert_eq!(transport.requests(), vec!["https://img.example/cat.gif?size=2"]);
    }

    #[tokio::test]
    async fn test_inline_content_passes_through() {
        let mut ctx = test_context(vec![
            InputItem::Base64 {
                base64: "aGk=".to_string(),
                file_name: "x.webp".to_string(),
            },
            InputItem::Bytes {
                bytes: vec![1, 2],
                file_name: "y.png".to_string(),
            },
        ]);
        PathTransformer.transform(&mut ctx).await.unwrap();
        assert_eq!(ctx.output[0].base64().unwrap(), "aGk=");
        assert_eq!(ctx.output[1].extname, ".png");
    }
}

//! A transformer for hosts that only ever pass inline content.

use crate::context::{ExecutionContext, ImageRecord, InputItem};
use crate::errors::PicflowError;
use crate::plugin::Transformer;
use async_trait::async_trait;

/// Accepts base64 and byte inputs only. Files and URLs are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Transformer;

#[async_trait]
impl Transformer for Base64Transformer {
    async fn transform(&self, ctx: &mut ExecutionContext) -> Result<(), PicflowError> {
        let records = ctx
            .input
            .iter()
            .map(|item| match item {
                InputItem::Base64 { base64, file_name } => {
                    Ok(ImageRecord::from_base64(file_name.as_str(), base64.as_str()))
                }
                InputItem::Bytes { bytes, file_name } => {
                    Ok(ImageRecord::from_bytes(file_name.as_str(), bytes.clone()))
                }
                other => Err(PicflowError::InvalidInput(format!(
                    "base64 transformer cannot handle {} input",
                    other.kind()
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        ctx.output = records;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_context;

    #[tokio::test]
    async fn test_accepts_inline_content() {
        let mut ctx = test_context(vec![InputItem::parse("data:image/png;base64,aGk=")]);
        Base64Transformer.transform(&mut ctx).await.unwrap();
        assert_eq!(ctx.output.len(), 1);
        assert_eq!(ctx.output[0].extname, ".png");
        assert_eq!(ctx.output[0].bytes().unwrap().into_owned(), b"hi".to_vec());
    }

    #[tokio::test]
    async fn test_rejects_paths() {
        let mut ctx = test_context(vec![InputItem::parse("./a.png")]);
        let err = Base64Transformer.transform(&mut ctx).await.unwrap_err();
        assert!(matches!(err, PicflowError::InvalidInput(_)));
    }
}

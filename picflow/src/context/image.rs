//! Image records produced by transformers and completed by uploaders.

use crate::errors::PicflowError;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::path::Path;

/// The image content, held in one canonical form.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImagePayload {
    /// Raw bytes, serialized as base64.
    Bytes(#[serde(with = "base64_bytes")] Vec<u8>),
    /// Base64 text without a data-URL prefix.
    Base64(String),
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            Self::Base64(s) => write!(f, "Base64({} chars)", s.len()),
        }
    }
}

/// One image moving through the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    /// Image content. Dropped once the record has a URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<ImagePayload>,
    /// File name, used by uploaders as the remote name.
    pub file_name: String,
    /// Pixel width, when the transformer knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Pixel height, when the transformer knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Extension with a leading dot, e.g. `.png`.
    #[serde(default)]
    pub extname: String,
    /// The URL assigned by the uploader.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img_url: Option<String>,
    /// Id of the uploader that produced `img_url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,
    /// When the upload completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
    /// Backend-specific fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ImageRecord {
    /// Creates a record holding raw bytes. `extname` is derived from the name.
    #[must_use]
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::with_payload(file_name.into(), ImagePayload::Bytes(bytes))
    }

    /// Creates a record holding base64 text.
    #[must_use]
    pub fn from_base64(file_name: impl Into<String>, base64: impl Into<String>) -> Self {
        Self::with_payload(file_name.into(), ImagePayload::Base64(base64.into()))
    }

    fn with_payload(file_name: String, payload: ImagePayload) -> Self {
        Self {
            extname: extname_of(&file_name),
            payload: Some(payload),
            file_name,
            ..Self::default()
        }
    }

    /// Sets the dimensions.
    #[must_use]
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Sets a backend-specific field.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// The content as bytes, decoding base64 when needed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if there is no payload or the base64 is
    /// malformed.
    pub fn bytes(&self) -> Result<Cow<'_, [u8]>, PicflowError> {
        match &self.payload {
            Some(ImagePayload::Bytes(b)) => Ok(Cow::Borrowed(b)),
            Some(ImagePayload::Base64(s)) => STANDARD.decode(s).map(Cow::Owned).map_err(|e| {
                PicflowError::InvalidInput(format!("invalid base64 for '{}': {e}", self.file_name))
            }),
            None => Err(self.missing_payload()),
        }
    }

    /// The content as base64, encoding bytes when needed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if there is no payload.
    pub fn base64(&self) -> Result<Cow<'_, str>, PicflowError> {
        match &self.payload {
            Some(ImagePayload::Base64(s)) => Ok(Cow::Borrowed(s)),
            Some(ImagePayload::Bytes(b)) => Ok(Cow::Owned(STANDARD.encode(b))),
            None => Err(self.missing_payload()),
        }
    }

    fn missing_payload(&self) -> PicflowError {
        PicflowError::InvalidInput(format!("'{}' has no image content", self.file_name))
    }

    /// Whether an uploader assigned a URL.
    #[must_use]
    pub fn is_uploaded(&self) -> bool {
        self.img_url.as_deref().is_some_and(|u| !u.is_empty())
    }

    /// Records which uploader produced the URL and when.
    pub fn stamp(&mut self, uploader: &str, at: DateTime<Utc>) {
        self.uploader = Some(uploader.to_string());
        self.uploaded_at = Some(at);
    }

    /// Drops the payload.
    pub fn strip_payload(&mut self) {
        self.payload = None;
    }
}

/// The extension of `name` with a leading dot, or an empty string.
#[must_use]
pub fn extname_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default()
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

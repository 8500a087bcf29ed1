//! Raw inputs supplied by the caller of an upload.

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;
use uuid::Uuid;

#[allow(clippy::expect_used)]
static RE_DATA_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data:image/([A-Za-z0-9.+-]+);base64,(.+)$").expect("valid data url regex")
});

/// One input handed to the pipeline.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum InputItem {
    /// A local file.
    Path(PathBuf),
    /// A remote image to download.
    Url(String),
    /// Base64 content.
    #[serde(rename_all = "camelCase")]
    Base64 {
        /// The content, without a data-URL prefix.
        base64: String,
        /// Name to give the image.
        file_name: String,
    },
    /// Raw content.
    #[serde(rename_all = "camelCase")]
    Bytes {
        /// The content.
        bytes: Vec<u8>,
        /// Name to give the image.
        file_name: String,
    },
}

impl InputItem {
    /// Classifies a string input.
    ///
    /// `http(s)://` strings are URLs, `data:image/<ext>;base64,` strings are
    /// inline content named after the current time plus a short random
    /// suffix, anything else is a path.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Self::Url(trimmed.to_string());
        }
        if let Some(caps) = RE_DATA_URL.captures(trimmed) {
            let ext = caps.get(1).map_or("png", |m| m.as_str());
            let data = caps.get(2).map_or("", |m| m.as_str());
            return Self::Base64 {
                base64: data.to_string(),
                file_name: format!(
                    "{}-{}.{ext}",
                    Utc::now().format("%Y%m%d%H%M%S%3f"),
                    &Uuid::new_v4().simple().to_string()[..8]
                ),
            };
        }
        Self::Path(PathBuf::from(trimmed))
    }

    /// Short label for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Path(_) => "path",
            Self::Url(_) => "url",
            Self::Base64 { .. } => "base64",
            Self::Bytes { .. } => "bytes",
        }
    }
}

impl From<&str> for InputItem {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<PathBuf> for InputItem {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl fmt::Debug for InputItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(p) => f.debug_tuple("Path").field(p).finish(),
            Self::Url(u) => f.debug_tuple("Url").field(u).finish(),
            Self::Base64 { base64, file_name } => f
                .debug_struct("Base64")
                .field("file_name", file_name)
                .field("len", &base64.len())
                .finish(),
            Self::Bytes { bytes, file_name } => f
                .debug_struct("Bytes")
                .field("file_name", file_name)
                .field("len", &bytes.len())
                .finish(),
        }
    }
}

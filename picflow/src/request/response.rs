//! Response descriptors and the shaped results handed back to callers.

use super::options::RequestOptions;
use crate::errors::PicflowError;
use std::collections::HashMap;
use std::fmt;

/// The shape a request resolves to, chosen from the options alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseDescriptor {
    /// Status, headers and body together.
    FullResponse,
    /// Raw body bytes.
    ArrayBuffer,
    /// The body, parsed when structured.
    Body,
    /// The body coerced to text.
    Text,
}

impl ResponseDescriptor {
    /// Resolves the descriptor. The full-response flag wins over arraybuffer.
    #[must_use]
    pub fn from_options(options: &RequestOptions) -> Self {
        if options.resolve_with_full_response {
            Self::FullResponse
        } else if options.wants_array_buffer() {
            Self::ArrayBuffer
        } else if options.json {
            Self::Body
        } else {
            Self::Text
        }
    }
}

impl fmt::Display for ResponseDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullResponse => write!(f, "full_response"),
            Self::ArrayBuffer => write!(f, "array_buffer"),
            Self::Body => write!(f, "body"),
            Self::Text => write!(f, "text"),
        }
    }
}

/// What a transport hands back before shaping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, keys lowercased.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Creates a response with the given status and body.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Adds a header (the key is lowercased).
    #[must_use]
    pub fn with_header(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(key.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Returns the content type, if any.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }

    /// Whether the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body as text, replacing invalid UTF-8.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A response body, parsed according to its content type.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// A JSON document.
    Json(serde_json::Value),
    /// Text content.
    Text(String),
    /// Anything else, raw.
    Bytes(Vec<u8>),
}

impl ResponseBody {
    /// Parses `raw` by its content type.
    ///
    /// JSON that fails to parse is kept as text.
    #[must_use]
    pub fn from_raw(raw: &RawResponse) -> Self {
        let content_type = raw.content_type().unwrap_or_default().to_ascii_lowercase();
        if content_type.contains("json") {
            serde_json::from_slice(&raw.body).map_or_else(|_| Self::Text(raw.text()), Self::Json)
        } else if content_type.is_empty()
            || content_type.starts_with("text/")
            || content_type.contains("xml")
            || content_type.contains("x-www-form-urlencoded")
        {
            Self::Text(raw.text())
        } else {
            Self::Bytes(raw.body.clone())
        }
    }

    /// Returns the JSON value, if this body is JSON.
    #[must_use]
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// A full response: status, headers and body.
#[derive(Debug, Clone, PartialEq)]
pub struct FullResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, keys lowercased.
    pub headers: HashMap<String, String>,
    /// The body, raw when arraybuffer was requested, parsed otherwise.
    pub body: ResponseBody,
}

/// The result of a request, in the shape its descriptor selected.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestResponse {
    /// Status, headers and body.
    Full(FullResponse),
    /// Raw body bytes.
    Bytes(Vec<u8>),
    /// Body only.
    Body(ResponseBody),
    /// Body as text.
    Text(String),
}

impl RequestResponse {
    /// Shapes a successful raw response according to `descriptor`.
    ///
    /// `array_buffer` keeps a full response's body raw.
    #[must_use]
    pub fn shape(descriptor: ResponseDescriptor, raw: RawResponse, array_buffer: bool) -> Self {
        match descriptor {
            ResponseDescriptor::FullResponse => {
                let body = if array_buffer {
                    ResponseBody::Bytes(raw.body.clone())
                } else {
                    ResponseBody::from_raw(&raw)
                };
                Self::Full(FullResponse {
                    status: raw.status,
                    headers: raw.headers,
                    body,
                })
            }
            ResponseDescriptor::ArrayBuffer => Self::Bytes(raw.body),
            ResponseDescriptor::Body => Self::Body(ResponseBody::from_raw(&raw)),
            ResponseDescriptor::Text => Self::Text(raw.text()),
        }
    }

    /// Returns which descriptor produced this response.
    #[must_use]
    pub fn descriptor(&self) -> ResponseDescriptor {
        match self {
            Self::Full(_) => ResponseDescriptor::FullResponse,
            Self::Bytes(_) => ResponseDescriptor::ArrayBuffer,
            Self::Body(_) => ResponseDescriptor::Body,
            Self::Text(_) => ResponseDescriptor::Text,
        }
    }

    /// Returns the status code, only known for full responses.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Full(full) => Some(full.status),
            _ => None,
        }
    }

    /// Extracts a JSON document from any shape.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the body is not valid JSON.
    pub fn into_json(self) -> Result<serde_json::Value, PicflowError> {
        let body = match self {
            Self::Full(full) => full.body,
            Self::Body(body) => body,
            Self::Bytes(bytes) => ResponseBody::Bytes(bytes),
            Self::Text(text) => ResponseBody::Text(text),
        };
        match body {
            ResponseBody::Json(value) => Ok(value),
            ResponseBody::Text(text) => Ok(serde_json::from_str(&text)?),
            ResponseBody::Bytes(bytes) => Ok(serde_json::from_slice(&bytes)?),
        }
    }

    /// Extracts the body as bytes from any shape.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        let body = match self {
            Self::Bytes(bytes) => return bytes,
            Self::Text(text) => return text.into_bytes(),
            Self::Full(full) => full.body,
            Self::Body(body) => body,
        };
        match body {
            ResponseBody::Bytes(bytes) => bytes,
            ResponseBody::Text(text) => text.into_bytes(),
            ResponseBody::Json(value) => value.to_string().into_bytes(),
        }
    }
}

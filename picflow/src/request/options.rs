//! Request configuration passed by uploader plugins.

use reqwest::Method;
use std::collections::HashMap;
use std::time::Duration;

/// How the raw response body should be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    /// Raw bytes.
    ArrayBuffer,
    /// Text, the default.
    Text,
}

/// A part of a multipart form body.
#[derive(Debug, Clone, PartialEq)]
pub enum MultipartPart {
    /// A plain text field.
    Text {
        /// Field name.
        name: String,
        /// Field value.
        value: String,
    },
    /// A file field.
    File {
        /// Field name.
        name: String,
        /// File name sent to the server.
        file_name: String,
        /// MIME type, if known.
        content_type: Option<String>,
        /// File contents.
        bytes: Vec<u8>,
    },
}

/// The body of an outbound request.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// A JSON document.
    Json(serde_json::Value),
    /// Plain text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// URL-encoded form fields.
    Form(Vec<(String, String)>),
    /// A multipart form.
    Multipart(Vec<MultipartPart>),
}

/// One outbound call, plus the flags that choose the response shape.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// HTTP method.
    pub method: Method,
    /// Target URL.
    pub url: String,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Query string pairs.
    pub query: Vec<(String, String)>,
    /// Request body.
    pub body: RequestBody,
    /// Per-request timeout, overriding the transport default.
    pub timeout: Option<Duration>,
    /// Resolve with status, headers and body together.
    pub resolve_with_full_response: bool,
    /// Requested body representation.
    pub response_type: Option<ResponseType>,
    /// Resolve with just the (parsed when structured) body.
    pub json: bool,
}

impl RequestOptions {
    /// Creates options for the given method and URL.
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            ..Self::default()
        }
    }

    /// Creates a GET request.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Creates a POST request.
    #[must_use]
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Creates a PUT request.
    #[must_use]
    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Adds a query pair.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Sets a JSON body.
    #[must_use]
    pub fn with_json_body(self, body: serde_json::Value) -> Self {
        self.with_body(RequestBody::Json(body))
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Resolves with status, headers and body.
    #[must_use]
    pub fn full_response(mut self) -> Self {
        self.resolve_with_full_response = true;
        self
    }

    /// Resolves with the raw body bytes.
    #[must_use]
    pub fn array_buffer(mut self) -> Self {
        self.response_type = Some(ResponseType::ArrayBuffer);
        self
    }

    /// Resolves with just the body, parsed when the server sends JSON.
    #[must_use]
    pub fn json_body_only(mut self) -> Self {
        self.json = true;
        self
    }

    /// True when the raw-bytes representation was requested.
    #[must_use]
    pub fn wants_array_buffer(&self) -> bool {
        self.response_type == Some(ResponseType::ArrayBuffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let options = RequestOptions::post("https://example.com/upload")
            .with_header("Authorization", "token abc")
            .with_query("a", "1")
            .with_json_body(serde_json::json!({"x": 1}))
            .with_timeout(Duration::from_secs(5))
            .full_response();

        assert_eq!(options.method, Method::POST);
        assert_eq!(options.headers.get("Authorization").unwrap(), "token abc");
        assert_eq!(options.query, vec![("a".to_string(), "1".to_string())]);
        assert!(matches!(options.body, RequestBody::Json(_)));
        assert!(options.resolve_with_full_response);
        assert!(!options.wants_array_buffer());
    }

    #[test]
    fn test_defaults() {
        let options = RequestOptions::get("https://example.com");
        assert_eq!(options.method, Method::GET);
        assert_eq!(options.body, RequestBody::Empty);
        assert!(!options.json);
        assert!(options.response_type.is_none());
    }
}

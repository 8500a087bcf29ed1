//! Wire transports behind the request adapter.

use super::options::{MultipartPart, RequestBody, RequestOptions};
use super::response::RawResponse;
use crate::config::RequestSettings;
use crate::errors::{PicflowError, RequestFailedError};
use async_trait::async_trait;
use std::collections::HashMap;

/// Sends one request and returns the unshaped response.
///
/// Implementations return `Ok` for any response that arrived, whatever its
/// status; only transport-level failures are errors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends the request.
    async fn send(&self, request: &RequestOptions) -> Result<RawResponse, RequestFailedError>;
}

/// The production transport, backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a client from the request settings.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the proxy URL is invalid or the client cannot be
    /// constructed.
    pub fn from_settings(settings: &RequestSettings) -> Result<Self, PicflowError> {
        let mut builder = reqwest::Client::builder().user_agent(settings.user_agent.clone());
        if let Some(timeout) = settings.timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(ref proxy) = settings.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| PicflowError::Config(format!("invalid proxy '{proxy}': {e}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| PicflowError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build(&self, request: &RequestOptions) -> Result<reqwest::RequestBuilder, RequestFailedError> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .query(&request.query);

        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Text(text) => builder.body(text.clone()),
            RequestBody::Bytes(bytes) => builder.body(bytes.clone()),
            RequestBody::Form(fields) => builder.form(fields),
            RequestBody::Multipart(parts) => builder.multipart(multipart_form(parts)?),
        };

        Ok(builder)
    }
}

fn multipart_form(parts: &[MultipartPart]) -> Result<reqwest::multipart::Form, RequestFailedError> {
    let mut form = reqwest::multipart::Form::new();
    for part in parts {
        form = match part {
            MultipartPart::Text { name, value } => form.text(name.clone(), value.clone()),
            MultipartPart::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                let mut file = reqwest::multipart::Part::bytes(bytes.clone()).file_name(file_name.clone());
                if let Some(mime) = content_type {
                    file = file.mime_str(mime).map_err(|e| {
                        RequestFailedError::new(format!("invalid content type '{mime}': {e}"))
                            .with_code("REQUEST")
                    })?;
                }
                form.part(name.clone(), file)
            }
        };
    }
    Ok(form)
}

fn map_reqwest_error(err: &reqwest::Error) -> RequestFailedError {
    let code = if err.is_timeout() {
        "TIMEOUT"
    } else if err.is_connect() {
        "CONNECT"
    } else if err.is_redirect() {
        "REDIRECT"
    } else if err.is_body() || err.is_decode() {
        "BODY"
    } else if err.is_builder() {
        "REQUEST"
    } else {
        "NETWORK"
    };
    let mut failed = RequestFailedError::new(err.to_string()).with_code(code);
    failed.status = err.status().map(|s| s.as_u16());
    failed
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &RequestOptions) -> Result<RawResponse, RequestFailedError> {
        let response = self
            .build(request)?
            .send()
            .await
            .map_err(|e| map_reqwest_error(&e))?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(&e))?
            .to_vec();

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

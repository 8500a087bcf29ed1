//! The single calling convention uploaders use for outbound requests.

use super::options::RequestOptions;
use super::response::{RequestResponse, ResponseDescriptor};
use super::transport::{HttpTransport, ReqwestTransport};
use crate::config::RequestSettings;
use crate::errors::{PicflowError, RequestFailedError};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Normalizes outbound calls into one of four response shapes.
///
/// The shape is fixed by the options (see [`ResponseDescriptor`]), never by
/// what the backend sends. Non-2xx responses fail with
/// [`RequestFailedError`]. The adapter never retries.
#[derive(Clone)]
pub struct RequestAdapter {
    transport: Arc<dyn HttpTransport>,
}

impl RequestAdapter {
    /// Creates an adapter over the given transport.
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Creates an adapter over a `reqwest` transport built from `settings`.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the client cannot be constructed.
    pub fn from_settings(settings: &RequestSettings) -> Result<Self, PicflowError> {
        Ok(Self::new(Arc::new(ReqwestTransport::from_settings(settings)?)))
    }

    /// Sends a request and shapes the result.
    ///
    /// # Errors
    ///
    /// Returns `RequestFailedError` for transport failures and non-2xx
    /// statuses, carrying the status and code when available.
    pub async fn request(&self, options: &RequestOptions) -> Result<RequestResponse, RequestFailedError> {
        let descriptor = ResponseDescriptor::from_options(options);
        let start = Instant::now();

        let raw = self.transport.send(options).await.map_err(|e| {
            warn!(
                method = %options.method,
                url = %options.url,
                code = ?e.code,
                "Request failed before a response arrived"
            );
            e
        })?;

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        debug!(
            method = %options.method,
            url = %options.url,
            status = raw.status,
            descriptor = %descriptor,
            duration_ms,
            "Request completed"
        );

        if !raw.is_success() {
            let body = raw.text();
            return Err(RequestFailedError::from_status(
                raw.status,
                (!body.is_empty()).then_some(body),
            ));
        }

        Ok(RequestResponse::shape(
            descriptor,
            raw,
            options.wants_array_buffer(),
        ))
    }
}

impl std::fmt::Debug for RequestAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestAdapter").finish_non_exhaustive()
    }
}

//! Outbound HTTP for uploaders.
//!
//! This module provides:
//! - `RequestOptions` for describing a call and its response shape
//! - `RequestAdapter`, the one entry point plugins use to send requests
//! - `HttpTransport`, the seam between the adapter and the wire

mod adapter;
mod options;
mod response;
mod transport;

pub use adapter::RequestAdapter;
pub use options::{MultipartPart, RequestBody, RequestOptions, ResponseType};
pub use response::{FullResponse, RawResponse, RequestResponse, ResponseBody, ResponseDescriptor};
pub use transport::{HttpTransport, ReqwestTransport};

#[cfg(test)]
pub(crate) use transport::MockHttpTransport;

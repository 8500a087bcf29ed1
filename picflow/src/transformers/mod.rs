//! Built-in transformers.
//!
//! The runtime registers both on startup. Plugins may replace either by
//! registering a transformer under the same id.

mod base64;
mod path;

pub use self::base64::Base64Transformer;
pub use self::path::PathTransformer;

/// Id of [`PathTransformer`], the default transformer.
pub const PATH_TRANSFORMER: &str = "path";
/// Id of [`Base64Transformer`].
pub const BASE64_TRANSFORMER: &str = "base64";

//! # Picflow
//!
//! The core of a plugin-driven image upload pipeline.
//!
//! An upload runs through five lifecycle stages:
//!
//! - **beforeTransform**: handlers inspect or rewrite the raw input
//! - **transformer**: the active transformer turns input into image records
//! - **beforeUpload**: handlers compress, rename or reject images
//! - **uploader**: the active uploader assigns each image a URL
//! - **afterUpload**: handlers post-process the results
//!
//! Plugins contribute entries to these stages through the [`plugin::PluginLoader`].
//! Configuration lives in a layered [`config::ConfigStore`], and uploaders talk
//! to storage backends through the [`request::RequestAdapter`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use picflow::prelude::*;
//!
//! let picflow = Picflow::builder()
//!     .with_package("picflow-plugin-smms", factory_of(Arc::new(SmmsPlugin::new())))
//!     .build()?;
//! picflow.config().set_config(json!({"picBed.uploader": "picflow-plugin-smms"}))?;
//!
//! let output = picflow.upload(vec![InputItem::parse("./cat.png")]).await?;
//! println!("{}", output[0].img_url.as_deref().unwrap_or_default());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod errors;
pub mod events;
pub mod interfaces;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod plugin;
pub mod request;
pub mod runtime;
pub mod testing;
pub mod transformers;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{ConfigStore, JsonFilePersistence, PicBedSettings, RequestSettings};
    pub use crate::context::{ExecutionContext, ImageRecord, InputItem, SharedResources};
    pub use crate::errors::{
        PicflowError, PluginLoadError, PluginNotFoundError, RequestFailedError,
        StageHandlerError, TransformerNotFoundError, UploaderNotFoundError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::lifecycle::{LifecycleRegistries, LifecycleRegistry, LifecycleStage};
    pub use crate::pipeline::{PipelineExecutor, PipelineState};
    pub use crate::plugin::{
        factory_of, Capability, FnHandler, Plugin, PluginFactory, PluginLoader, StageHandler,
        StaticPlugin, Transformer, UploadGranularity, Uploader,
    };
    pub use crate::request::{RequestAdapter, RequestOptions, RequestResponse};
    pub use crate::runtime::{Picflow, PicflowBuilder};
}

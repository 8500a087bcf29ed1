//! Execution context for upload operations.
//!
//! This module provides:
//! - `ExecutionContext`, the mutable state of one upload
//! - `SharedResources`, the handles every context borrows from the runtime
//! - `InputItem` and `ImageRecord`, the data that flows through the stages

mod execution;
mod image;
mod input;

pub use execution::{ExecutionContext, SharedResources};
pub use image::{extname_of, ImagePayload, ImageRecord};
pub use input::InputItem;

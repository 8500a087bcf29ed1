//! Upload execution.
//!
//! This module provides:
//! - The executor state machine
//! - The five-stage upload sequence
//! - End-to-end tests against the built-in transformers

mod executor;
mod state;

#[cfg(test)]
mod integration_tests;

pub use executor::PipelineExecutor;
pub use state::PipelineState;

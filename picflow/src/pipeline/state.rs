//! Executor states.

use crate::lifecycle::LifecycleStage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an executor is in the five-stage sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Not started.
    #[default]
    Idle,
    /// Running beforeTransform handlers.
    RunningBeforeTransform,
    /// Running the active transformer.
    Transforming,
    /// Running beforeUpload handlers.
    RunningBeforeUpload,
    /// Running the active uploader.
    Uploading,
    /// Running afterUpload handlers.
    RunningAfterUpload,
    /// Finished successfully.
    Done,
    /// Stopped at the first error.
    Failed,
}

impl PipelineState {
    /// The running state for `stage`.
    #[must_use]
    pub fn running(stage: LifecycleStage) -> Self {
        match stage {
            LifecycleStage::BeforeTransform => Self::RunningBeforeTransform,
            LifecycleStage::Transformer => Self::Transforming,
            LifecycleStage::BeforeUpload => Self::RunningBeforeUpload,
            LifecycleStage::Uploader => Self::Uploading,
            LifecycleStage::AfterUpload => Self::RunningAfterUpload,
        }
    }

    /// Whether the state ends a run.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether a stage is executing.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !matches!(self, Self::Idle | Self::Done | Self::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::RunningBeforeTransform => write!(f, "running_before_transform"),
            Self::Transforming => write!(f, "transforming"),
            Self::RunningBeforeUpload => write!(f, "running_before_upload"),
            Self::Uploading => write!(f, "uploading"),
            Self::RunningAfterUpload => write!(f, "running_after_upload"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_states_follow_stage_order() {
        let states: Vec<_> = LifecycleStage::ALL.into_iter().map(PipelineState::running).collect();
        assert_eq!(
            states,
            vec![
                PipelineState::RunningBeforeTransform,
                PipelineState::Transforming,
                PipelineState::RunningBeforeUpload,
                PipelineState::Uploading,
                PipelineState::RunningAfterUpload,
            ]
        );
        assert!(states.iter().all(PipelineState::is_running));
    }

    #[test]
    fn test_terminal_states() {
        assert!(PipelineState::Done.is_terminal());
        assert!(PipelineState::Failed.is_terminal());
        assert!(!PipelineState::Idle.is_terminal());
        assert!(!PipelineState::Idle.is_running());
        assert_eq!(PipelineState::RunningAfterUpload.to_string(), "running_after_upload");
    }
}

//! Workflow result and state types.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::AllQuantsError;
use crate::reporter::Step;

/// Where a workflow is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "step", rename_all = "snake_case")]
pub enum WorkflowState {
    Download,
    Convert,
    Quantize,
    Upload,
    /// Every requested step finished.
    Done,
    /// The user answered "no" at this step's gate.
    Declined(Step),
    /// Ctrl+C arrived during this step.
    Interrupted(Step),
    /// This step raised an error.
    Failed(Step),
}

impl WorkflowState {
    /// The in-progress state for `step`.
    pub fn at(step: Step) -> Self {
        match step {
            Step::Download => WorkflowState::Download,
            Step::Convert => WorkflowState::Convert,
            Step::Quantize => WorkflowState::Quantize,
            Step::Upload => WorkflowState::Upload,
        }
    }

    /// The step this state refers to, if any.
    pub fn step(self) -> Option<Step> {
        match self {
            WorkflowState::Download => Some(Step::Download),
            WorkflowState::Convert => Some(Step::Convert),
            WorkflowState::Quantize => Some(Step::Quantize),
            WorkflowState::Upload => Some(Step::Upload),
            WorkflowState::Done => None,
            WorkflowState::Declined(step)
            | WorkflowState::Interrupted(step)
            | WorkflowState::Failed(step) => Some(step),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkflowState::Done
                | WorkflowState::Declined(_)
                | WorkflowState::Interrupted(_)
                | WorkflowState::Failed(_)
        )
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowState::Done => f.write_str("done"),
            WorkflowState::Declined(step) => write!(f, "declined at {step}"),
            WorkflowState::Interrupted(step) => write!(f, "interrupted during {step}"),
            WorkflowState::Failed(step) => write!(f, "failed during {step}"),
            running => match running.step() {
                Some(step) => write!(f, "running {step}"),
                None => Ok(()),
            },
        }
    }
}

/// What a workflow run should do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowOptions {
    /// Profiles to produce; the full catalog when `None` or empty.
    pub profiles: Option<Vec<String>>,
    /// Publish the quantized files to the Hub.
    pub upload: bool,
    /// Ask before each step.
    pub interactive: bool,
}

/// Accumulated outcome of a workflow run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowResult {
    pub model_id: String,
    pub model_path: Option<PathBuf>,
    pub gguf_path: Option<PathBuf>,
    pub quantized_files: Vec<PathBuf>,
    pub repo_id: Option<String>,
    pub success: bool,
    pub error: Option<String>,
    pub state: WorkflowState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowResult {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            model_path: None,
            gguf_path: None,
            quantized_files: Vec::new(),
            repo_id: None,
            success: false,
            error: None,
            state: WorkflowState::Download,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Stamp the end time and derive `success` from the final state.
    pub(crate) fn finish(mut self) -> Self {
        self.success = self.state == WorkflowState::Done;
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn was_interrupted(&self) -> bool {
        matches!(self.state, WorkflowState::Interrupted(_))
    }
}

/// A workflow that stopped on an unexpected error.
///
/// Carries the partial result alongside the cause so callers can still show
/// what was produced.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct WorkflowFailure {
    pub result: Box<WorkflowResult>,
    #[source]
    pub source: AllQuantsError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_step_mapping() {
        for step in [Step::Download, Step::Convert, Step::Quantize, Step::Upload] {
            let state = WorkflowState::at(step);
            assert_eq!(state.step(), Some(step));
            assert!(!state.is_terminal());
        }
        assert_eq!(WorkflowState::Done.step(), None);
        assert!(WorkflowState::Declined(Step::Convert).is_terminal());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(
            WorkflowState::Interrupted(Step::Quantize).to_string(),
            "interrupted during Quantize Model"
        );
        assert_eq!(WorkflowState::Convert.to_string(), "running Convert to GGUF");
    }

    #[test]
    fn test_finish_derives_success() {
        let mut result = WorkflowResult::new("org/m");
        result.state = WorkflowState::Declined(Step::Download);
        let result = result.finish();
        assert!(!result.success);
        assert!(result.finished_at.is_some());

        let mut result = WorkflowResult::new("org/m");
        result.state = WorkflowState::Done;
        assert!(result.finish().success);
    }

    #[test]
    fn test_result_serializes_state() {
        let mut result = WorkflowResult::new("org/m");
        result.state = WorkflowState::Failed(Step::Convert);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["state"]["state"], "failed");
        assert_eq!(json["state"]["step"], "convert");
        assert_eq!(json["model_id"], "org/m");
    }

    #[test]
    fn test_failure_displays_source() {
        let failure = WorkflowFailure {
            result: Box::new(WorkflowResult::new("org/m")),
            source: AllQuantsError::ConversionFailed {
                message: "boom".into(),
            },
        };
        assert_eq!(failure.to_string(), "GGUF conversion failed: boom");
    }
}

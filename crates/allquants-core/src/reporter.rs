//! Output sink and confirmation gate injected into the workflow.
//!
//! The library never prints. Everything a user should see is emitted as a
//! [`WorkflowEvent`] to a [`Reporter`]; the CLI renders events with spinners
//! and styled lines, tests collect them. Interactive confirmation goes through
//! a [`Confirmer`] for the same reason.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A workflow step. Every step is preceded by an optional confirmation gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Download,
    Convert,
    Quantize,
    Upload,
}

impl Step {
    /// 1-based position in the workflow.
    pub fn number(self) -> u8 {
        match self {
            Step::Download => 1,
            Step::Convert => 2,
            Step::Quantize => 3,
            Step::Upload => 4,
        }
    }

    /// Question asked at this step's gate.
    pub fn prompt(self) -> &'static str {
        match self {
            Step::Download => "Continue with model download?",
            Step::Convert => "Continue with GGUF conversion?",
            Step::Quantize => "Continue with quantization?",
            Step::Upload => "Continue with Hugging Face upload?",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Download => "Download Model",
            Step::Convert => "Convert to GGUF",
            Step::Quantize => "Quantize Model",
            Step::Upload => "Upload to Hugging Face",
        };
        f.write_str(name)
    }
}

/// Something the user should see while a workflow runs.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    /// A gate is about to be shown (or skipped in non-interactive mode).
    StepAnnounced { step: Step, details: Vec<String> },
    /// A step finished; `summary` is a one-line description of its output.
    StepCompleted { step: Step, summary: String },
    /// The workflow stopped at `step` because the user said no.
    StepDeclined { step: Step },
    /// An output already existed, so the work was not redone.
    AlreadyExists { what: String, path: PathBuf },
    /// An external command is about to run.
    Command { command_line: String },
    /// One line of streamed subprocess output.
    ProcessOutput { line: String },
    /// A hub file transfer started.
    TransferStarted {
        file: String,
        index: usize,
        total: usize,
        size: Option<u64>,
    },
    /// Bytes moved for the transfer started last.
    TransferProgress { file: String, bytes: u64 },
    /// The transfer started last has finished.
    TransferCompleted { file: String },
    /// Quantization to `profile` is starting.
    ProfileStarted {
        profile: String,
        index: usize,
        total: usize,
    },
    /// `profile` finished (or was already on disk).
    ProfileCompleted { profile: String, path: PathBuf },
    /// `profile` failed and was left out of the result.
    ProfileFailed { profile: String, message: String },
    /// The upload repository exists and is ready to receive files.
    RepoReady { repo_id: String },
    /// Non-fatal problem.
    Warning { message: String },
}

/// Receives [`WorkflowEvent`]s.
pub trait Reporter: Send + Sync {
    fn report(&self, event: WorkflowEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&self, _event: WorkflowEvent) {}
}

/// Asks the user whether to continue past a gate.
///
/// Returning `Err(AllQuantsError::Cancelled)` means the prompt itself was
/// interrupted, which the workflow treats like Ctrl+C.
pub trait Confirmer: Send + Sync {
    fn confirm(&self, step: Step, prompt: &str) -> Result<bool>;
}

/// Says yes to every gate. Used for non-interactive runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Confirmer for AssumeYes {
    fn confirm(&self, _step: Step, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_numbering_follows_workflow_order() {
        let steps = [Step::Download, Step::Convert, Step::Quantize, Step::Upload];
        let numbers: Vec<u8> = steps.iter().map(|s| s.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_step_display_and_prompt() {
        assert_eq!(Step::Convert.to_string(), "Convert to GGUF");
        assert_eq!(Step::Upload.prompt(), "Continue with Hugging Face upload?");
    }

    #[test]
    fn test_assume_yes() {
        assert!(AssumeYes.confirm(Step::Quantize, "?").unwrap());
    }

    #[test]
    fn test_step_serializes_snake_case() {
        let json = serde_json::to_string(&Step::Quantize).unwrap();
        assert_eq!(json, "\"quantize\"");
    }
}

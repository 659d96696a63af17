//! External process execution.
//!
//! Every subprocess the workflow starts (the converter script, the quantizer,
//! the setup probes) goes through the [`CommandRunner`] trait so the workflow
//! can be driven by a fake in tests.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use allquants_core::cancel::CancellationToken;
//! use allquants_core::process::{CommandRunner, CommandSpec, ProcessRunner};
//! use allquants_core::reporter::NullReporter;
//!
//! # async fn demo() -> allquants_core::Result<()> {
//! let runner = ProcessRunner::new(Arc::new(NullReporter), CancellationToken::new());
//! let output = runner
//!     .run(&CommandSpec::new("python3").arg("--version"))
//!     .await?;
//! assert!(output.success());
//! # Ok(())
//! # }
//! ```

mod runner;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;

pub use runner::ProcessRunner;

/// A command line to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Working directory; inherits the caller's when `None`.
    pub working_dir: Option<PathBuf>,
    /// Forward output line by line while the process runs.
    pub stream_output: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            stream_output: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream_output = stream;
        self
    }

    /// Program name as shown in messages.
    pub fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    /// The command as a single shell-like line, for echoing.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|part| {
                let part = part.to_string_lossy();
                if part.contains(char::is_whitespace) {
                    format!("\"{part}\"")
                } else {
                    part.into_owned()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a finished process.
///
/// In streaming mode stderr is merged into `stdout` in arrival order and
/// `stderr` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `-1` when the process was killed by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// The last `lines` non-empty lines of stderr, falling back to stdout.
    pub fn diagnostic_tail(&self, lines: usize) -> String {
        let text = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        let kept: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        let start = kept.len().saturating_sub(lines);
        kept[start..].join("\n")
    }
}

/// Runs external commands.
///
/// Launch failures are errors. A process that starts and exits non-zero is
/// a successful call; the caller inspects [`CommandOutput::exit_code`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let spec = CommandSpec::new("python3")
            .arg("convert.py")
            .args(["--outtype", "f16"])
            .current_dir("/work")
            .streaming(true);

        assert_eq!(spec.args.len(), 3);
        assert_eq!(spec.working_dir, Some(PathBuf::from("/work")));
        assert!(spec.stream_output);
    }

    #[test]
    fn test_command_line_quotes_whitespace() {
        let spec = CommandSpec::new("llama-quantize")
            .arg("/my models/in.gguf")
            .arg("Q4_K_M");
        assert_eq!(
            spec.command_line(),
            "llama-quantize \"/my models/in.gguf\" Q4_K_M"
        );
    }

    #[test]
    fn test_diagnostic_tail_prefers_stderr() {
        let output = CommandOutput {
            exit_code: 1,
            stdout: "loading\n".into(),
            stderr: "a\n\nb\nc\n".into(),
        };
        assert_eq!(output.diagnostic_tail(2), "b\nc");
        assert!(!output.success());
    }

    #[test]
    fn test_diagnostic_tail_falls_back_to_stdout() {
        let output = CommandOutput {
            exit_code: 2,
            stdout: "one\ntwo\nthree".into(),
            stderr: String::new(),
        };
        assert_eq!(output.diagnostic_tail(10), "one\ntwo\nthree");
    }
}

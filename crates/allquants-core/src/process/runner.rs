//! tokio-backed [`CommandRunner`].

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

use super::{CommandOutput, CommandRunner, CommandSpec};
use crate::cancel::CancellationToken;
use crate::error::{AllQuantsError, Result};
use crate::reporter::{Reporter, WorkflowEvent};

/// Runs commands as child processes.
///
/// Streams output to the [`Reporter`] when asked to and kills the child when
/// the [`CancellationToken`] fires.
pub struct ProcessRunner {
    reporter: Arc<dyn Reporter>,
    cancel: CancellationToken,
}

impl ProcessRunner {
    pub fn new(reporter: Arc<dyn Reporter>, cancel: CancellationToken) -> Self {
        Self { reporter, cancel }
    }

    fn build_command(spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn spawn(spec: &CommandSpec) -> Result<Child> {
        Self::build_command(spec)
            .spawn()
            .map_err(|source| AllQuantsError::Spawn {
                program: spec.program_name(),
                source,
            })
    }

    /// Read stdout and stderr concurrently, forwarding each non-blank line.
    async fn run_streaming(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let mut child = Self::spawn(spec)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AllQuantsError::Other("child stdout was not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AllQuantsError::Other("child stderr was not captured".into()))?;

        // A pipe is dropped once it ends or fails so the child never blocks on it.
        let mut out = Some(LossyLines::new(stdout));
        let mut err = Some(LossyLines::new(stderr));
        let mut merged: Vec<String> = Vec::new();

        while out.is_some() || err.is_some() {
            tokio::select! {
                line = next_line(&mut out) => match line {
                    Ok(Some(line)) => self.forward_line(line, &mut merged),
                    Ok(None) => out = None,
                    Err(e) => {
                        warn!("Error reading stdout of {}: {}", spec.program_name(), e);
                        out = None;
                    }
                },
                line = next_line(&mut err) => match line {
                    Ok(Some(line)) => self.forward_line(line, &mut merged),
                    Ok(None) => err = None,
                    Err(e) => {
                        warn!("Error reading stderr of {}: {}", spec.program_name(), e);
                        err = None;
                    }
                },
                _ = self.cancel.cancelled() => {
                    warn!("Cancelling {}", spec.program_name());
                    child.kill().await.ok();
                    return Err(AllQuantsError::Cancelled);
                }
            }
        }

        let status = tokio::select! {
            status = child.wait() => status.map_err(|e| AllQuantsError::Other(format!(
                "waiting for {} failed: {e}",
                spec.program_name()
            )))?,
            _ = self.cancel.cancelled() => {
                child.kill().await.ok();
                return Err(AllQuantsError::Cancelled);
            }
        };

        Ok(CommandOutput {
            exit_code: status.code().unwrap_or(-1),
            stdout: merged.join("\n"),
            stderr: String::new(),
        })
    }

    fn forward_line(&self, line: String, merged: &mut Vec<String>) {
        let line = line.trim_end().to_string();
        if line.trim().is_empty() {
            return;
        }
        debug!("{}", line);
        self.reporter
            .report(WorkflowEvent::ProcessOutput { line: line.clone() });
        merged.push(line);
    }

    /// Run to completion, keeping stdout and stderr apart.
    async fn run_captured(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let child = Self::spawn(spec)?;

        let output = tokio::select! {
            output = child.wait_with_output() => output.map_err(|e| AllQuantsError::Other(format!(
                "waiting for {} failed: {e}",
                spec.program_name()
            )))?,
            // Dropping the wait future drops the child, which kills it.
            _ = self.cancel.cancelled() => return Err(AllQuantsError::Cancelled),
        };

        let result = CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !result.success() {
            error!(
                "Command failed with return code {}: {}",
                result.exit_code,
                spec.command_line()
            );
            if !result.stderr.trim().is_empty() {
                error!("Error: {}", result.stderr.trim());
            }
        }

        Ok(result)
    }
}

/// Newline-delimited reader that decodes each line lossily.
///
/// Partial reads stay in `buf`, so an interrupted `next_line` can be polled
/// again from a `select!` loop without losing bytes.
struct LossyLines<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LossyLines<R> {
    fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::new(),
        }
    }

    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let read = self.reader.read_until(b'\n', &mut self.buf).await?;
        if read == 0 && self.buf.is_empty() {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        Ok(Some(line))
    }
}

async fn next_line<R: AsyncRead + Unpin>(
    lines: &mut Option<LossyLines<R>>,
) -> std::io::Result<Option<String>> {
    match lines {
        Some(lines) => lines.next_line().await,
        None => std::future::pending().await,
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.cancel.check()?;

        let command_line = spec.command_line();
        info!("$ {}", command_line);
        self.reporter.report(WorkflowEvent::Command { command_line });

        if spec.stream_output {
            self.run_streaming(spec).await
        } else {
            self.run_captured(spec).await
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Collect(Mutex<Vec<WorkflowEvent>>);

    impl Reporter for Collect {
        fn report(&self, event: WorkflowEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn test_captured_keeps_streams_apart() {
        let runner = ProcessRunner::new(Arc::new(Collect::default()), CancellationToken::new());
        let output = runner
            .run(&sh("echo out; echo err 1>&2; exit 3"))
            .await
            .unwrap();

        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn test_streaming_merges_and_forwards() {
        let reporter = Arc::new(Collect::default());
        let runner = ProcessRunner::new(reporter.clone(), CancellationToken::new());
        let output = runner
            .run(&sh("echo one; echo; echo two 1>&2").streaming(true))
            .await
            .unwrap();

        assert!(output.success());
        assert!(output.stderr.is_empty());
        let lines: Vec<&str> = output.stdout.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.contains(&"one") && lines.contains(&"two"));

        let events = reporter.0.lock().unwrap();
        assert!(matches!(events[0], WorkflowEvent::Command { .. }));
        let forwarded = events
            .iter()
            .filter(|e| matches!(e, WorkflowEvent::ProcessOutput { .. }))
            .count();
        assert_eq!(forwarded, 2);
    }

    #[tokio::test]
    async fn test_streaming_survives_invalid_utf8() {
        let reporter = Arc::new(Collect::default());
        let runner = ProcessRunner::new(reporter.clone(), CancellationToken::new());
        let script = "printf 'ok\\n\\377\\376 bad\\n'; \
                      head -c 1048576 /dev/zero | tr '\\0' 'a'; echo; echo done 1>&2";

        let output = tokio::time::timeout(
            Duration::from_secs(10),
            runner.run(&sh(script).streaming(true)),
        )
        .await
        .expect("runner should keep draining after a non-UTF-8 line")
        .unwrap();

        assert!(output.success());
        let lines: Vec<&str> = output.stdout.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines.contains(&"ok"));
        assert!(lines.contains(&"done"));
        assert!(lines.contains(&"\u{FFFD}\u{FFFD} bad"));
        assert!(lines.iter().any(|l| l.len() == 1_048_576));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let runner = ProcessRunner::new(Arc::new(Collect::default()), CancellationToken::new());
        let err = runner
            .run(&CommandSpec::new("/nonexistent/llama-quantize"))
            .await
            .unwrap_err();
        assert!(matches!(err, AllQuantsError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_cancel_kills_streaming_child() {
        let cancel = CancellationToken::new();
        let runner = ProcessRunner::new(Arc::new(Collect::default()), cancel.clone());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            runner.run(&sh("sleep 30").streaming(true)),
        )
        .await
        .expect("runner should stop after cancel");
        assert!(matches!(result, Err(AllQuantsError::Cancelled)));
    }

    #[tokio::test]
    async fn test_already_cancelled_does_not_spawn() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let reporter = Arc::new(Collect::default());
        let runner = ProcessRunner::new(reporter.clone(), cancel);

        let result = runner.run(&sh("echo hi")).await;
        assert!(matches!(result, Err(AllQuantsError::Cancelled)));
        assert!(reporter.0.lock().unwrap().is_empty());
    }
}

//! Renders workflow events with styled lines and indicatif bars.

use std::sync::Mutex;
use std::time::Duration;

use allquants_core::llama_cpp::parse_tensor_progress;
use allquants_core::{Reporter, WorkflowEvent};
use console::{style, truncate_str};
use indicatif::{ProgressBar, ProgressStyle};

use super::printer::{print_info, print_success, print_warning};

const SPINNER_TICKS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";
const MESSAGE_WIDTH: usize = 72;

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .tick_chars(SPINNER_TICKS)
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bytes_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

fn tensor_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix} [{bar:30.green/white}] {pos}/{len} tensors {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

/// [`Reporter`] for an interactive terminal.
///
/// One bar is live at a time: a spinner while a subprocess runs (switching to
/// a tensor bar once `llama-quantize` prints tensor counts) or a byte bar
/// while a file transfers.
pub struct TerminalReporter {
    verbose: bool,
    bar: Mutex<Option<ProgressBar>>,
}

impl TerminalReporter {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            bar: Mutex::new(None),
        }
    }

    fn replace_bar(&self, bar: Option<ProgressBar>) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(old) = slot.take() {
                old.finish_and_clear();
            }
            *slot = bar;
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(slot) = self.bar.lock() {
            if let Some(bar) = slot.as_ref() {
                f(bar);
            }
        }
    }

    /// Print above the live bar without tearing it.
    fn println(&self, line: String) {
        let mut printed = false;
        self.with_bar(|bar| {
            bar.println(&line);
            printed = true;
        });
        if !printed {
            println!("{line}");
        }
    }

    /// Stop the live bar before printing a status line.
    fn settle(&self) {
        self.replace_bar(None);
    }
}

impl Reporter for TerminalReporter {
    fn report(&self, event: WorkflowEvent) {
        match event {
            WorkflowEvent::StepAnnounced { step, details } => {
                self.settle();
                println!();
                println!("{}", style(format!("Step {}: {}", step.number(), step)).bold().blue());
                for line in details {
                    println!("  {}", style(line).dim());
                }
            }
            WorkflowEvent::StepCompleted { summary, .. } => {
                self.settle();
                print_success(&summary);
            }
            WorkflowEvent::StepDeclined { step } => {
                self.settle();
                print_warning(&format!("Workflow cancelled at {step}"));
            }
            WorkflowEvent::AlreadyExists { what, path } => {
                self.settle();
                print_info(&format!("{what} already exists at {}", path.display()));
            }
            WorkflowEvent::Command { command_line } => {
                self.settle();
                println!("{} {}", style("$").dim(), style(&command_line).dim());
                let spinner = ProgressBar::new_spinner();
                spinner.set_style(spinner_style());
                spinner.set_message("Running...");
                spinner.enable_steady_tick(Duration::from_millis(100));
                self.replace_bar(Some(spinner));
            }
            WorkflowEvent::ProcessOutput { line } => {
                if self.verbose {
                    self.println(style(&line).dim().to_string());
                }
                self.with_bar(|bar| match parse_tensor_progress(&line) {
                    Some(progress) => {
                        if bar.length() != Some(u64::from(progress.total)) {
                            bar.set_style(tensor_style());
                            bar.set_length(u64::from(progress.total));
                        }
                        bar.set_position(u64::from(progress.index));
                        bar.set_message(truncate_str(progress.tensor, 40, "…").into_owned());
                    }
                    None => bar.set_message(truncate_str(&line, MESSAGE_WIDTH, "…").into_owned()),
                });
            }
            WorkflowEvent::TransferStarted {
                file,
                index,
                total,
                size,
            } => {
                let prefix = format!("[{index}/{total}] {file}");
                let bar = match size {
                    Some(len) => {
                        let bar = ProgressBar::new(len);
                        bar.set_style(bytes_style());
                        bar
                    }
                    None => {
                        let bar = ProgressBar::new_spinner();
                        bar.set_style(spinner_style());
                        bar.enable_steady_tick(Duration::from_millis(100));
                        bar
                    }
                };
                bar.set_message(prefix.clone());
                bar.set_prefix(prefix);
                self.replace_bar(Some(bar));
            }
            WorkflowEvent::TransferProgress { bytes, .. } => {
                self.with_bar(|bar| bar.set_position(bytes));
            }
            WorkflowEvent::TransferCompleted { file } => {
                self.settle();
                println!("  {} {}", style("✓").green(), file);
            }
            WorkflowEvent::ProfileStarted {
                profile,
                index,
                total,
            } => {
                self.settle();
                println!("{}", style(format!("[{index}/{total}] Quantizing to {profile}")).cyan());
            }
            WorkflowEvent::ProfileCompleted { profile, path } => {
                self.settle();
                print_success(&format!("{profile} ready: {}", path.display()));
            }
            WorkflowEvent::ProfileFailed { profile, message } => {
                self.settle();
                print_warning(&format!("{profile} quantization failed: {message}"));
            }
            WorkflowEvent::RepoReady { repo_id } => {
                self.settle();
                print_info(&format!("Repository ready: {repo_id}"));
            }
            WorkflowEvent::Warning { message } => {
                self.settle();
                print_warning(&message);
            }
        }
    }
}

impl Drop for TerminalReporter {
    fn drop(&mut self) {
        self.settle();
    }
}

//! AllQuants CLI - download, convert, quantize and publish GGUF models.
//!
//! Thin front-end over `allquants-core`: argument parsing, logging setup,
//! Ctrl+C wiring and terminal rendering live here, the workflow itself does
//! not.

mod commands;
mod display;
mod prompt;

use std::path::PathBuf;
use std::process::ExitCode;

use allquants_core::config::HubConfig;
use allquants_core::{AllQuantsError, CancellationToken, ErrorCategory};
use clap::{Parser, Subcommand};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "allquants")]
#[command(version, about = "AllQuants - Comprehensive Model Quantizer using Hugging Face and llama.cpp")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Working directory holding convert.py, TEMPLATE.md and llama.cpp.bin/
    #[arg(long, global = true, default_value = ".")]
    base_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Quantize a model from Hugging Face
    Quantize {
        /// Model id in `organization/model-name` form
        model_id: String,

        /// Hugging Face token (falls back to HF_TOKEN, then the huggingface-cli login)
        #[arg(long)]
        token: Option<String>,

        /// Account namespace that receives the -GGUF repository
        #[arg(long, env = HubConfig::NAMESPACE_ENV_VAR)]
        namespace: Option<String>,

        /// Quantization types to produce (e.g. Q4_K_M Q8_0); all 14 by default
        #[arg(long = "types", num_args = 1..)]
        types: Vec<String>,

        /// Skip uploading to Hugging Face
        #[arg(long)]
        no_upload: bool,

        /// Show the available quantization types and exit
        #[arg(long)]
        show_types: bool,

        /// Run without confirmation prompts
        #[arg(long)]
        non_interactive: bool,
    },

    /// Show all available quantization types
    Types,

    /// Download a model from Hugging Face
    Download {
        /// Model id in `organization/model-name` form
        model_id: String,

        /// Hugging Face token (falls back to HF_TOKEN, then the huggingface-cli login)
        #[arg(long)]
        token: Option<String>,
    },

    /// Convert a downloaded model to GGUF format
    Convert {
        /// Directory holding the downloaded model
        model_path: PathBuf,

        /// Model id the output file is named after
        model_id: String,
    },

    /// Verify the AllQuants environment
    Setup {
        /// Also check the converter's Python modules and the Hub token
        #[arg(long)]
        check_deps: bool,
    },
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "allquants=debug,allquants_core=debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Cancel `token` on the first Ctrl+C.
fn spawn_interrupt_listener(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                debug!("Interrupt received");
                token.cancel();
            }
            Err(e) => warn!("Could not listen for Ctrl+C: {}", e),
        }
    });
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cancel = CancellationToken::new();
    spawn_interrupt_listener(cancel.clone());

    let ctx = commands::Context {
        base_dir: cli.base_dir,
        verbose: cli.verbose,
        cancel,
    };

    let outcome = match cli.command {
        Command::Quantize {
            model_id,
            token,
            namespace,
            types,
            no_upload,
            show_types,
            non_interactive,
        } => {
            let args = commands::quantize::QuantizeArgs {
                model_id,
                token,
                namespace,
                types,
                no_upload,
                show_types,
                non_interactive,
            };
            commands::quantize::run(&ctx, args).await
        }
        Command::Types => commands::types::run(),
        Command::Download { model_id, token } => {
            commands::download::run(&ctx, &model_id, token.as_deref()).await
        }
        Command::Convert {
            model_path,
            model_id,
        } => commands::convert::run(&ctx, &model_path, &model_id).await,
        Command::Setup { check_deps } => commands::setup::run(&ctx, check_deps).await,
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            display::print_error(&e.to_string());
            if let Some(hint) = e.downcast_ref::<AllQuantsError>().and_then(hint_for) {
                display::print_warning(hint);
            }
            ExitCode::FAILURE
        }
    }
}

/// Follow-up advice for errors the user can fix.
fn hint_for(err: &AllQuantsError) -> Option<&'static str> {
    match err.category() {
        ErrorCategory::Precondition => Some("Run `allquants setup` to check your environment."),
        ErrorCategory::Network => Some("Check your network connection and Hugging Face token."),
        ErrorCategory::Validation
        | ErrorCategory::Process
        | ErrorCategory::Cancelled
        | ErrorCategory::Internal => None,
    }
}

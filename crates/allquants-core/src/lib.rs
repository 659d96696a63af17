//! AllQuants Core - Headless library for producing GGUF quantizations of
//! Hugging Face models.
//!
//! The crate downloads a model snapshot from the Hub, converts it to an F16
//! GGUF file with llama.cpp's `convert.py`, quantizes it with
//! `llama-quantize` for any of the 14 catalog profiles, and publishes the
//! results to a `<namespace>/<model>-GGUF` repository. Terminal rendering
//! and prompting are left to the caller through the [`Reporter`] and
//! [`Confirmer`] traits.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use allquants_core::{CancellationToken, ModelQuantizer, NullReporter, QuantizerConfig};
//!
//! #[tokio::main]
//! async fn main() -> allquants_core::Result<()> {
//!     let config = QuantizerConfig::new("/path/to/workdir");
//!     let quantizer =
//!         ModelQuantizer::with_defaults(config, Arc::new(NullReporter), CancellationToken::new())?;
//!
//!     let model_dir = quantizer.download("org/small-model").await?;
//!     let gguf = quantizer.convert(&model_dir, "org/small-model").await?;
//!     let files = quantizer
//!         .quantize(&gguf, "org/small-model", Some(&["Q4_K_M".to_string()]))
//!         .await?;
//!     println!("Produced {} files", files.len());
//!
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod card;
pub mod catalog;
pub mod config;
pub mod error;
pub mod hub;
pub mod layout;
pub mod llama_cpp;
pub mod naming;
pub mod platform;
pub mod process;
pub mod quantizer;
pub mod reporter;
pub mod setup;

// Re-export commonly used types
pub use cancel::CancellationToken;
pub use catalog::{find_profile, profile_names, profiles, QuantizationProfile};
pub use config::QuantizerConfig;
pub use error::{AllQuantsError, ErrorCategory, Result};
pub use hub::{resolve_token, HuggingFaceClient, ModelHub, TokenSource};
pub use layout::WorkspaceLayout;
pub use llama_cpp::LlamaCppToolchain;
pub use process::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
pub use quantizer::{ModelQuantizer, WorkflowFailure, WorkflowOptions, WorkflowResult, WorkflowState};
pub use reporter::{AssumeYes, Confirmer, NullReporter, Reporter, Step, WorkflowEvent};
pub use setup::{SetupCheck, SetupReport};

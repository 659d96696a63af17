//! Subcommand handlers.

pub mod convert;
pub mod download;
pub mod quantize;
pub mod setup;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use allquants_core::{resolve_token, CancellationToken, ModelQuantizer, QuantizerConfig, TokenSource};
use tracing::debug;

use crate::display::TerminalReporter;

/// Settings shared by every subcommand.
pub struct Context {
    pub base_dir: PathBuf,
    pub verbose: bool,
    pub cancel: CancellationToken,
}

impl Context {
    /// Runtime config with environment overrides and the resolved token.
    pub fn config(&self, explicit_token: Option<&str>) -> (QuantizerConfig, Option<TokenSource>) {
        let resolved = resolve_token(explicit_token);
        if let Some((_, source)) = &resolved {
            debug!("Using Hugging Face token from {}", source);
        }
        let source = resolved.as_ref().map(|(_, s)| *s);
        let config = QuantizerConfig::new(&self.base_dir)
            .with_env_overrides()
            .with_token(resolved.map(|(t, _)| t));
        (config, source)
    }

    pub fn quantizer(&self, config: QuantizerConfig) -> allquants_core::Result<ModelQuantizer> {
        ModelQuantizer::with_defaults(
            config,
            Arc::new(TerminalReporter::new(self.verbose)),
            self.cancel.clone(),
        )
    }
}

//! The download → convert → quantize → upload pipeline.
//!
//! [`ModelQuantizer`] owns the individual steps. Each step is idempotent:
//! when its output is already on disk it is returned instead of being
//! rebuilt. [`ModelQuantizer::run_workflow`] sequences the steps behind
//! optional confirmation gates.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use allquants_core::{
//!     AssumeYes, CancellationToken, ModelQuantizer, NullReporter, QuantizerConfig,
//!     WorkflowOptions,
//! };
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = QuantizerConfig::new(".").with_env_overrides();
//! let quantizer =
//!     ModelQuantizer::with_defaults(config, Arc::new(NullReporter), CancellationToken::new())?;
//!
//! let options = WorkflowOptions {
//!     profiles: Some(vec!["Q4_K_M".into()]),
//!     upload: false,
//!     interactive: false,
//! };
//! let result = quantizer.run_workflow("org/small-model", &options, &AssumeYes).await?;
//! println!("{} files", result.quantized_files.len());
//! # Ok(())
//! # }
//! ```

mod types;
mod workflow;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

pub use types::{WorkflowFailure, WorkflowOptions, WorkflowResult, WorkflowState};

use crate::cancel::CancellationToken;
use crate::card;
use crate::catalog::{find_profile, profile_names};
use crate::config::{HubConfig, QuantizerConfig, ToolConfig};
use crate::error::{AllQuantsError, Result};
use crate::hub::{HuggingFaceClient, ModelHub};
use crate::layout::WorkspaceLayout;
use crate::llama_cpp::LlamaCppToolchain;
use crate::naming::{short_model_name, validate_profile_name};
use crate::process::{CommandRunner, ProcessRunner};
use crate::reporter::{Reporter, WorkflowEvent};

/// README file name the model card is uploaded as.
const CARD_PATH_IN_REPO: &str = "README.md";

/// Runs the workflow steps against a working directory.
pub struct ModelQuantizer {
    config: QuantizerConfig,
    layout: WorkspaceLayout,
    toolchain: LlamaCppToolchain,
    runner: Arc<dyn CommandRunner>,
    hub: Arc<dyn ModelHub>,
    reporter: Arc<dyn Reporter>,
    cancel: CancellationToken,
}

impl ModelQuantizer {
    /// Create a quantizer with explicit collaborators.
    ///
    /// Creates `models/`, `gguf/` and `quantized/` under the base directory.
    pub fn new(
        config: QuantizerConfig,
        runner: Arc<dyn CommandRunner>,
        hub: Arc<dyn ModelHub>,
        reporter: Arc<dyn Reporter>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let layout = WorkspaceLayout::new(&config.base_dir);
        layout.ensure_dirs()?;
        let toolchain = LlamaCppToolchain::new(layout.clone(), config.python.clone());

        Ok(Self {
            config,
            layout,
            toolchain,
            runner,
            hub,
            reporter,
            cancel,
        })
    }

    /// Create a quantizer that runs real processes and talks to the Hub.
    pub fn with_defaults(
        config: QuantizerConfig,
        reporter: Arc<dyn Reporter>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let runner = Arc::new(ProcessRunner::new(reporter.clone(), cancel.clone()));
        let hub = HuggingFaceClient::new(config.hub_endpoint.clone(), config.token.clone())?
            .with_reporter(reporter.clone())
            .with_cancellation(cancel.clone());
        Self::new(config, runner, Arc::new(hub), reporter, cancel)
    }

    pub fn config(&self) -> &QuantizerConfig {
        &self.config
    }

    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    pub fn toolchain(&self) -> &LlamaCppToolchain {
        &self.toolchain
    }

    /// Upload repository for `model_id`: `<namespace>/<short name>-GGUF`.
    pub fn repo_id_for(&self, model_id: &str) -> String {
        format!(
            "{}/{}{}",
            self.config.namespace,
            short_model_name(model_id),
            HubConfig::REPO_SUFFIX
        )
    }

    fn report(&self, event: WorkflowEvent) {
        self.reporter.report(event);
    }

    fn report_existing(&self, what: &str, path: &Path) {
        info!("{} already exists at {}", what, path.display());
        self.report(WorkflowEvent::AlreadyExists {
            what: what.to_string(),
            path: path.to_path_buf(),
        });
    }

    // ========================================
    // Step 1: Download
    // ========================================

    /// Fetch the model snapshot into `models/<org_name>/`.
    ///
    /// The files land in a staging directory first and are renamed into place
    /// once complete, so an interrupted download is never mistaken for a
    /// finished one.
    pub async fn download(&self, model_id: &str) -> Result<PathBuf> {
        let target = self.layout.model_dir(model_id);
        if target.exists() {
            self.report_existing("Model", &target);
            return Ok(target);
        }
        self.cancel.check()?;

        let staging = self.layout.model_staging_dir(model_id);
        if staging.exists() {
            warn!("Removing incomplete download at {}", staging.display());
            std::fs::remove_dir_all(&staging)
                .map_err(|e| AllQuantsError::io("removing incomplete download", &staging, e))?;
        }

        info!("Downloading model {}", model_id);
        self.hub.download_snapshot(model_id, &staging).await?;

        std::fs::rename(&staging, &target)
            .map_err(|e| AllQuantsError::io("moving download into place", &target, e))?;
        info!("Model downloaded to {}", target.display());
        Ok(target)
    }

    // ========================================
    // Step 2: Convert
    // ========================================

    /// Convert the downloaded model to `gguf/<org_name>.gguf` (F16).
    pub async fn convert(&self, model_path: &Path, model_id: &str) -> Result<PathBuf> {
        let gguf_path = self.layout.gguf_path(model_id);
        if gguf_path.exists() {
            self.report_existing("GGUF file", &gguf_path);
            return Ok(gguf_path);
        }

        let script = self.toolchain.convert_script()?;
        info!("Converting {} to GGUF", model_id);

        let spec = self.toolchain.convert_command(&script, model_path, &gguf_path);
        let output = self.runner.run(&spec).await?;

        if !output.success() {
            remove_partial(&gguf_path);
            return Err(AllQuantsError::ConversionFailed {
                message: format!(
                    "convert.py exited with code {}\n{}",
                    output.exit_code,
                    output.diagnostic_tail(ToolConfig::FAILURE_TAIL_LINES)
                ),
            });
        }
        if !gguf_path.exists() {
            return Err(AllQuantsError::ConversionFailed {
                message: format!(
                    "convert.py finished but {} was not created",
                    gguf_path.display()
                ),
            });
        }

        info!("GGUF conversion completed: {}", gguf_path.display());
        Ok(gguf_path)
    }

    // ========================================
    // Step 3: Quantize
    // ========================================

    /// Quantize `gguf_path` once per profile, in the given order.
    ///
    /// Defaults to the whole catalog. Names outside the catalog are passed
    /// through but must be plain `[A-Za-z0-9_]` identifiers. A profile whose
    /// quantizer run fails is reported and left out of the returned list; the
    /// others still run. A quantizer that cannot be launched aborts the step.
    pub async fn quantize(
        &self,
        gguf_path: &Path,
        model_id: &str,
        profiles: Option<&[String]>,
    ) -> Result<Vec<PathBuf>> {
        let selected: Vec<String> = resolve_profiles(profiles)
            .into_iter()
            .map(|p| p.trim().to_string())
            .collect();
        for requested in &selected {
            validate_profile_name(requested)?;
        }
        for unknown in selected.iter().filter(|p| find_profile(p).is_none()) {
            let message = format!("{unknown} is not a known quantization type, passing it through");
            warn!("{}", message);
            self.report(WorkflowEvent::Warning { message });
        }

        let binary = self.toolchain.quantize_binary()?;
        let total = selected.len();
        let mut produced = Vec::with_capacity(total);

        for (index, requested) in selected.iter().enumerate() {
            self.cancel.check()?;
            let profile = find_profile(requested)
                .map(|p| p.name.to_string())
                .unwrap_or_else(|| requested.clone());
            let output_path = self.layout.quantized_path(model_id, &profile);

            self.report(WorkflowEvent::ProfileStarted {
                profile: profile.clone(),
                index: index + 1,
                total,
            });

            if output_path.exists() {
                self.report_existing("Quantized file", &output_path);
                self.report(WorkflowEvent::ProfileCompleted {
                    profile,
                    path: output_path.clone(),
                });
                produced.push(output_path);
                continue;
            }

            info!("Quantizing to {}", profile);
            let spec = self
                .toolchain
                .quantize_command(&binary, gguf_path, &output_path, &profile);
            let output = self.runner.run(&spec).await?;

            if output.success() && output_path.exists() {
                info!("{} quantization completed", profile);
                self.report(WorkflowEvent::ProfileCompleted {
                    profile,
                    path: output_path.clone(),
                });
                produced.push(output_path);
            } else {
                remove_partial(&output_path);
                let message = if output.success() {
                    format!("no output written to {}", output_path.display())
                } else {
                    format!(
                        "exit code {}: {}",
                        output.exit_code,
                        output.diagnostic_tail(ToolConfig::FAILURE_TAIL_LINES)
                    )
                };
                warn!("{} quantization failed: {}", profile, message);
                self.report(WorkflowEvent::ProfileFailed { profile, message });
            }
        }

        info!("{} of {} quantized files available", produced.len(), total);
        Ok(produced)
    }

    // ========================================
    // Model card & upload
    // ========================================

    /// Render `TEMPLATE.md` for `model_id`.
    pub fn generate_card(&self, model_id: &str) -> Result<String> {
        card::generate_card(&self.layout.card_template(), model_id)
    }

    /// Publish the card and `files` to `<namespace>/<short name>-GGUF`.
    ///
    /// The repository is created or reused. Nothing is rolled back when an
    /// upload fails part way.
    pub async fn upload(&self, model_id: &str, files: &[PathBuf]) -> Result<String> {
        let repo_id = self.repo_id_for(model_id);
        let card = self.generate_card(model_id)?;

        info!("Creating repository {}", repo_id);
        self.hub.create_repo(&repo_id).await?;
        self.report(WorkflowEvent::RepoReady {
            repo_id: repo_id.clone(),
        });

        let total = files.len() + 1;
        self.report(WorkflowEvent::TransferStarted {
            file: CARD_PATH_IN_REPO.to_string(),
            index: 1,
            total,
            size: Some(card.len() as u64),
        });
        self.hub
            .upload_bytes(&repo_id, card.into_bytes(), CARD_PATH_IN_REPO)
            .await?;
        self.report(WorkflowEvent::TransferCompleted {
            file: CARD_PATH_IN_REPO.to_string(),
        });

        for (index, file) in files.iter().enumerate() {
            self.cancel.check()?;
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| AllQuantsError::FileNotFound(file.clone()))?;

            self.report(WorkflowEvent::TransferStarted {
                file: name.clone(),
                index: index + 2,
                total,
                size: std::fs::metadata(file).ok().map(|m| m.len()),
            });
            info!("Uploading {}", name);
            self.hub.upload_file(&repo_id, file, &name).await?;
            self.report(WorkflowEvent::TransferCompleted { file: name });
        }

        info!("All files uploaded to {}", repo_id);
        Ok(repo_id)
    }
}

/// Requested profiles, or the whole catalog in catalog order.
fn resolve_profiles(profiles: Option<&[String]>) -> Vec<String> {
    match profiles {
        Some(list) if !list.is_empty() => list.to_vec(),
        _ => profile_names(),
    }
}

/// Remove a half-written output so the next run does not skip it.
fn remove_partial(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Could not remove partial output {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_profiles_defaults_to_catalog() {
        assert_eq!(resolve_profiles(None).len(), 14);
        assert_eq!(resolve_profiles(Some(&[])).len(), 14);

        let chosen = vec!["Q8_0".to_string(), "Q2_K".to_string()];
        assert_eq!(resolve_profiles(Some(&chosen)), chosen);
    }
}

//! Workflow state machine: Download → Convert → Quantize → Upload → Done.

use tracing::{error, info, warn};

use super::types::{WorkflowFailure, WorkflowOptions, WorkflowResult, WorkflowState};
use super::ModelQuantizer;
use crate::catalog::QUANTIZATION_PROFILES;
use crate::error::Result;
use crate::naming::validate_model_id;
use crate::reporter::{Confirmer, Step, WorkflowEvent};

impl ModelQuantizer {
    /// Run every step for `model_id`.
    ///
    /// - A declined gate stops the run with `success == false` and no error.
    /// - An interrupt stops the run with the error "Interrupted by user" and
    ///   is still returned as `Ok`.
    /// - Any other error is returned as [`WorkflowFailure`], which carries
    ///   the partial result.
    pub async fn run_workflow(
        &self,
        model_id: &str,
        options: &WorkflowOptions,
        confirmer: &dyn Confirmer,
    ) -> std::result::Result<WorkflowResult, WorkflowFailure> {
        let mut result = WorkflowResult::new(model_id);
        info!("Starting workflow for {}", model_id);

        let outcome = self.drive(model_id, options, confirmer, &mut result).await;
        let step = result.state.step().unwrap_or(Step::Download);

        match outcome {
            Ok(()) => {
                info!("Workflow for {} finished: {}", model_id, result.state);
                Ok(result.finish())
            }
            Err(e) if e.is_cancellation() => {
                warn!("Workflow interrupted by user during {}", step);
                result.state = WorkflowState::Interrupted(step);
                result.error = Some(e.to_string());
                Ok(result.finish())
            }
            Err(e) => {
                error!("Workflow failed during {}: {}", step, e);
                result.state = WorkflowState::Failed(step);
                result.error = Some(e.to_string());
                Err(WorkflowFailure {
                    result: Box::new(result.finish()),
                    source: e,
                })
            }
        }
    }

    async fn drive(
        &self,
        model_id: &str,
        options: &WorkflowOptions,
        confirmer: &dyn Confirmer,
        result: &mut WorkflowResult,
    ) -> Result<()> {
        validate_model_id(model_id)?;

        // Step 1
        let details = vec![
            format!("About to download: {model_id}"),
            "This will download the full model (potentially several GB)".to_string(),
        ];
        if !self.gate(Step::Download, details, options, confirmer, result)? {
            return Ok(());
        }
        let model_path = self.download(model_id).await?;
        result.model_path = Some(model_path.clone());
        self.complete(Step::Download, format!("Model downloaded to {}", model_path.display()));

        // Step 2
        let details = vec![
            format!("About to convert {model_id} to GGUF format"),
            "This process may take several minutes depending on model size".to_string(),
        ];
        if !self.gate(Step::Convert, details, options, confirmer, result)? {
            return Ok(());
        }
        let gguf_path = self.convert(&model_path, model_id).await?;
        result.gguf_path = Some(gguf_path.clone());
        self.complete(Step::Convert, format!("GGUF file created at {}", gguf_path.display()));

        // Step 3
        let profiles = options.profiles.as_deref().filter(|p| !p.is_empty());
        let details = vec![
            format!(
                "About to quantize to {} different formats",
                profiles.map_or(QUANTIZATION_PROFILES.len(), <[String]>::len)
            ),
            format!(
                "Types: {}",
                profiles.map_or_else(
                    || format!("All {} types", QUANTIZATION_PROFILES.len()),
                    |p| p.join(", ")
                )
            ),
            "This is the most time-consuming step and may take 30+ minutes".to_string(),
        ];
        if !self.gate(Step::Quantize, details, options, confirmer, result)? {
            return Ok(());
        }
        let quantized = self.quantize(&gguf_path, model_id, profiles).await?;
        result.quantized_files = quantized.clone();
        self.complete(
            Step::Quantize,
            format!("{} quantized files created", quantized.len()),
        );

        // Step 4
        if options.upload && !quantized.is_empty() {
            let repo_id = self.repo_id_for(model_id);
            let details = vec![
                format!("About to create repository: {repo_id}"),
                format!("Will upload {} quantized files", quantized.len()),
                "This will make the models publicly available".to_string(),
            ];
            if !self.gate(Step::Upload, details, options, confirmer, result)? {
                return Ok(());
            }
            let repo_id = self.upload(model_id, &quantized).await?;
            result.repo_id = Some(repo_id.clone());
            self.complete(Step::Upload, format!("Repository created at {repo_id}"));
        } else if options.upload {
            let message = "No quantized files were produced, skipping upload".to_string();
            warn!("{}", message);
            self.report(WorkflowEvent::Warning { message });
        }

        result.state = WorkflowState::Done;
        Ok(())
    }

    /// Announce `step` and ask to continue. `Ok(false)` means declined.
    fn gate(
        &self,
        step: Step,
        details: Vec<String>,
        options: &WorkflowOptions,
        confirmer: &dyn Confirmer,
        result: &mut WorkflowResult,
    ) -> Result<bool> {
        self.cancel.check()?;
        result.state = WorkflowState::at(step);
        self.report(WorkflowEvent::StepAnnounced { step, details });

        if !options.interactive {
            return Ok(true);
        }

        let proceed = confirmer.confirm(step, step.prompt())?;
        self.cancel.check()?;
        if !proceed {
            info!("Workflow cancelled at {} step", step);
            result.state = WorkflowState::Declined(step);
            self.report(WorkflowEvent::StepDeclined { step });
        }
        Ok(proceed)
    }

    fn complete(&self, step: Step, summary: String) {
        info!("Step {} completed: {}", step.number(), summary);
        self.report(WorkflowEvent::StepCompleted { step, summary });
    }
}

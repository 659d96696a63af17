use std::process::ExitCode;

use allquants_core::naming::{validate_model_id, validate_profile_name};
use allquants_core::{AssumeYes, Confirmer, WorkflowOptions, WorkflowResult};
use console::style;

use super::Context;
use crate::display::{print_panel, print_profile_table, print_warning};
use crate::prompt::{self, TerminalConfirmer};

pub struct QuantizeArgs {
    pub model_id: String,
    pub token: Option<String>,
    pub namespace: Option<String>,
    pub types: Vec<String>,
    pub no_upload: bool,
    pub show_types: bool,
    pub non_interactive: bool,
}

/// `allquants quantize <model-id>`
pub async fn run(ctx: &Context, args: QuantizeArgs) -> anyhow::Result<ExitCode> {
    if args.show_types {
        print_profile_table(allquants_core::profiles())?;
        return Ok(ExitCode::SUCCESS);
    }

    validate_model_id(&args.model_id)?;
    for profile in &args.types {
        validate_profile_name(profile.trim())?;
    }

    let (mut config, _) = ctx.config(args.token.as_deref());
    if let Some(namespace) = args.namespace.filter(|n| !n.trim().is_empty()) {
        config = config.with_namespace(namespace.trim());
    }

    let mut upload = !args.no_upload;
    if upload && config.token.is_none() {
        print_warning("No Hugging Face token provided. Models will not be uploaded.");
        upload = false;
    }

    let options = WorkflowOptions {
        profiles: (!args.types.is_empty()).then_some(args.types),
        upload,
        interactive: !args.non_interactive,
    };

    print_panel(&start_summary(&args.model_id, &options));

    if options.interactive {
        match prompt::ask("Continue with quantization?") {
            Ok(true) => {}
            Ok(false) => {
                print_warning("Quantization cancelled.");
                return Ok(ExitCode::SUCCESS);
            }
            Err(e) if e.is_cancellation() => {
                print_warning("Quantization interrupted by user.");
                return Ok(ExitCode::FAILURE);
            }
            Err(e) => return Err(e.into()),
        }
    }

    let quantizer = ctx.quantizer(config)?;
    let confirmer: &dyn Confirmer = if options.interactive {
        &TerminalConfirmer
    } else {
        &AssumeYes
    };

    match quantizer.run_workflow(&args.model_id, &options, confirmer).await {
        Ok(result) => {
            print_panel(&result_summary(&result));
            if result.was_interrupted() {
                print_warning("Quantization interrupted by user.");
                Ok(ExitCode::FAILURE)
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
        Err(failure) => {
            print_panel(&result_summary(&failure.result));
            Err(failure.source.into())
        }
    }
}

fn flag(value: bool, off_color: fn(console::StyledObject<String>) -> console::StyledObject<String>) -> String {
    let text = value.to_string();
    if value {
        style(text).green().to_string()
    } else {
        off_color(style(text)).to_string()
    }
}

fn start_summary(model_id: &str, options: &WorkflowOptions) -> Vec<String> {
    let count = options
        .profiles
        .as_ref()
        .map_or(allquants_core::profiles().len(), Vec::len);
    vec![
        style("Starting quantization workflow").bold().to_string(),
        format!("Model: {}", style(model_id).cyan()),
        format!("Quantization types: {}", style(count).yellow()),
        format!("Upload to HF: {}", flag(options.upload, |s| s.red())),
        format!("Interactive mode: {}", flag(options.interactive, |s| s.yellow())),
    ]
}

fn result_summary(result: &WorkflowResult) -> Vec<String> {
    let title = if result.success {
        style("Quantization Results").bold().green()
    } else {
        style("Quantization Results").bold().yellow()
    };
    let mut lines = vec![
        title.to_string(),
        format!("Model: {}", result.model_id),
        format!("Quantized files: {}", result.quantized_files.len()),
        format!(
            "Repository: {}",
            result.repo_id.as_deref().unwrap_or("Not uploaded")
        ),
        format!("Success: {}", if result.success { "✓" } else { "✗" }),
    ];
    if !result.success {
        lines.push(format!("Stopped: {}", result.state));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use allquants_core::{Step, WorkflowState};
    use std::path::PathBuf;

    #[test]
    fn test_start_summary_counts_profiles() {
        console::set_colors_enabled(false);
        let mut options = WorkflowOptions::default();
        assert!(start_summary("org/m", &options)
            .contains(&"Quantization types: 14".to_string()));

        options.profiles = Some(vec!["Q4_K_M".into(), "Q8_0".into()]);
        options.upload = true;
        let lines = start_summary("org/m", &options);
        assert!(lines.contains(&"Quantization types: 2".to_string()));
        assert!(lines.contains(&"Upload to HF: true".to_string()));
    }

    #[test]
    fn test_result_summary_reports_stop_state() {
        console::set_colors_enabled(false);
        let mut result = WorkflowResult::new("org/m");
        result.state = WorkflowState::Declined(Step::Upload);
        result.quantized_files = vec![PathBuf::from("quantized/org_m-q8_0.gguf")];

        let lines = result_summary(&result);
        assert!(lines.contains(&"Quantized files: 1".to_string()));
        assert!(lines.contains(&"Repository: Not uploaded".to_string()));
        assert!(lines.contains(&"Stopped: declined at Upload to Hugging Face".to_string()));
    }
}

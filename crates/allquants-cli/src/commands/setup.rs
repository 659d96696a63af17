use std::process::ExitCode;
use std::sync::Arc;

use allquants_core::config::PathsConfig;
use allquants_core::platform::QUANTIZE_TOOL;
use allquants_core::setup::{AccountCheck, SetupReport, MIN_PYTHON_VERSION};
use allquants_core::{HuggingFaceClient, NullReporter, ProcessRunner, SetupCheck, WorkspaceLayout};
use console::style;

use super::Context;

/// `allquants setup [--check-deps]`
///
/// Reports problems but always exits successfully.
pub async fn run(ctx: &Context, check_deps: bool) -> anyhow::Result<ExitCode> {
    crate::display::print_panel(&[style("AllQuants Environment Setup").bold().blue().to_string()]);

    let (config, token_source) = ctx.config(None);
    let layout = WorkspaceLayout::new(&config.base_dir);
    let runner = ProcessRunner::new(Arc::new(NullReporter), ctx.cancel.clone());
    let hub = HuggingFaceClient::new(config.hub_endpoint.clone(), config.token.clone())?
        .with_cancellation(ctx.cancel.clone());

    let report = SetupCheck::new(&layout, &config.python, &runner, &hub)
        .run(token_source, check_deps)
        .await;

    for line in render(&report) {
        println!("{line}");
    }
    Ok(ExitCode::SUCCESS)
}

fn ok(text: impl AsRef<str>) -> String {
    format!("{} {}", style("OK").green(), style(text.as_ref()).green())
}

fn fail(text: impl AsRef<str>) -> String {
    format!("{} {}", style("X").red(), style(text.as_ref()).red())
}

fn hint(text: impl AsRef<str>) -> String {
    style(text.as_ref()).yellow().to_string()
}

fn render(report: &SetupReport) -> Vec<String> {
    let mut lines = Vec::new();

    if report.platform_supported {
        lines.push(ok(format!("Platform: {}", report.platform)));
    } else {
        lines.push(fail(format!("Unsupported platform: {}", report.platform)));
    }

    let python = &report.python;
    match (&python.version, &python.error) {
        (Some(version), _) => {
            lines.push(format!("Python version: {version} ({})", python.interpreter.display()));
            if python.supported {
                lines.push(ok("Python version OK"));
            } else {
                lines.push(fail(format!(
                    "Python {}.{}+ required",
                    MIN_PYTHON_VERSION.0, MIN_PYTHON_VERSION.1
                )));
            }
        }
        (None, Some(error)) => {
            lines.push(fail(format!("Python interpreter {}: {error}", python.interpreter.display())));
        }
        (None, None) => lines.push(fail("Python version unknown")),
    }

    for file in &report.files {
        if file.found {
            lines.push(ok(format!("{} found", file.name)));
        } else {
            lines.push(fail(format!("{} missing", file.name)));
        }
    }

    let toolchain = &report.toolchain;
    if toolchain.bin_dir_found {
        lines.push(ok(format!("{} directory found", PathsConfig::LLAMA_BIN_DIR_NAME)));
        match &toolchain.quantizer {
            Some(path) => {
                let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
                lines.push(ok(format!("{QUANTIZE_TOOL} found: {name}")));
                if !toolchain.quantizer_executable {
                    lines.push(fail(format!("{name} is not executable")));
                    lines.push(hint(format!("Run: chmod +x {}", path.display())));
                }
            }
            None => {
                lines.push(fail(format!("{QUANTIZE_TOOL} executable not found")));
                lines.push(hint("Please build llama.cpp with quantization support"));
            }
        }
    } else {
        lines.push(fail(format!("{} directory not found", PathsConfig::LLAMA_BIN_DIR_NAME)));
    }

    match report.token_source {
        Some(source) => lines.push(ok(format!("Hugging Face token found ({source})"))),
        None => lines.push(hint("No Hugging Face token found; uploads will be skipped")),
    }

    if let Some(deps) = &report.dependencies {
        lines.push(String::new());
        lines.push(style("Checking Python dependencies...").bold().to_string());
        if let Some(error) = &deps.error {
            lines.push(fail(format!("Dependency check failed: {error}")));
        } else if deps.missing.is_empty() {
            lines.push(ok("All Python dependencies available"));
        } else {
            lines.push(fail(format!("Missing dependency: {}", deps.missing.join(", "))));
            lines.push(hint(format!("Run: pip install -r {}", PathsConfig::REQUIREMENTS_FILE)));
        }
    }

    match &report.account {
        Some(AccountCheck::Valid { user }) => lines.push(ok(format!("Token valid for {user}"))),
        Some(AccountCheck::Invalid { message }) => lines.push(fail(format!("Token rejected: {message}"))),
        None => {}
    }

    lines.push(String::new());
    if report.is_ready() {
        lines.push(style("Setup check complete!").bold().green().to_string());
    } else {
        lines.push(
            style(format!("Setup check complete with {} problem(s)", report.problems().len()))
                .bold()
                .yellow()
                .to_string(),
        );
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use allquants_core::llama_cpp::ToolchainStatus;
    use allquants_core::setup::{DependencyCheck, FileCheck, PythonCheck};
    use std::path::PathBuf;

    fn report() -> SetupReport {
        SetupReport {
            platform: "linux",
            platform_supported: true,
            python: PythonCheck {
                interpreter: PathBuf::from("python3"),
                version: Some("3.11.4".into()),
                supported: true,
                error: None,
            },
            files: vec![FileCheck {
                name: "convert.py",
                path: PathBuf::from("convert.py"),
                found: false,
            }],
            toolchain: ToolchainStatus {
                convert_script: PathBuf::from("convert.py"),
                convert_script_found: false,
                bin_dir: PathBuf::from("llama.cpp.bin"),
                bin_dir_found: true,
                quantizer: None,
                quantizer_executable: false,
                ready: false,
            },
            token_source: None,
            dependencies: Some(DependencyCheck {
                missing: vec!["torch".into()],
                error: None,
            }),
            account: None,
        }
    }

    #[test]
    fn test_render_lists_problems_and_hints() {
        console::set_colors_enabled(false);
        let lines = render(&report());

        assert!(lines.contains(&"OK Python version OK".to_string()));
        assert!(lines.contains(&"X convert.py missing".to_string()));
        assert!(lines.contains(&"X llama-quantize executable not found".to_string()));
        assert!(lines.contains(&"Please build llama.cpp with quantization support".to_string()));
        assert!(lines.contains(&"X Missing dependency: torch".to_string()));
        assert!(lines.contains(&"Run: pip install -r requirements.txt".to_string()));
        assert!(lines.last().unwrap().starts_with("Setup check complete with"));
    }
}

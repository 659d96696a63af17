//! Environment checks behind `allquants setup`.
//!
//! Every check records what it found instead of failing, so one missing piece
//! never hides the state of the others.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::{PathsConfig, ToolConfig};
use crate::hub::{ModelHub, TokenSource};
use crate::layout::WorkspaceLayout;
use crate::llama_cpp::{LlamaCppToolchain, ToolchainStatus};
use crate::platform;
use crate::process::{CommandRunner, CommandSpec};

/// Oldest interpreter the converter script supports.
pub const MIN_PYTHON_VERSION: (u32, u32) = (3, 8);

/// Prints the names of the modules given as arguments that cannot be imported.
const IMPORT_PROBE: &str = "import importlib.util, sys\n\
print(' '.join(m for m in sys.argv[1:] if importlib.util.find_spec(m) is None))";

/// Interpreter lookup result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PythonCheck {
    pub interpreter: PathBuf,
    /// `major.minor.patch` as reported by `--version`.
    pub version: Option<String>,
    pub supported: bool,
    pub error: Option<String>,
}

/// A file expected in the base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCheck {
    pub name: &'static str,
    pub path: PathBuf,
    pub found: bool,
}

/// Result of the Python import probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyCheck {
    pub missing: Vec<String>,
    /// Set when the probe itself could not run.
    pub error: Option<String>,
}

impl DependencyCheck {
    pub fn ok(&self) -> bool {
        self.error.is_none() && self.missing.is_empty()
    }
}

/// Result of validating the token against the Hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountCheck {
    Valid { user: String },
    Invalid { message: String },
}

/// Everything `setup` found.
#[derive(Debug, Clone)]
pub struct SetupReport {
    pub platform: &'static str,
    pub platform_supported: bool,
    pub python: PythonCheck,
    pub files: Vec<FileCheck>,
    pub toolchain: ToolchainStatus,
    pub token_source: Option<TokenSource>,
    /// Only present with `--check-deps`.
    pub dependencies: Option<DependencyCheck>,
    /// Only present with `--check-deps` and a token.
    pub account: Option<AccountCheck>,
}

impl SetupReport {
    /// Human-readable list of everything that would stop a workflow.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !self.platform_supported {
            problems.push(format!("Unsupported platform: {}", self.platform));
        }
        if !self.python.supported {
            problems.push(match &self.python.error {
                Some(error) => format!("Python interpreter unusable: {error}"),
                None => format!(
                    "Python {}.{}+ required",
                    MIN_PYTHON_VERSION.0, MIN_PYTHON_VERSION.1
                ),
            });
        }
        for file in self.files.iter().filter(|f| !f.found) {
            problems.push(format!("{} missing", file.name));
        }
        if !self.toolchain.bin_dir_found {
            problems.push(format!("{} directory not found", PathsConfig::LLAMA_BIN_DIR_NAME));
        } else if self.toolchain.quantizer.is_none() {
            problems.push(format!("{} executable not found", platform::QUANTIZE_TOOL));
        } else if !self.toolchain.quantizer_executable {
            problems.push(format!("{} is not executable", platform::QUANTIZE_TOOL));
        }
        if let Some(deps) = &self.dependencies {
            if let Some(error) = &deps.error {
                problems.push(format!("Dependency check failed: {error}"));
            } else if !deps.missing.is_empty() {
                problems.push(format!("Missing Python modules: {}", deps.missing.join(", ")));
            }
        }
        if let Some(AccountCheck::Invalid { message }) = &self.account {
            problems.push(format!("Hub token rejected: {message}"));
        }
        problems
    }

    pub fn is_ready(&self) -> bool {
        self.problems().is_empty()
    }
}

/// Runs the setup checks.
pub struct SetupCheck<'a> {
    layout: &'a WorkspaceLayout,
    python: &'a Path,
    runner: &'a dyn CommandRunner,
    hub: &'a dyn ModelHub,
}

impl<'a> SetupCheck<'a> {
    pub fn new(
        layout: &'a WorkspaceLayout,
        python: &'a Path,
        runner: &'a dyn CommandRunner,
        hub: &'a dyn ModelHub,
    ) -> Self {
        Self {
            layout,
            python,
            runner,
            hub,
        }
    }

    /// Collect the report. `check_deps` adds the import probe and token validation.
    pub async fn run(&self, token_source: Option<TokenSource>, check_deps: bool) -> SetupReport {
        info!("Checking environment in {}", self.layout.base_dir().display());

        let python = self.check_python().await;
        let files = vec![
            file_check(PathsConfig::CONVERT_SCRIPT, self.layout.convert_script()),
            file_check(PathsConfig::CARD_TEMPLATE, self.layout.card_template()),
            file_check(PathsConfig::REQUIREMENTS_FILE, self.layout.requirements_file()),
        ];
        let toolchain = LlamaCppToolchain::new(self.layout.clone(), self.python).status();

        let (dependencies, account) = if check_deps {
            let deps = if python.error.is_none() {
                self.check_dependencies().await
            } else {
                DependencyCheck {
                    missing: Vec::new(),
                    error: Some("no usable Python interpreter".to_string()),
                }
            };
            let account = match token_source {
                Some(_) => Some(self.check_account().await),
                None => None,
            };
            (Some(deps), account)
        } else {
            (None, None)
        };

        SetupReport {
            platform: platform::current_platform(),
            platform_supported: platform::is_supported_platform(),
            python,
            files,
            toolchain,
            token_source,
            dependencies,
            account,
        }
    }

    async fn check_python(&self) -> PythonCheck {
        let mut check = PythonCheck {
            interpreter: self.python.to_path_buf(),
            version: None,
            supported: false,
            error: None,
        };

        let spec = CommandSpec::new(self.python).arg("--version");
        match self.runner.run(&spec).await {
            Ok(output) if output.success() => {
                // Python 2 prints its version on stderr.
                let text = format!("{}\n{}", output.stdout, output.stderr);
                match parse_python_version(&text) {
                    Some((major, minor, patch)) => {
                        check.version = Some(format!("{major}.{minor}.{patch}"));
                        check.supported = (major, minor) >= MIN_PYTHON_VERSION;
                    }
                    None => check.error = Some(format!("unrecognized version output: {}", text.trim())),
                }
            }
            Ok(output) => {
                check.error = Some(format!("exited with code {}", output.exit_code));
            }
            Err(e) => check.error = Some(e.to_string()),
        }

        debug!("Python check: {:?}", check);
        check
    }

    async fn check_dependencies(&self) -> DependencyCheck {
        let spec = CommandSpec::new(self.python)
            .arg("-c")
            .arg(IMPORT_PROBE)
            .args(ToolConfig::CONVERTER_MODULES.iter().copied());

        match self.runner.run(&spec).await {
            Ok(output) if output.success() => DependencyCheck {
                missing: output.stdout.split_whitespace().map(str::to_string).collect(),
                error: None,
            },
            Ok(output) => DependencyCheck {
                missing: Vec::new(),
                error: Some(format!(
                    "import probe exited with code {}: {}",
                    output.exit_code,
                    output.diagnostic_tail(3)
                )),
            },
            Err(e) => DependencyCheck {
                missing: Vec::new(),
                error: Some(e.to_string()),
            },
        }
    }

    async fn check_account(&self) -> AccountCheck {
        match self.hub.whoami().await {
            Ok(user) => AccountCheck::Valid { user: user.name },
            Err(e) => {
                warn!("Token validation failed: {}", e);
                AccountCheck::Invalid {
                    message: e.to_string(),
                }
            }
        }
    }
}

fn file_check(name: &'static str, path: PathBuf) -> FileCheck {
    FileCheck {
        name,
        found: path.is_file(),
        path,
    }
}

/// Parse `Python 3.11.4` (patch optional) into its components.
pub fn parse_python_version(text: &str) -> Option<(u32, u32, u32)> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"Python\s+(\d+)\.(\d+)(?:\.(\d+))?").expect("valid regex")
    });

    let caps = re.captures(text)?;
    let major = caps.get(1)?.as_str().parse().ok()?;
    let minor = caps.get(2)?.as_str().parse().ok()?;
    let patch = caps
        .get(3)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    Some((major, minor, patch))
}

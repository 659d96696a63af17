//! Centralized configuration for AllQuants.
//!
//! Constant holder structs describe the fixed on-disk layout, tool names and
//! hub endpoints. [`QuantizerConfig`] carries the values that vary per run.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const USER_AGENT: &'static str = "allquants/1.0";
}

/// Hugging Face Hub configuration.
pub struct HubConfig;

impl HubConfig {
    pub const DEFAULT_ENDPOINT: &'static str = "https://huggingface.co";
    /// Account namespace that receives uploaded repositories.
    pub const DEFAULT_NAMESPACE: &'static str = "leeminwaan";
    /// Suffix appended to the short model name to form the upload repo name.
    pub const REPO_SUFFIX: &'static str = "-GGUF";
    pub const TOKEN_ENV_VAR: &'static str = "HF_TOKEN";
    pub const ENDPOINT_ENV_VAR: &'static str = "HF_ENDPOINT";
    pub const NAMESPACE_ENV_VAR: &'static str = "ALLQUANTS_NAMESPACE";
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DOWNLOAD_TEMP_SUFFIX: &'static str = ".part";
    pub const STAGING_DIR_SUFFIX: &'static str = "downloading";
    /// Bytes of each file sent as the `sample` in preupload requests.
    pub const PREUPLOAD_SAMPLE_BYTES: usize = 512;
    pub const UPLOAD_CHUNK_SIZE: usize = 8 * 1024 * 1024;
}

/// Working directory and file names relative to the base directory.
pub struct PathsConfig;

impl PathsConfig {
    pub const MODELS_DIR_NAME: &'static str = "models";
    pub const GGUF_DIR_NAME: &'static str = "gguf";
    pub const QUANTIZED_DIR_NAME: &'static str = "quantized";
    pub const LLAMA_BIN_DIR_NAME: &'static str = "llama.cpp.bin";
    pub const CONVERT_SCRIPT: &'static str = "convert.py";
    pub const CARD_TEMPLATE: &'static str = "TEMPLATE.md";
    pub const REQUIREMENTS_FILE: &'static str = "requirements.txt";
    pub const GGUF_EXTENSION: &'static str = "gguf";
}

/// External tool settings.
pub struct ToolConfig;

impl ToolConfig {
    pub const PYTHON_ENV_VAR: &'static str = "ALLQUANTS_PYTHON";
    /// Output precision requested from the converter.
    pub const CONVERT_OUTTYPE: &'static str = "f16";
    /// Python modules the converter script imports.
    pub const CONVERTER_MODULES: &'static [&'static str] = &[
        "torch",
        "transformers",
        "gguf",
        "sentencepiece",
        "numpy",
        "safetensors",
    ];
    /// Lines of captured output kept in a conversion failure message.
    pub const FAILURE_TAIL_LINES: usize = 20;

    /// Default Python interpreter name for this platform.
    pub fn default_python() -> &'static str {
        #[cfg(windows)]
        {
            "python"
        }
        #[cfg(not(windows))]
        {
            "python3"
        }
    }
}

/// Per-run configuration for [`crate::ModelQuantizer`].
#[derive(Debug, Clone)]
pub struct QuantizerConfig {
    /// Directory under which `models/`, `gguf/` and `quantized/` live.
    pub base_dir: PathBuf,
    /// Python interpreter used to run the converter script.
    pub python: PathBuf,
    /// Hub base URL.
    pub hub_endpoint: String,
    /// Account namespace for uploaded repositories.
    pub namespace: String,
    /// Hub access token.
    pub token: Option<String>,
}

impl QuantizerConfig {
    /// Create a config rooted at `base_dir` with default tool and hub settings.
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            python: PathBuf::from(ToolConfig::default_python()),
            hub_endpoint: HubConfig::DEFAULT_ENDPOINT.to_string(),
            namespace: HubConfig::DEFAULT_NAMESPACE.to_string(),
            token: None,
        }
    }

    /// Apply `ALLQUANTS_PYTHON`, `HF_ENDPOINT` and `ALLQUANTS_NAMESPACE` overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(python) = non_empty_env(ToolConfig::PYTHON_ENV_VAR) {
            self.python = PathBuf::from(python);
        }
        if let Some(endpoint) = non_empty_env(HubConfig::ENDPOINT_ENV_VAR) {
            self.hub_endpoint = endpoint;
        }
        if let Some(namespace) = non_empty_env(HubConfig::NAMESPACE_ENV_VAR) {
            self.namespace = namespace;
        }
        self
    }

    pub fn with_python(mut self, python: impl Into<PathBuf>) -> Self {
        self.python = python.into();
        self
    }

    pub fn with_hub_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.hub_endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        self
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = QuantizerConfig::new("/work");
        assert_eq!(config.base_dir, PathBuf::from("/work"));
        assert_eq!(config.namespace, "leeminwaan");
        assert_eq!(config.hub_endpoint, "https://huggingface.co");
        assert!(config.token.is_none());
    }

    #[test]
    fn test_builders() {
        let config = QuantizerConfig::new("/work")
            .with_hub_endpoint("http://localhost:8080/")
            .with_namespace("someone")
            .with_python("/usr/bin/python3.11")
            .with_token(Some("  hf_abc \n".to_string()));

        assert_eq!(config.hub_endpoint, "http://localhost:8080");
        assert_eq!(config.namespace, "someone");
        assert_eq!(config.python, PathBuf::from("/usr/bin/python3.11"));
        assert_eq!(config.token.as_deref(), Some("hf_abc"));
    }

    #[test]
    fn test_blank_token_is_none() {
        let config = QuantizerConfig::new("/work").with_token(Some("   ".to_string()));
        assert!(config.token.is_none());
    }

    #[test]
    fn test_converter_modules_cover_core_deps() {
        assert!(ToolConfig::CONVERTER_MODULES.contains(&"gguf"));
        assert!(ToolConfig::CONVERTER_MODULES.contains(&"torch"));
    }
}

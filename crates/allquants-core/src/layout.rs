//! On-disk layout of an AllQuants working directory.
//!
//! ```text
//! {base}/
//!   models/<org_name>/              downloaded model snapshots
//!   gguf/<org_name>.gguf            converted F16 files
//!   quantized/<org_name>-<q>.gguf   quantized variants
//!   convert.py                      converter script
//!   TEMPLATE.md                     model card template
//!   llama.cpp.bin/                  llama-quantize lives here
//! ```

use std::path::{Path, PathBuf};

use crate::config::{HubConfig, PathsConfig};
use crate::error::{AllQuantsError, Result};
use crate::naming::safe_model_name;

/// Paths of the working directories and the files derived from a model id.
#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    base_dir: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    /// Create the three working directories if they are missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.models_dir(), self.gguf_dir(), self.quantized_dir()] {
            std::fs::create_dir_all(&dir)
                .map_err(|e| AllQuantsError::io("creating working directory", &dir, e))?;
        }
        Ok(())
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn models_dir(&self) -> PathBuf {
        self.base_dir.join(PathsConfig::MODELS_DIR_NAME)
    }

    pub fn gguf_dir(&self) -> PathBuf {
        self.base_dir.join(PathsConfig::GGUF_DIR_NAME)
    }

    pub fn quantized_dir(&self) -> PathBuf {
        self.base_dir.join(PathsConfig::QUANTIZED_DIR_NAME)
    }

    pub fn llama_bin_dir(&self) -> PathBuf {
        self.base_dir.join(PathsConfig::LLAMA_BIN_DIR_NAME)
    }

    pub fn convert_script(&self) -> PathBuf {
        self.base_dir.join(PathsConfig::CONVERT_SCRIPT)
    }

    pub fn card_template(&self) -> PathBuf {
        self.base_dir.join(PathsConfig::CARD_TEMPLATE)
    }

    pub fn requirements_file(&self) -> PathBuf {
        self.base_dir.join(PathsConfig::REQUIREMENTS_FILE)
    }

    /// Directory holding the downloaded snapshot of `model_id`.
    pub fn model_dir(&self, model_id: &str) -> PathBuf {
        self.models_dir().join(safe_model_name(model_id))
    }

    /// Staging directory a download is written to before it is renamed into place.
    pub fn model_staging_dir(&self, model_id: &str) -> PathBuf {
        self.models_dir().join(format!(
            "{}.{}",
            safe_model_name(model_id),
            HubConfig::STAGING_DIR_SUFFIX
        ))
    }

    /// Converted F16 GGUF file for `model_id`.
    pub fn gguf_path(&self, model_id: &str) -> PathBuf {
        self.gguf_dir().join(format!(
            "{}.{}",
            safe_model_name(model_id),
            PathsConfig::GGUF_EXTENSION
        ))
    }

    /// Quantized output file for `model_id` and `profile`.
    pub fn quantized_path(&self, model_id: &str, profile: &str) -> PathBuf {
        self.quantized_dir().join(format!(
            "{}-{}.{}",
            safe_model_name(model_id),
            profile.to_lowercase(),
            PathsConfig::GGUF_EXTENSION
        ))
    }
}

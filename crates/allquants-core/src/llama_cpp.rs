//! llama.cpp toolchain lookup.
//!
//! AllQuants does not build llama.cpp. It expects the converter script
//! (`convert.py`) in the base directory and a prebuilt `llama-quantize` in
//! `llama.cpp.bin/`, and turns their absence into precondition errors.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::config::ToolConfig;
use crate::error::{AllQuantsError, Result};
use crate::layout::WorkspaceLayout;
use crate::platform::{self, QUANTIZE_TOOL};
use crate::process::CommandSpec;

/// The converter script, its interpreter and the quantizer binary.
#[derive(Debug, Clone)]
pub struct LlamaCppToolchain {
    layout: WorkspaceLayout,
    python: PathBuf,
}

/// Presence summary used by `setup`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolchainStatus {
    pub convert_script: PathBuf,
    pub convert_script_found: bool,
    pub bin_dir: PathBuf,
    pub bin_dir_found: bool,
    /// Located quantizer, if any.
    pub quantizer: Option<PathBuf>,
    /// Whether the located quantizer carries execute permission.
    pub quantizer_executable: bool,
    pub ready: bool,
}

impl LlamaCppToolchain {
    pub fn new(layout: WorkspaceLayout, python: impl Into<PathBuf>) -> Self {
        Self {
            layout,
            python: python.into(),
        }
    }

    pub fn python(&self) -> &Path {
        &self.python
    }

    /// Path to `convert.py`, which must exist.
    pub fn convert_script(&self) -> Result<PathBuf> {
        let script = self.layout.convert_script();
        if script.is_file() {
            Ok(script)
        } else {
            Err(AllQuantsError::FileNotFound(script))
        }
    }

    /// First quantizer candidate present in `llama.cpp.bin/`.
    pub fn quantize_binary(&self) -> Result<PathBuf> {
        let candidates = platform::executable_candidates(QUANTIZE_TOOL);
        platform::locate_executable(&self.layout.llama_bin_dir(), &candidates).map_err(
            |searched| AllQuantsError::MissingTool {
                tool: QUANTIZE_TOOL.to_string(),
                searched,
            },
        )
    }

    pub fn is_ready(&self) -> bool {
        self.convert_script().is_ok() && self.quantize_binary().is_ok()
    }

    pub fn status(&self) -> ToolchainStatus {
        let convert_script = self.layout.convert_script();
        let bin_dir = self.layout.llama_bin_dir();
        let quantizer = self.quantize_binary().ok();
        ToolchainStatus {
            convert_script_found: convert_script.is_file(),
            convert_script,
            bin_dir_found: bin_dir.is_dir(),
            bin_dir,
            ready: self.is_ready(),
            quantizer_executable: quantizer.as_deref().is_some_and(platform::is_executable),
            quantizer,
        }
    }

    /// `<python> convert.py <model_dir> --outfile <outfile> --outtype f16`, run
    /// from the base directory with streamed output.
    pub fn convert_command(&self, script: &Path, model_dir: &Path, outfile: &Path) -> CommandSpec {
        CommandSpec::new(&self.python)
            .arg(script)
            .arg(model_dir)
            .arg("--outfile")
            .arg(outfile)
            .arg("--outtype")
            .arg(ToolConfig::CONVERT_OUTTYPE)
            .current_dir(self.layout.base_dir())
            .streaming(true)
    }

    /// `<quantizer> <input> <output> <PROFILE>` with streamed output.
    pub fn quantize_command(
        &self,
        binary: &Path,
        input: &Path,
        output: &Path,
        profile: &str,
    ) -> CommandSpec {
        CommandSpec::new(binary)
            .arg(input)
            .arg(output)
            .arg(profile)
            .streaming(true)
    }
}

/// Per-tensor progress parsed from a `llama-quantize` output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorProgress<'a> {
    pub index: u32,
    pub total: u32,
    pub tensor: &'a str,
}

/// Parse lines like:
/// ```text
/// [ 123/ 456]  model.layers.5.attn_k.weight - [ 4096,  4096,     1,     1], type = f16, ...
/// ```
pub fn parse_tensor_progress(line: &str) -> Option<TensorProgress<'_>> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\[\s*(\d+)/\s*(\d+)\]\s+(\S+)").expect("valid regex"));

    let caps = re.captures(line)?;
    Some(TensorProgress {
        index: caps[1].parse().ok()?,
        total: caps[2].parse().ok()?,
        tensor: caps.get(3)?.as_str(),
    })
}

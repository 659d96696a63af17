//! Platform abstraction layer.
//!
//! All `#[cfg]` blocks for OS-specific behavior live here: executable naming,
//! user cache locations and permission checks.
//!
//! - `paths` - Platform-specific directory and file paths
//! - `permissions` - Executable bit handling

pub mod paths;
pub mod permissions;

use std::path::{Path, PathBuf};

use tracing::debug;

pub use paths::hf_token_file;
pub use permissions::is_executable;

/// Base name of the llama.cpp quantizer executable.
pub const QUANTIZE_TOOL: &str = "llama-quantize";

/// Returns the current platform name.
pub fn current_platform() -> &'static str {
    #[cfg(target_os = "linux")]
    {
        "linux"
    }
    #[cfg(target_os = "windows")]
    {
        "windows"
    }
    #[cfg(target_os = "macos")]
    {
        "macos"
    }
    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        "unknown"
    }
}

/// Returns true if the current platform is supported.
pub fn is_supported_platform() -> bool {
    cfg!(any(target_os = "linux", target_os = "windows", target_os = "macos"))
}

/// File names to probe for an executable, in preference order.
///
/// # Platform Behavior
/// - **Windows**: `{name}.exe`, then `{name}`
/// - **Linux/macOS**: `{name}`, then `{name}.exe`
pub fn executable_candidates(name: &str) -> Vec<String> {
    let exe = format!("{name}.exe");
    if cfg!(windows) {
        vec![exe, name.to_string()]
    } else {
        vec![name.to_string(), exe]
    }
}

/// Find the first candidate that exists as a file inside `dir`.
///
/// Returns the full list of probed paths on failure so callers can report
/// where they looked.
pub fn locate_executable(
    dir: &Path,
    candidates: &[String],
) -> std::result::Result<PathBuf, Vec<PathBuf>> {
    let probed: Vec<PathBuf> = candidates.iter().map(|c| dir.join(c)).collect();
    match probed.iter().find(|p| p.is_file()) {
        Some(found) => {
            debug!("Found executable: {}", found.display());
            Ok(found.clone())
        }
        None => Err(probed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_current_platform() {
        let platform = current_platform();
        assert!(["linux", "windows", "macos", "unknown"].contains(&platform));
    }

    #[test]
    fn test_candidate_order() {
        let candidates = executable_candidates(QUANTIZE_TOOL);
        assert_eq!(candidates.len(), 2);
        #[cfg(windows)]
        assert_eq!(candidates[0], "llama-quantize.exe");
        #[cfg(not(windows))]
        assert_eq!(candidates[0], "llama-quantize");
    }

    #[test]
    fn test_locate_first_match_wins() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("llama-quantize"), b"").unwrap();
        std::fs::write(temp.path().join("llama-quantize.exe"), b"").unwrap();

        let candidates = executable_candidates(QUANTIZE_TOOL);
        let found = locate_executable(temp.path(), &candidates).unwrap();
        assert_eq!(found, temp.path().join(&candidates[0]));
    }

    #[test]
    fn test_locate_falls_back_to_second_candidate() {
        let temp = TempDir::new().unwrap();
        let candidates = executable_candidates(QUANTIZE_TOOL);
        std::fs::write(temp.path().join(&candidates[1]), b"").unwrap();

        let found = locate_executable(temp.path(), &candidates).unwrap();
        assert_eq!(found, temp.path().join(&candidates[1]));
    }

    #[test]
    fn test_locate_reports_probed_paths() {
        let temp = TempDir::new().unwrap();
        let probed = locate_executable(temp.path(), &executable_candidates("missing")).unwrap_err();
        assert_eq!(probed.len(), 2);
        assert!(probed.iter().all(|p| p.starts_with(temp.path())));
    }
}

//! Platform-specific path utilities.

use std::path::PathBuf;

/// Location of the token file written by `huggingface-cli login`.
///
/// # Platform Behavior
/// - `$HF_HOME/token` when `HF_HOME` is set
/// - otherwise `{cache}/huggingface/token`, where `{cache}` is `~/.cache` on
///   every platform (the Hugging Face tooling does not use the OS cache dir)
pub fn hf_token_file() -> Option<PathBuf> {
    if let Some(hf_home) = std::env::var_os("HF_HOME").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(hf_home).join("token"));
    }
    dirs::home_dir().map(|home| home.join(".cache").join("huggingface").join("token"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_file_name() {
        if let Some(path) = hf_token_file() {
            assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("token"));
        }
    }
}

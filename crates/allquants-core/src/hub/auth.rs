//! Hub access token resolution.

use std::fmt;
use std::path::Path;

use crate::config::HubConfig;
use crate::platform::hf_token_file;

/// Where a token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// Passed explicitly (`--token`).
    Explicit,
    /// `HF_TOKEN` environment variable.
    EnvVar,
    /// File written by `huggingface-cli login`.
    HfCache,
}

impl fmt::Display for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TokenSource::Explicit => "command line",
            TokenSource::EnvVar => "HF_TOKEN",
            TokenSource::HfCache => "huggingface-cli cache",
        })
    }
}

/// Resolve a token.
///
/// Checks in order:
/// 1. The explicit value
/// 2. `HF_TOKEN` environment variable
/// 3. HuggingFace CLI cache (`~/.cache/huggingface/token`)
pub fn resolve_token(explicit: Option<&str>) -> Option<(String, TokenSource)> {
    if let Some(token) = explicit.and_then(clean) {
        return Some((token, TokenSource::Explicit));
    }

    if let Some(token) = std::env::var(HubConfig::TOKEN_ENV_VAR)
        .ok()
        .as_deref()
        .and_then(clean)
    {
        return Some((token, TokenSource::EnvVar));
    }

    hf_token_file()
        .and_then(|path| read_token_file(&path))
        .map(|token| (token, TokenSource::HfCache))
}

fn read_token_file(path: &Path) -> Option<String> {
    std::fs::read_to_string(path).ok().as_deref().and_then(clean)
}

fn clean(token: &str) -> Option<String> {
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

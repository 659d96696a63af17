//! Model identifier validation and derived names.
//!
//! Hub model ids have the form `organization/model-name`. Local file and
//! directory names replace the `/` with `_`; uploaded repositories use only
//! the part after the last `/`.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{AllQuantsError, Result};

fn model_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+/[A-Za-z0-9._-]+$").expect("valid regex"))
}

fn profile_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid regex"))
}

/// Reject quantization type names that cannot be used in an output file name.
pub fn validate_profile_name(profile: &str) -> Result<()> {
    if profile_name_regex().is_match(profile) {
        Ok(())
    } else {
        Err(AllQuantsError::validation(
            "profile",
            format!("'{profile}' is not a valid quantization type name"),
        ))
    }
}

/// Reject ids that are not `organization/model-name`.
pub fn validate_model_id(model_id: &str) -> Result<()> {
    if model_id.is_empty() || !model_id.contains('/') {
        return Err(AllQuantsError::validation(
            "model_id",
            "Model name must be in format 'organization/model-name'",
        ));
    }
    if !model_id_regex().is_match(model_id) {
        return Err(AllQuantsError::validation(
            "model_id",
            format!("'{model_id}' contains characters not allowed in a model id"),
        ));
    }
    if model_id.split('/').any(|part| part == "." || part == "..") {
        return Err(AllQuantsError::validation(
            "model_id",
            format!("'{model_id}' is not a valid model id"),
        ));
    }
    Ok(())
}

/// File-system safe form of a model id: `org/name` becomes `org_name`.
pub fn safe_model_name(model_id: &str) -> String {
    model_id.replace('/', "_")
}

/// The model name without its namespace: `org/name` becomes `name`.
pub fn short_model_name(model_id: &str) -> &str {
    model_id.rsplit('/').next().unwrap_or(model_id)
}

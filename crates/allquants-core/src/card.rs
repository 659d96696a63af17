//! Model card generation.
//!
//! The card uploaded as `README.md` is rendered from `TEMPLATE.md` in the
//! base directory. Two placeholders are substituted everywhere they occur:
//!
//! | Placeholder               | Replaced with                      |
//! |---------------------------|------------------------------------|
//! | `{{base_model}}`          | short name (`DialoGPT-medium`)     |
//! | `{{base_model_w_author}}` | full id (`microsoft/DialoGPT-medium`) |

use std::path::Path;

use crate::error::{AllQuantsError, Result};
use crate::naming::short_model_name;

pub const BASE_MODEL_PLACEHOLDER: &str = "{{base_model}}";
pub const BASE_MODEL_WITH_AUTHOR_PLACEHOLDER: &str = "{{base_model_w_author}}";

/// Substitute both placeholders in `template`.
pub fn render_card(template: &str, model_id: &str) -> String {
    template
        .replace(BASE_MODEL_PLACEHOLDER, short_model_name(model_id))
        .replace(BASE_MODEL_WITH_AUTHOR_PLACEHOLDER, model_id)
}

/// Read the template at `template_path` and render it for `model_id`.
pub fn generate_card(template_path: &Path, model_id: &str) -> Result<String> {
    if !template_path.is_file() {
        return Err(AllQuantsError::TemplateNotFound(template_path.to_path_buf()));
    }
    let template = std::fs::read_to_string(template_path)
        .map_err(|e| AllQuantsError::io("reading model card template", template_path, e))?;
    Ok(render_card(&template, model_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TEMPLATE: &str = "# {{base_model}}-GGUF\n\nQuantized from [{{base_model_w_author}}](https://huggingface.co/{{base_model_w_author}}).\nUse {{base_model}} with llama.cpp.\n";

    #[test]
    fn test_render_namespaced_id() {
        let card = render_card(TEMPLATE, "microsoft/DialoGPT-medium");
        assert!(card.starts_with("# DialoGPT-medium-GGUF"));
        assert!(card.contains("https://huggingface.co/microsoft/DialoGPT-medium"));
        assert!(card.contains("Use DialoGPT-medium with"));
        assert!(!card.contains(BASE_MODEL_PLACEHOLDER));
        assert!(!card.contains(BASE_MODEL_WITH_AUTHOR_PLACEHOLDER));
    }

    #[test]
    fn test_render_bare_id() {
        let card = render_card(TEMPLATE, "tiny-model");
        assert!(card.starts_with("# tiny-model-GGUF"));
        assert!(!card.contains("{{"));
    }

    #[test]
    fn test_missing_template() {
        let temp = TempDir::new().unwrap();
        let err = generate_card(&temp.path().join("TEMPLATE.md"), "org/m").unwrap_err();
        assert!(matches!(err, AllQuantsError::TemplateNotFound(_)));
    }

    #[test]
    fn test_generate_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("TEMPLATE.md");
        std::fs::write(&path, TEMPLATE).unwrap();

        let card = generate_card(&path, "org/small-model").unwrap();
        assert!(card.contains("[org/small-model]"));
    }
}

use std::path::Path;
use std::process::ExitCode;

use allquants_core::naming::validate_model_id;
use allquants_core::AllQuantsError;

use super::Context;
use crate::display::print_success;

/// `allquants convert <local-path> <model-id>`
pub async fn run(ctx: &Context, model_path: &Path, model_id: &str) -> anyhow::Result<ExitCode> {
    if !model_path.exists() {
        return Err(AllQuantsError::FileNotFound(model_path.to_path_buf()).into());
    }
    validate_model_id(model_id)?;

    let (config, _) = ctx.config(None);
    let quantizer = ctx.quantizer(config)?;

    let gguf = quantizer.convert(model_path, model_id).await?;
    print_success(&format!("GGUF file created: {}", gguf.display()));
    Ok(ExitCode::SUCCESS)
}

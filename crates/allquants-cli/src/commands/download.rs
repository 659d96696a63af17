use std::process::ExitCode;

use allquants_core::naming::validate_model_id;

use super::Context;
use crate::display::print_success;

/// `allquants download <model-id>`
pub async fn run(ctx: &Context, model_id: &str, token: Option<&str>) -> anyhow::Result<ExitCode> {
    validate_model_id(model_id)?;
    let (config, _) = ctx.config(token);
    let quantizer = ctx.quantizer(config)?;

    let path = quantizer.download(model_id).await?;
    print_success(&format!("Model downloaded to: {}", path.display()));
    Ok(ExitCode::SUCCESS)
}

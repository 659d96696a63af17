use std::process::ExitCode;

use crate::display::print_profile_table;

/// `allquants types`
pub fn run() -> anyhow::Result<ExitCode> {
    print_profile_table(allquants_core::profiles())?;
    Ok(ExitCode::SUCCESS)
}

//! Terminal rendering.

mod printer;
mod progress;
mod table;

pub use printer::{print_error, print_panel, print_success, print_warning};
pub use progress::TerminalReporter;
pub use table::print_profile_table;

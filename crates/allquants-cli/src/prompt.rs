//! Confirmation gates backed by dialoguer.

use std::io;

use allquants_core::{AllQuantsError, Confirmer, Step};
use dialoguer::Confirm;

/// Asks on the terminal, defaulting to yes.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConfirmer;

impl Confirmer for TerminalConfirmer {
    fn confirm(&self, _step: Step, prompt: &str) -> allquants_core::Result<bool> {
        ask(prompt)
    }
}

/// Ask a yes/no question. Ctrl+C at the prompt becomes [`AllQuantsError::Cancelled`].
pub fn ask(prompt: &str) -> allquants_core::Result<bool> {
    Confirm::new()
        .with_prompt(prompt)
        .default(true)
        .interact()
        .map_err(map_prompt_error)
}

fn map_prompt_error(err: dialoguer::Error) -> AllQuantsError {
    match err {
        dialoguer::Error::IO(e) if e.kind() == io::ErrorKind::Interrupted => {
            AllQuantsError::Cancelled
        }
        other => AllQuantsError::Prompt(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_maps_to_cancelled() {
        let err = dialoguer::Error::IO(io::Error::new(io::ErrorKind::Interrupted, "read interrupted"));
        assert!(map_prompt_error(err).is_cancellation());

        let err = dialoguer::Error::IO(io::Error::new(io::ErrorKind::NotFound, "not a terminal"));
        assert!(matches!(map_prompt_error(err), AllQuantsError::Prompt(_)));
    }
}

//! Cancellation token for cooperative interruption.
//!
//! The CLI cancels the token from its Ctrl+C listener. The workflow checks it
//! between steps, and the process runner and the hub download loop check it
//! while streaming so a long subprocess or transfer stops promptly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::AllQuantsError;

/// How often [`CancellationToken::cancelled`] re-checks the flag.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A cancellation token shared between the signal handler and running work.
///
/// Clones share state: cancelling any clone cancels all of them.
///
/// # Example
///
/// ```
/// use allquants_core::cancel::CancellationToken;
///
/// let token = CancellationToken::new();
/// let watcher = token.clone();
///
/// token.cancel();
/// assert!(watcher.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new cancellation token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Return `Err(AllQuantsError::Cancelled)` if cancellation was requested.
    pub fn check(&self) -> Result<(), AllQuantsError> {
        if self.is_cancelled() {
            Err(AllQuantsError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolve once cancellation has been requested.
    ///
    /// Intended as a `tokio::select!` branch next to a subprocess or
    /// transfer future.
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

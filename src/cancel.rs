//! Cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::errors::ReconcileError;

/// Cancellation flag checked at loop boundaries.
///
/// Clones share one flag, so a handle given to a signal handler or another
/// thread stops a run in progress. Processing loops check it per query and
/// per window; a cancelled run flushes what it has written before returning.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Turn a requested cancellation into an error naming the boundary
    /// where it was observed.
    pub fn checkpoint(&self, boundary: &str) -> Result<(), ReconcileError> {
        if self.is_cancelled() {
            return Err(ReconcileError::Cancelled(boundary.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let handle = token.clone();
        assert!(token.checkpoint("chunk").is_ok());
        handle.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(
            token.checkpoint("chunk"),
            Err(ReconcileError::Cancelled(_))
        ));
    }
}

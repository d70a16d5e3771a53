// src/cancellation.rs

//! Cooperative cancellation
//!
//! A `CancellationToken` is a shared flag. Long-running loops call
//! [`CancellationToken::check`] at every iteration boundary (per downloaded
//! chunk, per archive entry, per placed file) and unwind with
//! [`Error::Cancelled`] once cancellation has been requested.

use crate::error::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag, cheap to clone across threads
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that has not been cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; every clone observes it
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Check if cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Return Cancelled error if cancellation requested
    pub fn check(&self, operation: &str) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled(operation.to_string()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(token.check("download").is_ok());

        other.cancel();
        assert!(token.is_cancelled());
        let err = token.check("download").unwrap_err();
        assert!(err.is_cancelled());
    }
}

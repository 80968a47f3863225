//! Cooperative cancellation
//!
//! A `StopSource` owns a cancellation flag; `StopToken`s observe it.
//! Cancellation is cooperative: a task checks the token at points of its
//! own choosing (the batch driver checks between chunks, never
//! mid-kernel).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{ComputeError, Result};

/// Owner side of a cancellation request.
#[derive(Debug, Default)]
pub struct StopSource {
    flag: Arc<AtomicBool>,
}

impl StopSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token observing this source.
    pub fn token(&self) -> StopToken {
        StopToken {
            flag: Some(Arc::clone(&self.flag)),
        }
    }

    /// Request cancellation of all tasks holding tokens from this source.
    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

/// Observer side of a cancellation request.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    flag: Option<Arc<AtomicBool>>,
}

impl StopToken {
    /// A token that can never be cancelled.
    pub fn unstoppable() -> Self {
        Self { flag: None }
    }

    pub fn is_stop_requested(&self) -> bool {
        self.flag
            .as_ref()
            .map(|f| f.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Error out if cancellation has been requested.
    pub fn check(&self) -> Result<()> {
        if self.is_stop_requested() {
            Err(ComputeError::Cancelled("Operation cancelled".into()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_token() {
        let source = StopSource::new();
        let token = source.token();
        assert!(!token.is_stop_requested());
        assert!(token.check().is_ok());

        source.request_stop();
        assert!(token.is_stop_requested());
        assert!(token.check().is_err());

        assert!(!StopToken::unstoppable().is_stop_requested());
    }
}

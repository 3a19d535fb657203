//! Cooperative cancellation and progress reporting.
//!
//! Stages receive these by reference; the core never spawns threads of its
//! own, it only checks the flag between units of work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

// ============================================================================
// CancelToken
// ============================================================================

/// Shared cancellation flag. Cloning is cheap; all clones observe the same
/// flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once `cancel` has been called.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Returns `Err(Cancelled)` once `cancel` has been called. Stages call
    /// this between glyphs and between kern pairs.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

// ============================================================================
// ProgressSink
// ============================================================================

/// Receives stage progress. Implementations must be cheap; the pipeline
/// calls this from its hot loops.
pub trait ProgressSink {
    /// `done` out of `total` units finished in the named stage.
    fn progress(&self, stage: &str, done: usize, total: usize);
}

/// A sink that discards all progress events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn progress(&self, _stage: &str, _done: usize, _total: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_cancel_token_observed_by_clone() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(token.check().is_ok());
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_progress_sink_receives_events() {
        struct Recorder(Mutex<Vec<(String, usize, usize)>>);
        impl ProgressSink for Recorder {
            fn progress(&self, stage: &str, done: usize, total: usize) {
                self.0.lock().unwrap().push((stage.into(), done, total));
            }
        }

        let rec = Recorder(Mutex::new(Vec::new()));
        rec.progress("vectorize", 1, 26);
        rec.progress("vectorize", 2, 26);
        let events = rec.0.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], ("vectorize".into(), 1, 26));
    }
}

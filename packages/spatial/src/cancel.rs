//! Cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::SpatialError;

/// A cancellation flag shared between a caller and a running operation,
/// with an optional deadline.
///
/// Clones share the same flag. Operations poll [`CancelToken::check`] at
/// stage boundaries and inside per-item loops.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that is only cancelled explicitly.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also expires `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A token that also expires at `deadline`.
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested or the deadline has passed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Returns [`SpatialError::Cancelled`] once the token is cancelled.
    ///
    /// # Errors
    ///
    /// * If cancellation was requested or the deadline has passed
    pub fn check(&self) -> Result<(), SpatialError> {
        if self.is_cancelled() {
            Err(SpatialError::Cancelled)
        } else {
            Ok(())
        }
    }
}

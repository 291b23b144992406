//! Cooperative cancellation token.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag observed by cooperative tasks.
///
/// Cloning is cheap; all clones observe the same flag. Cancellation is
/// sticky — once set it never resets for the lifetime of the token family.
#[derive(Clone, Default, Debug)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a fresh, un-canceled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cancellation flag.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns whether cancellation was requested.
    #[inline]
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Returns `Err(Canceled)` if cancellation was requested.
    ///
    /// Convenience for `?`-style early exit inside cooperative loops.
    pub fn check(&self) -> crate::errors::Result<()> {
        if self.is_canceled() {
            Err(crate::errors::EngineError::Canceled)
        } else {
            Ok(())
        }
    }
}

//! Cooperative cancellation for raster renders

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

#[derive(Debug, Default)]
struct TokenState {
    cancelled: AtomicBool,
    finished: Mutex<bool>,
    finished_cv: Condvar,
}

/// Flag plus waiter shared between the controller and one raster render.
///
/// The render polls [`is_cancelled`](Self::is_cancelled) at safe checkpoints
/// and signals [`finish`](Self::finish) when it stops, whether it completed
/// or aborted. [`wait`](Self::wait) blocks until that has happened.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    state: Arc<TokenState>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the render to stop. Returns immediately.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }

    /// Mark the owning render as done. Idempotent.
    pub fn finish(&self) {
        let mut finished = self
            .state
            .finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *finished = true;
        self.state.finished_cv.notify_all();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        *self
            .state
            .finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the owning render has finished
    pub fn wait(&self) {
        let mut finished = self
            .state
            .finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while !*finished {
            finished = self
                .state
                .finished_cv
                .wait(finished)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Cancel and wait in one go
    pub fn cancel_and_wait(&self) {
        self.cancel();
        self.wait();
    }

    /// Guard that finishes the token when dropped, including on unwind
    #[must_use]
    pub fn finish_guard(&self) -> FinishGuard {
        FinishGuard {
            token: self.clone(),
        }
    }
}

/// Finishes its token on drop
#[derive(Debug)]
pub struct FinishGuard {
    token: CancellationToken,
}

impl FinishGuard {
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.token.finish();
    }
}

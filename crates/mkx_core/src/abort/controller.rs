//! Two-scope cancellation signal shared by the queue and the engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Cancellation scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortScope {
    /// Stop the in-flight job after its current unit.
    Current,
    /// Stop the in-flight job and start no further jobs.
    All,
}

#[derive(Debug, Default)]
struct AbortState {
    current: AtomicBool,
    all: AtomicBool,
    /// Guards `wakeup` waits for abort-all.
    lock: Mutex<()>,
    wakeup: Condvar,
}

/// Cancellation handle with an "abort current" and an "abort all" scope.
///
/// Signals are level-triggered: raising is idempotent and a check made
/// any time after raising reports the signal until it is reset. Clones
/// share the same state.
#[derive(Debug, Clone, Default)]
pub struct AbortController {
    state: Arc<AbortState>,
}

impl AbortController {
    /// Create a controller with both signals lowered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the in-flight job to stop after its current unit.
    pub fn abort_current(&self) {
        self.state.current.store(true, Ordering::SeqCst);
    }

    /// Stop the in-flight job and every job still waiting.
    pub fn abort_all(&self) {
        self.state.current.store(true, Ordering::SeqCst);
        let _guard = self.state.lock.lock();
        self.state.all.store(true, Ordering::SeqCst);
        self.state.wakeup.notify_all();
    }

    /// Raise the signal for the given scope.
    pub fn raise(&self, scope: AbortScope) {
        match scope {
            AbortScope::Current => self.abort_current(),
            AbortScope::All => self.abort_all(),
        }
    }

    /// Whether the in-flight job should stop. Also true once abort-all
    /// was raised.
    pub fn is_current_raised(&self) -> bool {
        self.state.current.load(Ordering::SeqCst) || self.is_all_raised()
    }

    /// Whether the whole run should stop.
    pub fn is_all_raised(&self) -> bool {
        self.state.all.load(Ordering::SeqCst)
    }

    /// Lower the abort-current signal. Called when a new job starts.
    pub fn reset_current(&self) {
        self.state.current.store(false, Ordering::SeqCst);
    }

    /// Lower both signals. Called when a new run starts.
    pub fn reset_all(&self) {
        let _guard = self.state.lock.lock();
        self.state.all.store(false, Ordering::SeqCst);
        self.state.current.store(false, Ordering::SeqCst);
    }

    /// Block until abort-all is raised or the timeout elapses.
    ///
    /// Returns true if abort-all is raised.
    pub fn wait_for_abort_all(&self, timeout: Duration) -> bool {
        let mut guard = self.state.lock.lock();
        if self.is_all_raised() {
            return true;
        }
        let _ = self.state.wakeup.wait_for(&mut guard, timeout);
        self.is_all_raised()
    }

    /// Wake every thread blocked in [`Self::wait_for_abort_all`] without
    /// raising a signal.
    pub fn notify_waiters(&self) {
        let _guard = self.state.lock.lock();
        self.state.wakeup.notify_all();
    }
}

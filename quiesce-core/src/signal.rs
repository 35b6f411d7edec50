//! One-shot completion signalling between workers and observers.

use std::{
    sync::{
        Condvar, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

/// A one-shot "work finished" signal.
///
/// Firing is idempotent: only the first call changes state, later calls are
/// absorbed and report `false`. Observers may block on the signal or consume
/// it exactly once via [`CompletionSignal::observe`].
///
/// # Examples
/// ```
/// use quiesce_core::CompletionSignal;
///
/// let signal = CompletionSignal::default();
/// assert!(signal.fire());
/// assert!(!signal.fire());
/// assert!(signal.observe());
/// assert!(!signal.observe());
/// ```
#[derive(Debug, Default)]
pub struct CompletionSignal {
    fired: Mutex<bool>,
    changed: Condvar,
    observed: AtomicBool,
}

impl CompletionSignal {
    /// Fires the signal and wakes every waiter.
    ///
    /// Returns `true` for the call that fired the signal and `false` for any
    /// repeat attempt.
    pub fn fire(&self) -> bool {
        // The guarded value is a plain flag, so a poisoned lock still holds a
        // usable value.
        let mut fired = self.fired.lock().unwrap_or_else(PoisonError::into_inner);
        if *fired {
            return false;
        }
        *fired = true;
        self.changed.notify_all();
        true
    }

    /// Returns `true` once the signal has fired.
    #[must_use]
    pub fn is_fired(&self) -> bool {
        *self.fired.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until the signal fires or `timeout` elapses.
    ///
    /// Returns whether the signal had fired when the wait ended.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let fired = self.fired.lock().unwrap_or_else(PoisonError::into_inner);
        let (fired, _) = self
            .changed
            .wait_timeout_while(fired, timeout, |fired| !*fired)
            .unwrap_or_else(PoisonError::into_inner);
        *fired
    }

    /// Consumes the fired signal.
    ///
    /// Returns `true` to exactly one caller after the signal fires; every
    /// other call, including calls made before firing, returns `false`.
    #[must_use]
    pub fn observe(&self) -> bool {
        self.is_fired() && !self.observed.swap(true, Ordering::AcqRel)
    }
}

/// Generation counter that wakes the detector whenever node state changes.
///
/// Writers call [`Progress::bump`] after releasing the node lock they
/// mutated; the detector records the generation before a scan and sleeps
/// until it moves.
#[derive(Debug, Default)]
pub struct Progress {
    generation: Mutex<u64>,
    changed: Condvar,
}

impl Progress {
    /// Advances the generation and wakes all waiters.
    pub fn bump(&self) {
        let mut generation = self
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *generation = generation.wrapping_add(1);
        self.changed.notify_all();
    }

    /// Returns the current generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        *self
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits until the generation differs from `seen` or `timeout` elapses,
    /// returning the generation observed on wake.
    pub fn wait_past(&self, seen: u64, timeout: Duration) -> u64 {
        let generation = self
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (generation, _) = self
            .changed
            .wait_timeout_while(generation, timeout, |current| *current == seen)
            .unwrap_or_else(PoisonError::into_inner);
        *generation
    }
}

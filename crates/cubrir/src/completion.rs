//! Completion tracking for deferred report writes.
//!
//! An unknown, dynamically-growing number of render operations run after the
//! test run completes. The tracker counts them and fires a single idle
//! callback once all have finished, including the case where everything
//! finishes before the callback is registered: completion is latched so a
//! late registration fires immediately instead of waiting forever.
//!
//! Implemented as explicit state behind a mutex (pending count, done flag,
//! optional callback) rather than on top of an async-primitive library. The
//! mutex gives the increment/decrement/check path the atomicity a
//! multi-threaded runtime requires.

use std::sync::{Arc, Mutex, PoisonError};

type IdleCallback = Box<dyn FnOnce() + Send>;
type DrainHook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct State {
    pending: usize,
    done: bool,
    callback: Option<IdleCallback>,
    drain_hook: Option<DrainHook>,
}

/// Tracks in-flight write operations and signals idleness exactly once
#[derive(Clone, Default)]
pub struct CompletionTracker {
    inner: Arc<Mutex<State>>,
}

impl std::fmt::Debug for CompletionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionTracker")
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

/// Token for one scheduled write; consumed on completion so a single write
/// cannot be counted twice
#[derive(Debug)]
pub struct WriteToken {
    tracker: CompletionTracker,
}

impl WriteToken {
    /// Report the write as finished, successful or not.
    ///
    /// When this was the last pending write, the drain hook runs first, then
    /// the idle callback (if registered) fires; otherwise completion is
    /// latched for a later registration.
    pub fn complete(self) {
        self.tracker.complete_one();
    }
}

impl CompletionTracker {
    /// Create an idle tracker with nothing pending
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of writes currently in flight
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock().pending
    }

    /// Whether nothing is pending
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.lock().pending == 0
    }

    /// Register a write and receive its completion token
    #[must_use]
    pub fn schedule(&self) -> WriteToken {
        let mut state = self.lock();
        state.pending += 1;
        state.done = false;
        WriteToken {
            tracker: self.clone(),
        }
    }

    /// Install the action run when the pending count reaches zero, before
    /// the idle callback. Used for accumulator disposal.
    pub fn set_drain_hook(&self, hook: impl FnOnce() + Send + 'static) {
        self.lock().drain_hook = Some(Box::new(hook));
    }

    /// Register the idle callback.
    ///
    /// Fires immediately when nothing is pending (including when completion
    /// already latched done); otherwise it fires exactly once when the last
    /// pending write completes. A new registration replaces any previous
    /// unfired one.
    pub fn on_idle(&self, callback: impl FnOnce() + Send + 'static) {
        let callback: IdleCallback = Box::new(callback);
        {
            let mut state = self.lock();
            if state.pending != 0 {
                state.callback = Some(callback);
                return;
            }
        }
        callback();
    }

    fn complete_one(&self) {
        let (drain_hook, callback) = {
            let mut state = self.lock();
            state.pending = state.pending.saturating_sub(1);
            if state.pending != 0 {
                return;
            }
            state.done = true;
            (state.drain_hook.take(), state.callback.take())
        };
        // Callbacks run outside the lock: the drain hook takes other locks.
        if let Some(hook) = drain_hook {
            hook();
        }
        if let Some(callback) = callback {
            callback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let clone = Arc::clone(&count);
        (count, move || {
            let _ = clone.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn idle_callback_fires_when_last_write_completes() {
        let tracker = CompletionTracker::new();
        let t1 = tracker.schedule();
        let t2 = tracker.schedule();

        let (fired, callback) = counter();
        tracker.on_idle(callback);

        t1.complete();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        t2.complete();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn finish_then_register_fires_immediately_once() {
        let tracker = CompletionTracker::new();
        let t1 = tracker.schedule();
        let t2 = tracker.schedule();
        t1.complete();
        t2.complete();

        let (fired, callback) = counter();
        tracker.on_idle(callback);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_fires_immediately_when_nothing_was_ever_scheduled() {
        let tracker = CompletionTracker::new();
        let (fired, callback) = counter();
        tracker.on_idle(callback);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drain_hook_runs_before_idle_callback() {
        let tracker = CompletionTracker::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let hook_order = Arc::clone(&order);
        tracker.set_drain_hook(move || hook_order.lock().unwrap().push("drain"));

        let cb_order = Arc::clone(&order);
        let token = tracker.schedule();
        tracker.on_idle(move || cb_order.lock().unwrap().push("idle"));
        token.complete();

        assert_eq!(*order.lock().unwrap(), vec!["drain", "idle"]);
    }

    #[test]
    fn pending_count_tracks_schedule_and_complete() {
        let tracker = CompletionTracker::new();
        assert!(tracker.is_idle());
        let token = tracker.schedule();
        assert_eq!(tracker.pending(), 1);
        token.complete();
        assert!(tracker.is_idle());
    }
}

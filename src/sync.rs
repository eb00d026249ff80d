//! State shared between the main loop, the adapter's receiver thread and the signal thread.

use std::{
    sync::{Arc, Condvar, Mutex, MutexGuard},
    time::Duration,
};

/// A boolean guarded by a mutex, with a condvar to wait on it.
#[derive(Debug, Default)]
struct Flag {
    value: Mutex<bool>,
    changed: Condvar,
}

impl Flag {
    fn new(value: bool) -> Self {
        Self {
            value: Mutex::new(value),
            changed: Condvar::new(),
        }
    }
    // a panic while holding the lock leaves a plain bool behind, nothing to repair
    fn lock(&self) -> MutexGuard<'_, bool> {
        self.value.lock().unwrap_or_else(|e| e.into_inner())
    }
    fn store(&self, value: bool) {
        *self.lock() = value;
        self.changed.notify_all();
    }
}

/// One-way latch from running to stopping.
#[derive(Debug, Clone)]
pub struct KeepGoing(Arc<Flag>);

impl KeepGoing {
    pub fn new() -> Self {
        Self(Arc::new(Flag::new(true)))
    }
    pub fn get(&self) -> bool {
        *self.0.lock()
    }
    /// Latch to stopping. There is no way back.
    pub fn stop(&self) {
        self.0.store(false);
    }
    /// Sleep for `duration`, or less if [KeepGoing::stop] is called meanwhile.
    ///
    /// Returns [KeepGoing::get].
    pub fn pause(&self, duration: Duration) -> bool {
        let guard = self.0.lock();
        let (guard, _) = self
            .0
            .changed
            .wait_timeout_while(guard, duration, |running| *running)
            .unwrap_or_else(|e| e.into_inner());
        *guard
    }
}

impl Default for KeepGoing {
    fn default() -> Self {
        Self::new()
    }
}

/// Edge triggered "the TV said something" flag.
///
/// Set from the adapter's receiver thread, consumed by the single waiter.
/// A set that happens before the wait is not lost.
#[derive(Debug, Clone, Default)]
pub struct TvActivity(Arc<Flag>);

impl TvActivity {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set(&self) {
        self.0.store(true);
    }
    pub fn clear(&self) {
        *self.0.lock() = false;
    }
    pub fn is_set(&self) -> bool {
        *self.0.lock()
    }
    /// Block until the flag is set, then clear it.
    pub fn wait(&self) {
        let guard = self.0.lock();
        let mut guard = self
            .0
            .changed
            .wait_while(guard, |set| !*set)
            .unwrap_or_else(|e| e.into_inner());
        *guard = false;
    }
}

/// Everything the state machine shares, passed by reference into each step.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub keep_going: KeepGoing,
    pub tv_activity: TvActivity,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }
    #[inline]
    pub fn go(&self) -> bool {
        self.keep_going.get()
    }
    /// Stop and wake a waiting power-on detector so it notices.
    pub fn shutdown(&self) {
        self.keep_going.stop();
        self.tv_activity.set();
    }
    /// A handle other threads can use to stop the daemon
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.clone())
    }
}

/// Requests a clean stop from another thread (e.g. on SIGTERM).
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Context);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.shutdown()
    }
}

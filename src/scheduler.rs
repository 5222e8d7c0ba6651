/// Timing primitives for the serial run loop
///
/// Acquisition polls and capture ticks are driven by `Ticker`s that the
/// session checks against a `Clock`. Nothing here spawns threads or touches
/// a platform timer API, so tests can drive everything with
/// `SimulatedClock`.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Time source and sleeper for the run loop
pub trait Clock {
    fn now(&self) -> Instant;

    /// Suspend until `deadline` or until `shutdown` is triggered.
    ///
    /// Returns `true` if shutdown interrupted the wait.
    fn sleep_until(&self, deadline: Instant, shutdown: &ShutdownSignal) -> bool;
}

/// Wall clock backed by `Instant::now()`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep_until(&self, deadline: Instant, shutdown: &ShutdownSignal) -> bool {
        let now = Instant::now();
        if deadline <= now {
            return shutdown.is_shutdown();
        }
        shutdown.wait(deadline - now)
    }
}

/// Manually advanced clock for tests and offline replays.
///
/// Clones share the same time, so a test can keep one handle and give
/// another to the session. Sleeping jumps straight to the deadline.
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    now: Arc<Mutex<Instant>>,
}

impl SimulatedClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    pub fn set(&self, to: Instant) {
        let mut now = self.now.lock();
        if to > *now {
            *now = to;
        }
    }
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }

    fn sleep_until(&self, deadline: Instant, shutdown: &ShutdownSignal) -> bool {
        if shutdown.is_shutdown() {
            return true;
        }
        self.set(deadline);
        false
    }
}

/// Periodic timer with an explicit, idempotent cancel.
///
/// The first beat is one cadence after `start`. A ticker fires at most once
/// per `fire_if_due` call; if the loop fell behind, missed beats are dropped
/// and the next beat is scheduled one cadence from now.
#[derive(Debug, Clone)]
pub struct Ticker {
    cadence: Duration,
    next_due: Option<Instant>,
}

impl Ticker {
    pub fn new(cadence: Duration) -> Self {
        Self {
            cadence,
            next_due: None,
        }
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    /// (Re)start the ticker, replacing any pending beat
    pub fn start(&mut self, now: Instant) {
        self.next_due = Some(now + self.cadence);
    }

    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    pub fn is_active(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    /// Consume the pending beat if it is due at `now`
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if due <= now => {
                let next = due + self.cadence;
                self.next_due = Some(if next <= now { now + self.cadence } else { next });
                true
            }
            _ => false,
        }
    }
}

/// A shutdown signal that supports interruptible waits.
///
/// Unlike `thread::sleep()`, waits on this signal can be interrupted
/// immediately when shutdown is triggered.
pub struct ShutdownSignal {
    shutdown: AtomicBool,
    condvar: Condvar,
    mutex: Mutex<()>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            shutdown: AtomicBool::new(false),
            condvar: Condvar::new(),
            mutex: Mutex::new(()),
        }
    }

    /// Trigger the shutdown signal, waking all waiting threads.
    pub fn trigger(&self) {
        let _guard = self.mutex.lock();
        self.shutdown.store(true, Ordering::SeqCst);
        self.condvar.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Wait for the specified duration or until shutdown is triggered.
    ///
    /// Returns `true` if shutdown was triggered, `false` if the wait completed normally.
    pub fn wait(&self, duration: Duration) -> bool {
        let mut guard = self.mutex.lock();
        if self.is_shutdown() {
            return true;
        }
        self.condvar
            .wait_while_for(&mut guard, |_| !self.is_shutdown(), duration);
        self.is_shutdown()
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Perception session
///
/// Owns the acquisition state machine and the capture scheduler and drives
/// both from one serial loop. Capture starts as soon as the window is
/// acquired; polls and ticks never overlap.
use std::time::Instant;

use crate::capture::{WindowCapturer, WindowEnumerator};
use crate::detection::{CaptureScheduler, PatchClassifier, TickOutcome};
use crate::scheduler::{Clock, ShutdownSignal};
use crate::state::{AcquisitionOutcome, AcquisitionState, AcquisitionStateMachine};

/// Why `run` returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExit {
    /// The shutdown signal was triggered
    Shutdown,
    /// Acquisition timed out and no restart was requested
    AcquisitionFailed,
    /// Nothing is scheduled (session stopped or never started)
    Idle,
}

/// Work done by a single `step`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    pub acquisition: Option<AcquisitionOutcome>,
    pub tick: Option<TickOutcome>,
}

pub struct PerceptionSession<E, C, K, T> {
    acquisition: AcquisitionStateMachine<E>,
    capture: CaptureScheduler<C, K>,
    clock: T,
    restart_on_timeout: bool,
}

impl<E, C, K, T> PerceptionSession<E, C, K, T>
where
    E: WindowEnumerator,
    C: WindowCapturer,
    K: PatchClassifier,
    T: Clock,
{
    pub fn new(acquisition: AcquisitionStateMachine<E>, capture: CaptureScheduler<C, K>, clock: T) -> Self {
        Self {
            acquisition,
            capture,
            clock,
            restart_on_timeout: false,
        }
    }

    /// Start a new acquisition attempt whenever one times out
    pub fn with_restart_on_timeout(mut self, restart: bool) -> Self {
        self.restart_on_timeout = restart;
        self
    }

    /// Begin acquiring. Any running capture is stopped first.
    pub fn start(&mut self) {
        self.capture.stop_capture();
        self.acquisition.start(self.clock.now());
    }

    /// Stop acquisition and capture. Idempotent.
    pub fn stop(&mut self) {
        self.acquisition.stop();
        self.capture.stop_capture();
    }

    pub fn state(&self) -> &AcquisitionState {
        self.acquisition.state()
    }

    pub fn acquisition(&self) -> &AcquisitionStateMachine<E> {
        &self.acquisition
    }

    pub fn capture(&self) -> &CaptureScheduler<C, K> {
        &self.capture
    }

    pub fn clock(&self) -> &T {
        &self.clock
    }

    /// Earliest pending deadline across acquisition and capture
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.acquisition.next_deadline(), self.capture.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Dispatch whatever is due at the clock's current time
    pub fn step(&mut self) -> StepReport {
        let now = self.clock.now();
        let acquisition = self.acquisition.poll(now);

        match &acquisition {
            Some(AcquisitionOutcome::Acquired(_)) => {
                self.capture.start_capture(self.acquisition.state(), now);
            }
            Some(AcquisitionOutcome::TimedOut) if self.restart_on_timeout => {
                tracing::info!("Restarting window acquisition after timeout");
                self.acquisition.start(now);
            }
            _ => {}
        }

        let tick = self.capture.poll(now);
        StepReport { acquisition, tick }
    }

    /// Run until shutdown, an unrecovered acquisition timeout, or until
    /// nothing is left to schedule.
    pub fn run(&mut self, shutdown: &ShutdownSignal) -> SessionExit {
        loop {
            if shutdown.is_shutdown() {
                self.stop();
                return SessionExit::Shutdown;
            }

            let report = self.step();
            if report.acquisition == Some(AcquisitionOutcome::TimedOut) && !self.restart_on_timeout {
                return SessionExit::AcquisitionFailed;
            }

            let Some(deadline) = self.next_deadline() else {
                return SessionExit::Idle;
            };
            if self.clock.sleep_until(deadline, shutdown) {
                self.stop();
                return SessionExit::Shutdown;
            }
        }
    }
}

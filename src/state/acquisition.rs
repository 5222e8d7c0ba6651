/// Window acquisition state machine
///
/// Polls the window list until the target window shows up or the attempt
/// times out. Exactly one terminal event is emitted per attempt.
use std::time::{Duration, Instant};

use crate::capture::{WindowEnumerator, WindowMetadata, WindowTarget};
use crate::messaging::{EventSink, PerceptionEvent};
use crate::scheduler::Ticker;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_ACQUISITION_TIMEOUT: Duration = Duration::from_secs(10);

/// State of the acquisition process
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum AcquisitionState {
    /// Not looking for a window
    #[default]
    Idle,

    /// Polling the window list
    Acquiring,

    /// Target window found
    Acquired(WindowMetadata),

    /// Gave up after `timeout`
    Failed { timeout: Duration },
}

impl AcquisitionState {
    pub fn is_acquiring(&self) -> bool {
        matches!(self, AcquisitionState::Acquiring)
    }

    pub fn acquired_window(&self) -> Option<&WindowMetadata> {
        match self {
            AcquisitionState::Acquired(window) => Some(window),
            _ => None,
        }
    }

    /// Get a human-readable description of the state
    pub fn description(&self) -> &'static str {
        match self {
            AcquisitionState::Idle => "Idle",
            AcquisitionState::Acquiring => "Acquiring...",
            AcquisitionState::Acquired(_) => "Acquired",
            AcquisitionState::Failed { .. } => "Failed",
        }
    }
}

/// Result of a poll that ended the attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionOutcome {
    Acquired(WindowMetadata),
    TimedOut,
}

/// Polls for the target window on a fixed cadence.
pub struct AcquisitionStateMachine<E> {
    enumerator: E,
    target: WindowTarget,
    state: AcquisitionState,
    ticker: Ticker,
    started_at: Option<Instant>,
    timeout: Duration,
    polls: u64,
    sink: EventSink,
}

impl<E: WindowEnumerator> AcquisitionStateMachine<E> {
    pub fn new(enumerator: E, target: WindowTarget, sink: EventSink) -> Self {
        Self::with_timing(
            enumerator,
            target,
            sink,
            DEFAULT_POLL_INTERVAL,
            DEFAULT_ACQUISITION_TIMEOUT,
        )
    }

    pub fn with_timing(
        enumerator: E,
        target: WindowTarget,
        sink: EventSink,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            enumerator,
            target,
            state: AcquisitionState::Idle,
            ticker: Ticker::new(poll_interval),
            started_at: None,
            timeout,
            polls: 0,
            sink,
        }
    }

    pub fn state(&self) -> &AcquisitionState {
        &self.state
    }

    pub fn target(&self) -> &WindowTarget {
        &self.target
    }

    /// Number of polls run since the last `start`
    pub fn polls(&self) -> u64 {
        self.polls
    }

    pub fn enumerator_mut(&mut self) -> &mut E {
        &mut self.enumerator
    }

    /// Begin (or restart) an acquisition attempt.
    ///
    /// Any pending poll is cancelled and the timeout is measured from `now`.
    pub fn start(&mut self, now: Instant) {
        if self.state.is_acquiring() {
            tracing::debug!("Restarting window acquisition");
        }
        self.ticker.cancel();
        self.ticker.start(now);
        self.started_at = Some(now);
        self.polls = 0;
        self.state = AcquisitionState::Acquiring;
        tracing::info!(
            "Looking for window \"{}\" of {} (timeout {:?})",
            self.target.title,
            self.target.app_name,
            self.timeout
        );
    }

    /// Cancel polling and return to `Idle`. Safe to call in any state.
    pub fn stop(&mut self) {
        self.ticker.cancel();
        self.started_at = None;
        self.state = AcquisitionState::Idle;
    }

    /// When the next poll is due, if one is pending
    pub fn next_deadline(&self) -> Option<Instant> {
        self.ticker.next_due()
    }

    /// Run the pending poll if it is due.
    ///
    /// Returns the outcome when this poll ended the attempt.
    pub fn poll(&mut self, now: Instant) -> Option<AcquisitionOutcome> {
        if !self.state.is_acquiring() || !self.ticker.fire_if_due(now) {
            return None;
        }
        self.polls += 1;

        let windows = match self.enumerator.on_screen_windows() {
            Ok(windows) => windows,
            Err(err) => {
                tracing::debug!("Window enumeration failed: {}", err);
                Vec::new()
            }
        };

        if let Some(window) = windows.into_iter().find(|w| self.target.matches(w)) {
            self.ticker.cancel();
            tracing::info!(
                "✓ Acquired window {} ({}x{} at {},{}) after {} polls",
                window.id,
                window.bounds.width,
                window.bounds.height,
                window.bounds.x,
                window.bounds.y,
                self.polls
            );
            self.state = AcquisitionState::Acquired(window.clone());
            self.sink.send(PerceptionEvent::WindowAcquired(window.clone()));
            return Some(AcquisitionOutcome::Acquired(window));
        }

        let elapsed = self
            .started_at
            .map(|started| now.saturating_duration_since(started))
            .unwrap_or_default();
        if elapsed > self.timeout {
            self.ticker.cancel();
            tracing::warn!(
                "Window \"{}\" not found within {:?}",
                self.target.title,
                self.timeout
            );
            self.state = AcquisitionState::Failed {
                timeout: self.timeout,
            };
            self.sink.send(PerceptionEvent::AcquisitionFailed {
                timeout: self.timeout,
            });
            return Some(AcquisitionOutcome::TimedOut);
        }

        None
    }
}

/// Capture pipeline
///
/// Once a window is acquired, captures it on a fixed cadence and runs every
/// frame through preprocessing and board assembly. Each tick either delivers
/// exactly one board or is skipped.
use std::time::{Duration, Instant};

use super::board::BoardAssembler;
use super::classifier::PatchClassifier;
use crate::capture::{CapturedFrame, WindowCapturer, WindowId};
use crate::messaging::{EventSink, PerceptionEvent};
use crate::preprocessing::{CanonicalFrame, FramePreprocessor};
use crate::scheduler::Ticker;
use crate::state::AcquisitionState;
use crate::utils::{LatencyStats, StageTimer, TickTiming};

/// Default capture cadence (~11 fps)
pub const DEFAULT_CAPTURE_INTERVAL: Duration = Duration::from_millis(90);

/// What happened on one capture tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A board was assembled and handed to the sink
    Delivered,
    /// Capture failed or the frame held no playfield
    Missed,
}

/// Owns the buffers of one tick and releases them when the tick ends,
/// whichever way it ends.
struct TickScope<'a> {
    raw: Option<CapturedFrame>,
    canonical: Option<CanonicalFrame>,
    released: usize,
    report: &'a mut usize,
}

impl<'a> TickScope<'a> {
    fn new(report: &'a mut usize) -> Self {
        Self {
            raw: None,
            canonical: None,
            released: 0,
            report,
        }
    }

    fn hold_raw(&mut self, frame: CapturedFrame) -> &CapturedFrame {
        self.raw.insert(frame)
    }

    fn hold_canonical(&mut self, frame: CanonicalFrame) -> &CanonicalFrame {
        self.canonical.insert(frame)
    }

    /// Drop the raw capture early, it is not needed once preprocessed
    fn release_raw(&mut self) {
        if let Some(frame) = self.raw.take() {
            self.released += frame.byte_len();
        }
    }
}

impl Drop for TickScope<'_> {
    fn drop(&mut self) {
        self.release_raw();
        if let Some(frame) = self.canonical.take() {
            self.released += frame.byte_len();
        }
        *self.report = self.released;
        tracing::trace!(bytes = self.released, "tick buffers released");
    }
}

/// Periodic capture of the acquired window
pub struct CaptureScheduler<C, K> {
    capturer: C,
    preprocessor: FramePreprocessor,
    assembler: BoardAssembler<K>,
    ticker: Ticker,
    window: Option<WindowId>,
    sink: EventSink,
    stats: LatencyStats,
    delivered: u64,
    missed: u64,
    last_released_bytes: usize,
}

impl<C: WindowCapturer, K: PatchClassifier> CaptureScheduler<C, K> {
    pub fn new(
        capturer: C,
        preprocessor: FramePreprocessor,
        assembler: BoardAssembler<K>,
        sink: EventSink,
    ) -> Self {
        Self::with_interval(capturer, preprocessor, assembler, sink, DEFAULT_CAPTURE_INTERVAL)
    }

    pub fn with_interval(
        capturer: C,
        preprocessor: FramePreprocessor,
        assembler: BoardAssembler<K>,
        sink: EventSink,
        interval: Duration,
    ) -> Self {
        Self {
            capturer,
            preprocessor,
            assembler,
            ticker: Ticker::new(interval),
            window: None,
            sink,
            stats: LatencyStats::new(),
            delivered: 0,
            missed: 0,
            last_released_bytes: 0,
        }
    }

    /// Start ticking for the acquired window.
    ///
    /// Returns `false` and does nothing unless `state` is `Acquired`.
    pub fn start_capture(&mut self, state: &AcquisitionState, now: Instant) -> bool {
        let Some(window) = state.acquired_window() else {
            tracing::debug!("Capture not started: window is {}", state.description());
            return false;
        };

        self.window = Some(window.id);
        self.ticker.start(now);
        tracing::info!(
            "✓ Capturing window {} every {:?}",
            window.id,
            self.ticker.cadence()
        );
        true
    }

    /// Cancel the periodic tick. Safe to call at any time.
    pub fn stop_capture(&mut self) {
        if self.ticker.is_active() {
            tracing::info!(
                "Capture stopped ({} boards delivered, {} ticks missed)",
                self.delivered,
                self.missed
            );
        }
        self.ticker.cancel();
        self.window = None;
    }

    pub fn is_capturing(&self) -> bool {
        self.ticker.is_active()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.ticker.next_due()
    }

    pub fn cadence(&self) -> Duration {
        self.ticker.cadence()
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn missed(&self) -> u64 {
        self.missed
    }

    pub fn stats(&self) -> &LatencyStats {
        &self.stats
    }

    /// Bytes of frame buffers released at the end of the last tick
    pub fn last_released_bytes(&self) -> usize {
        self.last_released_bytes
    }

    pub fn preprocessor(&self) -> &FramePreprocessor {
        &self.preprocessor
    }

    pub fn assembler(&self) -> &BoardAssembler<K> {
        &self.assembler
    }

    pub fn capturer_mut(&mut self) -> &mut C {
        &mut self.capturer
    }

    /// Run the pending tick if it is due
    pub fn poll(&mut self, now: Instant) -> Option<TickOutcome> {
        let window = self.window?;
        if !self.ticker.fire_if_due(now) {
            return None;
        }

        let outcome = self.tick(window, now);
        match outcome {
            TickOutcome::Delivered => self.delivered += 1,
            TickOutcome::Missed => self.missed += 1,
        }
        Some(outcome)
    }

    fn tick(&mut self, window: WindowId, now: Instant) -> TickOutcome {
        let mut timer = StageTimer::start();
        let mut scope = TickScope::new(&mut self.last_released_bytes);

        let raw = match self.capturer.capture(window) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::debug!("Capture missed: {}", err);
                return TickOutcome::Missed;
            }
        };
        let capture_us = timer.lap_us();

        let processed = self
            .preprocessor
            .process(scope.hold_raw(CapturedFrame::from_raw(raw, now)));
        scope.release_raw();
        let canonical = match processed {
            Ok(canonical) => canonical,
            Err(err) => {
                tracing::debug!("Capture missed: {}", err);
                return TickOutcome::Missed;
            }
        };
        let preprocess_us = timer.lap_us();

        let board = self.assembler.assemble(scope.hold_canonical(canonical));
        let classify_us = timer.lap_us();

        self.sink.send(PerceptionEvent::BoardProduced(board));
        self.stats.add(TickTiming {
            capture_us,
            preprocess_us,
            classify_us,
            total_us: timer.total_us(),
        });
        TickOutcome::Delivered
    }
}

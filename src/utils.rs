use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Number of ticks kept for the latency report
pub const LATENCY_WINDOW: usize = 512;

/// Timing measurements for a single capture tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickTiming {
    pub capture_us: f64,
    pub preprocess_us: f64,
    pub classify_us: f64,
    pub total_us: f64,
}

impl TickTiming {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_ms(&self) -> f64 {
        self.total_us / 1000.0
    }
}

/// Measures consecutive stages of one tick
pub struct StageTimer {
    started: Instant,
    last: Instant,
}

impl StageTimer {
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last: now,
        }
    }

    /// Microseconds since the previous lap (or since start)
    pub fn lap_us(&mut self) -> f64 {
        let now = Instant::now();
        let lap = now.duration_since(self.last);
        self.last = now;
        duration_us(lap)
    }

    pub fn total_us(&self) -> f64 {
        duration_us(self.started.elapsed())
    }
}

fn duration_us(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000_000.0
}

/// Mean and percentiles of one stage, in microseconds
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageStats {
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Bounded ring of recent tick timings
#[derive(Debug, Clone)]
pub struct LatencyStats {
    timings: VecDeque<TickTiming>,
    capacity: usize,
}

impl LatencyStats {
    pub fn new() -> Self {
        Self::with_capacity(LATENCY_WINDOW)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            timings: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a tick, evicting the oldest once full
    pub fn add(&mut self, timing: TickTiming) {
        if self.timings.len() == self.capacity {
            self.timings.pop_front();
        }
        self.timings.push_back(timing);
    }

    pub fn len(&self) -> usize {
        self.timings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.timings.clear();
    }

    /// Calculate percentile from sorted data
    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }

        let idx = (p / 100.0 * (sorted.len() - 1) as f64).round() as usize;
        sorted[idx]
    }

    /// Calculate statistics for a specific stage
    pub fn stage_stats(&self, extract: impl Fn(&TickTiming) -> f64) -> StageStats {
        if self.timings.is_empty() {
            return StageStats::default();
        }

        let mut values: Vec<f64> = self.timings.iter().map(&extract).collect();
        values.sort_by(f64::total_cmp);

        StageStats {
            mean: values.iter().sum::<f64>() / values.len() as f64,
            p50: Self::percentile(&values, 50.0),
            p95: Self::percentile(&values, 95.0),
            p99: Self::percentile(&values, 99.0),
        }
    }

    /// Log a latency report for the recorded ticks
    pub fn report(&self, cadence: Duration) {
        if self.timings.is_empty() {
            tracing::info!("No timing data collected");
            return;
        }

        let capture = self.stage_stats(|t| t.capture_us);
        let preprocess = self.stage_stats(|t| t.preprocess_us);
        let classify = self.stage_stats(|t| t.classify_us);
        let total = self.stage_stats(|t| t.total_us);

        tracing::info!("Latency report over the last {} ticks", self.timings.len());
        tracing::info!("┌─────────────────┬──────────┬──────────┬──────────┬──────────┐");
        tracing::info!("│ Stage           │   Mean   │   p50    │   p95    │   p99    │");
        tracing::info!("├─────────────────┼──────────┼──────────┼──────────┼──────────┤");
        Self::log_row("Capture", capture);
        Self::log_row("Preprocess", preprocess);
        Self::log_row("Classify", classify);
        tracing::info!("├─────────────────┼──────────┼──────────┼──────────┼──────────┤");
        Self::log_row("TOTAL", total);
        tracing::info!("└─────────────────┴──────────┴──────────┴──────────┴──────────┘");

        let budget_ms = cadence.as_secs_f64() * 1000.0;
        let total_p95_ms = total.p95 / 1000.0;
        if total_p95_ms < budget_ms {
            tracing::info!("✓ Ticks fit the {:.0} ms cadence (p95 {:.2} ms)", budget_ms, total_p95_ms);
        } else {
            tracing::warn!(
                "Ticks overrun the {:.0} ms cadence (p95 {:.2} ms), beats will be skipped",
                budget_ms,
                total_p95_ms
            );
        }

        let stages = [
            ("Capture", capture.p95),
            ("Preprocess", preprocess.p95),
            ("Classify", classify.p95),
        ];
        if let Some((name, p95)) = stages.iter().max_by(|a, b| a.1.total_cmp(&b.1)) {
            tracing::info!("Bottleneck: {} ({:.0} µs p95)", name, p95);
        }
    }

    fn log_row(name: &str, stats: StageStats) {
        tracing::info!(
            "│ {:<15} │ {:>6.0} µs │ {:>6.0} µs │ {:>6.0} µs │ {:>6.0} µs │",
            name,
            stats.mean,
            stats.p50,
            stats.p95,
            stats.p99
        );
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing(total_us: f64) -> TickTiming {
        TickTiming {
            capture_us: total_us / 2.0,
            preprocess_us: total_us / 4.0,
            classify_us: total_us / 4.0,
            total_us,
        }
    }

    #[test]
    fn test_tick_timing_total_ms() {
        let mut timing = TickTiming::new();
        timing.total_us = 50000.0;
        assert_eq!(timing.total_ms(), 50.0);
    }

    #[test]
    fn test_latency_stats_empty() {
        let stats = LatencyStats::new();
        assert_eq!(stats.len(), 0);
        assert!(stats.is_empty());
        assert_eq!(stats.capacity(), LATENCY_WINDOW);
        assert_eq!(stats.stage_stats(|t| t.total_us), StageStats::default());
    }

    #[test]
    fn test_latency_stats_ring_evicts_oldest() {
        let mut stats = LatencyStats::with_capacity(3);
        for total in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.add(timing(total));
        }
        assert_eq!(stats.len(), 3);
        let total = stats.stage_stats(|t| t.total_us);
        assert_eq!(total.mean, 4.0);
        assert_eq!(total.p50, 4.0);
        assert_eq!(total.p99, 5.0);
    }

    #[test]
    fn test_percentiles() {
        let mut stats = LatencyStats::with_capacity(100);
        for total in 1..=100 {
            stats.add(timing(total as f64));
        }
        let total = stats.stage_stats(|t| t.total_us);
        assert_eq!(total.mean, 50.5);
        assert_eq!(total.p50, 51.0);
        assert_eq!(total.p95, 95.0);
        assert_eq!(total.p99, 99.0);
    }

    #[test]
    fn test_stage_timer_laps_are_monotonic() {
        let mut timer = StageTimer::start();
        let first = timer.lap_us();
        let second = timer.lap_us();
        assert!(first >= 0.0);
        assert!(second >= 0.0);
        assert!(timer.total_us() >= first + second);
    }

    #[test]
    fn test_report_with_and_without_data() {
        let mut stats = LatencyStats::new();
        stats.report(Duration::from_millis(90));
        stats.add(timing(1000.0));
        stats.report(Duration::from_millis(90));
        stats.clear();
        assert!(stats.is_empty());
    }
}

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Clock and sleep source for the presentation loop.
pub trait Timer: Clone + Send + Sync {
    type Timestamp: Copy + Clone + Send + Sync;
    fn now(&self) -> Self::Timestamp;
    fn elapsed(&self, ts: Self::Timestamp) -> Duration;
    fn sleep(&self, d: Duration) -> impl Future<Output = ()> + Send;
    /// Record how long a timed wait actually took against what was asked for.
    fn record_wait(&mut self, requested: Duration, actual: Duration);
    fn timing_stats(&self) -> TimingStats;
}

/// How far timed waits overran their request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingStats {
    pub samples: usize,
    pub mean_overshoot_ns: f64,
    pub jitter_ns: f64,
    pub min_overshoot_ns: f64,
    pub max_overshoot_ns: f64,
}

/// Monotonic timer on the tokio clock, so a paused test runtime drives it too.
#[derive(Debug, Clone)]
pub struct MonotonicTimer {
    start: Instant,
    overshoots: VecDeque<Duration>,
    max_samples: usize,
}

impl MonotonicTimer {
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    pub fn with_capacity(max_samples: usize) -> Self {
        let max_samples = max_samples.max(1);
        Self {
            start: Instant::now(),
            overshoots: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }
}

impl Default for MonotonicTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer for MonotonicTimer {
    type Timestamp = u64;

    fn now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }

    fn elapsed(&self, ts: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }

    fn sleep(&self, d: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(d)
    }

    fn record_wait(&mut self, requested: Duration, actual: Duration) {
        if self.overshoots.len() >= self.max_samples {
            self.overshoots.pop_front();
        }
        self.overshoots.push_back(actual.saturating_sub(requested));
    }

    fn timing_stats(&self) -> TimingStats {
        if self.overshoots.is_empty() {
            return TimingStats::default();
        }
        let times: Vec<f64> = self
            .overshoots
            .iter()
            .map(|d| d.as_nanos() as f64)
            .collect();
        let n = times.len() as f64;
        let avg = times.iter().sum::<f64>() / n;
        let var = times.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / n;
        TimingStats {
            samples: times.len(),
            mean_overshoot_ns: avg,
            jitter_ns: var.sqrt(),
            min_overshoot_ns: times.iter().copied().fold(f64::INFINITY, f64::min),
            max_overshoot_ns: times.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_over_recorded_waits() {
        let mut timer = MonotonicTimer::new();
        assert_eq!(timer.timing_stats(), TimingStats::default());

        let ask = Duration::from_millis(100);
        timer.record_wait(ask, Duration::from_micros(100_200));
        timer.record_wait(ask, Duration::from_micros(100_400));
        // an early wake counts as zero overshoot
        timer.record_wait(ask, Duration::from_millis(99));

        let stats = timer.timing_stats();
        assert_eq!(stats.samples, 3);
        assert_eq!(stats.min_overshoot_ns, 0.0);
        assert_eq!(stats.max_overshoot_ns, 400_000.0);
        assert!((stats.mean_overshoot_ns - 200_000.0).abs() < 1e-6);
        assert!(stats.jitter_ns > 0.0);
    }

    #[test]
    fn sample_window_is_bounded() {
        let mut timer = MonotonicTimer::with_capacity(2);
        for extra in [5u64, 6, 7] {
            timer.record_wait(Duration::ZERO, Duration::from_nanos(extra));
        }
        let stats = timer.timing_stats();
        assert_eq!(stats.samples, 2);
        assert_eq!(stats.min_overshoot_ns, 6.0);
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_on_the_tokio_clock() {
        let timer = MonotonicTimer::new();
        let t0 = timer.now();
        timer.sleep(Duration::from_millis(250)).await;
        assert!(timer.elapsed(t0) >= Duration::from_millis(250));
    }
}

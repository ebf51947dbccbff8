//! Progress reporting boundary.
//!
//! The engine only ever talks to a [`ProgressObserver`]; how percentages and
//! failure messages are rendered is the consumer's business.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Observer of the launch pipeline. `notify` receives a percentage on the
/// global 0-100 scale and an optional status message; `report_failure` is
/// terminal and carries the most recent log lines for display.
pub trait ProgressObserver: Send + Sync {
    fn notify(&self, percentage: u8, message: Option<&str>);

    fn report_failure(&self, message: &str, log_tail: &[String]);

    /// Called once before the first stage runs.
    fn show(&self) {}

    /// Called once after the last stage succeeds; may block until the
    /// consumer is done displaying.
    fn await_close(&self) {}
}

/// Observer that drops everything. Used by tests and the manifest tool.
pub struct NullObserver;

impl ProgressObserver for NullObserver {
    fn notify(&self, _percentage: u8, _message: Option<&str>) {}

    fn report_failure(&self, _message: &str, _log_tail: &[String]) {}
}

/// Thread-safe accumulator that reports the fraction of a known total to a
/// callback on every addition.
pub struct PercentageCounter {
    total: u64,
    current: AtomicU64,
    callback: Box<dyn Fn(f64) + Send + Sync>,
}

impl PercentageCounter {
    pub fn new(total: u64, callback: impl Fn(f64) + Send + Sync + 'static) -> Self {
        Self {
            total,
            current: AtomicU64::new(0),
            callback: Box::new(callback),
        }
    }

    /// Add to the running total and report the new fraction.
    pub fn add(&self, summand: u64) {
        let sum = self.current.fetch_add(summand, Ordering::SeqCst) + summand;
        if self.total > 0 {
            (self.callback)(sum as f64 / self.total as f64);
        } else {
            (self.callback)(1.0);
        }
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }
}

/// Counter wired to an observer, scaled into a stage's `[low, high]` progress
/// slice. The running total only grows, so a regression of the reported
/// percentage cannot happen; if it ever does, that is a bug worth a loud log
/// line, not a notification.
pub fn scaled_counter(
    total: u64,
    low: u8,
    high: u8,
    observer: Arc<dyn ProgressObserver>,
) -> PercentageCounter {
    let scale = f64::from(high - low) / 100.0;
    let last = AtomicU64::new(0);
    PercentageCounter::new(total, move |fraction| {
        let progress = f64::from(low) + (100.0 * scale * fraction).round();
        let progress = progress as u64;
        let previous = last.swap(progress, Ordering::SeqCst);
        if previous > progress {
            tracing::warn!("BUG: progress percentage went backwards: {previous} > {progress}");
        } else {
            observer.notify(progress.min(100) as u8, None);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<u8>>);

    impl ProgressObserver for Recorder {
        fn notify(&self, percentage: u8, _message: Option<&str>) {
            self.0.lock().unwrap().push(percentage);
        }

        fn report_failure(&self, _message: &str, _log_tail: &[String]) {}
    }

    #[test]
    fn counter_reports_fractions() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let counter = PercentageCounter::new(100, move |f| sink.lock().unwrap().push(f));
        counter.add(25);
        counter.add(75);
        assert_eq!(counter.current(), 100);
        let seen = seen.lock().unwrap();
        assert!((seen[0] - 0.25).abs() < 1e-9);
        assert!((seen[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_total_reports_complete() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let counter = PercentageCounter::new(0, move |f| sink.lock().unwrap().push(f));
        counter.add(0);
        assert!((seen.lock().unwrap()[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn scaled_counter_maps_into_stage_slice() {
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let counter = scaled_counter(200, 10, 95, recorder.clone());
        counter.add(100); // half way -> 10 + 85 * 0.5 = 52.5 -> 53 (rounded)
        counter.add(100); // done -> 95
        let seen = recorder.0.lock().unwrap();
        assert_eq!(*seen, vec![53, 95]);
    }

    #[test]
    fn scaled_counter_is_monotonic() {
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let counter = scaled_counter(1_000, 10, 95, recorder.clone());
        for _ in 0..10 {
            counter.add(100);
        }
        let seen = recorder.0.lock().unwrap();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*seen.last().unwrap(), 95);
    }
}

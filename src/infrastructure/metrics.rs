//! Bridge counters and monitoring

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Lock-free counters shared by every component of one `Bridge`.
#[derive(Debug)]
pub struct BridgeStats {
    states_created: AtomicU64,
    instances_created: AtomicU64,
    proxy_types_generated: AtomicU64,
    calls_dispatched: AtomicU64,
    failures: AtomicU64,
    /// Nanoseconds spent inside forwarded calls
    dispatch_nanos: AtomicU64,
    start_time: Instant,
}

impl BridgeStats {
    pub fn new() -> Self {
        Self {
            states_created: AtomicU64::new(0),
            instances_created: AtomicU64::new(0),
            proxy_types_generated: AtomicU64::new(0),
            calls_dispatched: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            dispatch_nanos: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_state(&self) {
        self.states_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_instance(&self) {
        self.instances_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_proxy_type(&self) {
        self.proxy_types_generated.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one forwarded call and the time spent in it.
    pub fn record_call(&self, elapsed: Duration) {
        self.calls_dispatched.fetch_add(1, Ordering::Relaxed);
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.dispatch_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime: self.uptime(),
            states_created: self.states_created.load(Ordering::Relaxed),
            instances_created: self.instances_created.load(Ordering::Relaxed),
            proxy_types_generated: self.proxy_types_generated.load(Ordering::Relaxed),
            calls_dispatched: self.calls_dispatched.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            dispatch_time: Duration::from_nanos(self.dispatch_nanos.load(Ordering::Relaxed)),
        }
    }
}

impl Default for BridgeStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub uptime: Duration,
    pub states_created: u64,
    pub instances_created: u64,
    pub proxy_types_generated: u64,
    pub calls_dispatched: u64,
    pub failures: u64,
    pub dispatch_time: Duration,
}

impl StatsSnapshot {
    /// Mean time per forwarded call.
    pub fn mean_dispatch(&self) -> Duration {
        match u32::try_from(self.calls_dispatched) {
            Ok(0) => Duration::ZERO,
            Ok(calls) => self.dispatch_time / calls,
            Err(_) => Duration::from_nanos(
                (self.dispatch_time.as_nanos() / u128::from(self.calls_dispatched)) as u64,
            ),
        }
    }

    /// Format as human-readable report
    pub fn report(&self) -> String {
        let lines = [
            format!("Uptime: {:.2?}", self.uptime),
            String::new(),
            "=== Counters ===".to_string(),
            format!("states_created: {}", self.states_created),
            format!("instances_created: {}", self.instances_created),
            format!("proxy_types_generated: {}", self.proxy_types_generated),
            format!("calls_dispatched: {}", self.calls_dispatched),
            format!("failures: {}", self.failures),
            String::new(),
            "=== Dispatch ===".to_string(),
            format!("total: {:.2?}", self.dispatch_time),
            format!("mean:  {:.2?}", self.mean_dispatch()),
        ];
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = BridgeStats::new();
        stats.record_state();
        stats.record_instance();
        stats.record_instance();
        stats.record_proxy_type();
        stats.record_failure();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.states_created, 1);
        assert_eq!(snapshot.instances_created, 2);
        assert_eq!(snapshot.proxy_types_generated, 1);
        assert_eq!(snapshot.failures, 1);
        assert_eq!(snapshot.calls_dispatched, 0);
    }

    #[test]
    fn test_mean_dispatch() {
        let stats = BridgeStats::new();
        assert_eq!(stats.snapshot().mean_dispatch(), Duration::ZERO);

        stats.record_call(Duration::from_micros(10));
        stats.record_call(Duration::from_micros(30));
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.calls_dispatched, 2);
        assert_eq!(snapshot.mean_dispatch(), Duration::from_micros(20));
    }

    #[test]
    fn test_report_lists_counters() {
        let report = BridgeStats::new().snapshot().report();
        assert!(report.contains("calls_dispatched: 0"));
        assert!(report.contains("=== Dispatch ==="));
    }
}

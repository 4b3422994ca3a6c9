//! In-process counters for the bridge.
//!
//! Counters are bumped from native callback threads and read from the
//! consumer side. They live only as long as the process.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Something the bridge counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// Sensor reading delivered to a sink
    Reading,
    /// Application event delivered to a sink
    AppEvent,
    /// Native callback discarded because its stream was torn down
    StaleCallback,
    /// Data event a bounded sink had no room for
    DroppedEvent,
    /// Error event delivered to a sink
    StreamError,
    /// Request answered successfully
    QueryServed,
    /// Request answered with an error
    QueryFailed,
}

impl Counter {
    const COUNT: usize = 7;

    fn index(self) -> usize {
        self as usize
    }
}

/// Shared atomic counters, one per [`Counter`].
#[derive(Debug)]
pub struct BridgeStats {
    counters: [AtomicU64; Counter::COUNT],
    started: Instant,
}

impl BridgeStats {
    pub fn new() -> Self {
        Self {
            counters: Default::default(),
            started: Instant::now(),
        }
    }

    pub fn increment(&self, counter: Counter) {
        self.counters[counter.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counters[counter.index()].load(Ordering::Relaxed)
    }

    pub fn record_reading(&self) {
        self.increment(Counter::Reading);
    }

    pub fn record_app_event(&self) {
        self.increment(Counter::AppEvent);
    }

    pub fn record_stale_callback(&self) {
        self.increment(Counter::StaleCallback);
    }

    pub fn record_dropped_event(&self) {
        self.increment(Counter::DroppedEvent);
    }

    pub fn record_stream_error(&self) {
        self.increment(Counter::StreamError);
    }

    pub fn record_query(&self, succeeded: bool) {
        self.increment(if succeeded {
            Counter::QueryServed
        } else {
            Counter::QueryFailed
        });
    }

    /// Copy of all counters plus time since creation.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            readings_forwarded: self.get(Counter::Reading),
            app_events_forwarded: self.get(Counter::AppEvent),
            stale_callbacks: self.get(Counter::StaleCallback),
            events_dropped: self.get(Counter::DroppedEvent),
            stream_errors: self.get(Counter::StreamError),
            queries_served: self.get(Counter::QueryServed),
            query_failures: self.get(Counter::QueryFailed),
            uptime: self.started.elapsed(),
        }
    }
}

impl Default for BridgeStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub readings_forwarded: u64,
    pub app_events_forwarded: u64,
    pub stale_callbacks: u64,
    pub events_dropped: u64,
    pub stream_errors: u64,
    pub queries_served: u64,
    pub query_failures: u64,
    pub uptime: Duration,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "streams  readings={} app_events={} errors={}",
            self.readings_forwarded, self.app_events_forwarded, self.stream_errors
        )?;
        writeln!(
            f,
            "discards stale={} dropped={}",
            self.stale_callbacks, self.events_dropped
        )?;
        writeln!(
            f,
            "queries  ok={} failed={}",
            self.queries_served, self.query_failures
        )?;
        write!(f, "uptime   {:.1}s", self.uptime.as_secs_f64())
    }
}

/// Counters shared between streams, the observer and the registry.
pub type SharedStats = Arc<BridgeStats>;

pub fn create_shared_stats() -> SharedStats {
    Arc::new(BridgeStats::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let stats = BridgeStats::new();
        stats.record_reading();
        stats.record_reading();
        stats.record_app_event();
        stats.record_query(true);
        stats.record_query(false);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.readings_forwarded, 2);
        assert_eq!(snapshot.app_events_forwarded, 1);
        assert_eq!(snapshot.queries_served, 1);
        assert_eq!(snapshot.query_failures, 1);
        assert_eq!(snapshot.stale_callbacks, 0);
    }

    #[test]
    fn test_counters_are_independent() {
        let stats = BridgeStats::new();
        stats.increment(Counter::StaleCallback);
        stats.increment(Counter::DroppedEvent);
        stats.increment(Counter::DroppedEvent);

        assert_eq!(stats.get(Counter::StaleCallback), 1);
        assert_eq!(stats.get(Counter::DroppedEvent), 2);
        assert_eq!(stats.get(Counter::Reading), 0);
    }

    #[test]
    fn test_counts_from_many_threads() {
        let stats = create_shared_stats();
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        stats.record_reading();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(stats.snapshot().readings_forwarded, 1000);
    }

    #[test]
    fn test_display_lists_counters() {
        let text = BridgeStats::new().snapshot().to_string();
        assert!(text.contains("readings=0"));
        assert!(text.contains("stale=0"));
        assert!(text.contains("uptime"));
    }
}

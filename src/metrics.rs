use parking_lot::RwLock;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, OnceLock,
    },
    time::{Duration, Instant},
};

pub const POLL_FETCHES_TOTAL: &str = "poll_fetches_total";
pub const POLL_FETCH_ERRORS_TOTAL: &str = "poll_fetch_errors_total";
pub const POLL_FOUND_TOTAL: &str = "poll_found_total";
pub const POLL_TIMEOUTS_TOTAL: &str = "poll_timeouts_total";
pub const RESERVATION_REQUESTS_TOTAL: &str = "reservation_requests_total";
pub const RESERVATION_SUCCESS_TOTAL: &str = "reservation_success_total";
pub const RESERVATION_FAILURE_TOTAL: &str = "reservation_failure_total";
pub const ACQUISITION_RUNS_TOTAL: &str = "acquisition_runs_total";
pub const ACQUISITION_SUCCESS_TOTAL: &str = "acquisition_success_total";

pub const TIME_TO_VARIANTS_MS: &str = "time_to_variants_ms";
pub const RESERVATION_LATENCY_MS: &str = "reservation_latency_ms";
pub const ACQUISITION_LATENCY_MS: &str = "acquisition_latency_ms";

/// Histograms keep at most this many samples.
const HISTOGRAM_CAPACITY: usize = 1000;

/// In-process counters, gauges and latency histograms
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: RwLock<HashMap<String, Arc<AtomicU64>>>,
    histograms: RwLock<HashMap<String, Arc<RwLock<Vec<u64>>>>>,
    gauges: RwLock<HashMap<String, Arc<AtomicU64>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_counter(&self, name: &str) {
        self.add_to_counter(name, 1);
    }

    pub fn add_to_counter(&self, name: &str, value: u64) {
        if let Some(counter) = self.counters.read().get(name) {
            counter.fetch_add(value, Ordering::Relaxed);
            return;
        }
        self.counters
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .fetch_add(value, Ordering::Relaxed);
    }

    pub fn set_gauge(&self, name: &str, value: u64) {
        if let Some(gauge) = self.gauges.read().get(name) {
            gauge.store(value, Ordering::Relaxed);
            return;
        }
        self.gauges
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .store(value, Ordering::Relaxed);
    }

    /// Record a duration sample in milliseconds
    pub fn record_histogram(&self, name: &str, duration: Duration) {
        let millis = duration.as_millis() as u64;
        let histogram = {
            let existing = self.histograms.read().get(name).cloned();
            match existing {
                Some(h) => h,
                None => self
                    .histograms
                    .write()
                    .entry(name.to_string())
                    .or_insert_with(|| Arc::new(RwLock::new(Vec::new())))
                    .clone(),
            }
        };

        let mut hist = histogram.write();
        hist.push(millis);
        if hist.len() > HISTOGRAM_CAPACITY {
            hist.drain(0..HISTOGRAM_CAPACITY / 2);
        }
    }

    pub fn get_counter(&self, name: &str) -> u64 {
        self.counters
            .read()
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn get_gauge(&self, name: &str) -> u64 {
        self.gauges
            .read()
            .get(name)
            .map(|g| g.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn get_histogram_stats(&self, name: &str) -> Option<HistogramStats> {
        let histogram = self.histograms.read().get(name).cloned()?;
        let mut sorted = histogram.read().to_vec();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_unstable();
        let len = sorted.len();
        Some(HistogramStats {
            count: len as u64,
            min: sorted[0],
            max: sorted[len - 1],
            p50: sorted[len / 2],
            p95: sorted[len * 95 / 100],
            p99: sorted[len * 99 / 100],
        })
    }

    pub fn export_metrics(&self) -> MetricsSnapshot {
        let counters = self
            .counters
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect();

        let gauges = self
            .gauges
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect();

        let names: Vec<String> = self.histograms.read().keys().cloned().collect();
        let histograms = names
            .into_iter()
            .filter_map(|k| self.get_histogram_stats(&k).map(|stats| (k, stats)))
            .collect();

        MetricsSnapshot {
            counters,
            gauges,
            histograms,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HistogramStats {
    pub count: u64,
    pub min: u64,
    pub max: u64,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
}

#[derive(Debug, serde::Serialize)]
pub struct MetricsSnapshot {
    pub counters: HashMap<String, u64>,
    pub gauges: HashMap<String, u64>,
    pub histograms: HashMap<String, HistogramStats>,
}

static GLOBAL_METRICS: OnceLock<MetricsRegistry> = OnceLock::new();

/// Global metrics registry
pub fn metrics() -> &'static MetricsRegistry {
    GLOBAL_METRICS.get_or_init(MetricsRegistry::new)
}

/// Timer helper for measuring duration
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    pub fn finish(self) -> Duration {
        let duration = self.start.elapsed();
        metrics().record_histogram(self.name, duration);
        duration
    }
}

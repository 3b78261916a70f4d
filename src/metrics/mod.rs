// Metrics module - Prometheus-compatible counters for thumbnail derivation
// Exported as plain text on /metrics

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Counters for the derivation pipeline and the HTTP materializer
/// Thread-safe via atomic operations and a mutex for the status map
#[derive(Debug, Default)]
pub struct ThumbMetrics {
    thumbnails_generated: AtomicU64,
    cache_hits: AtomicU64,
    placeholders_served: AtomicU64,
    generation_failures: AtomicU64,
    remote_fetches: AtomicU64,
    remote_mirror_hits: AtomicU64,
    descriptors_written: AtomicU64,

    // Cumulative generation time in microseconds
    generation_time_us: AtomicU64,

    // Materializer responses by HTTP status
    materializer_status: Mutex<BTreeMap<u16, u64>>,
}

impl ThumbMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_generated(&self, elapsed: Duration) {
        self.thumbnails_generated.fetch_add(1, Ordering::Relaxed);
        self.generation_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn increment_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_placeholder(&self) {
        self.placeholders_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_generation_failure(&self) {
        self.generation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_remote_fetch(&self) {
        self.remote_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_remote_mirror_hit(&self) {
        self.remote_mirror_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_descriptor_written(&self) {
        self.descriptors_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_materializer_status(&self, status: u16) {
        if let Ok(mut counts) = self.materializer_status.lock() {
            *counts.entry(status).or_insert(0) += 1;
        }
    }

    pub fn thumbnails_generated(&self) -> u64 {
        self.thumbnails_generated.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn placeholders_served(&self) -> u64 {
        self.placeholders_served.load(Ordering::Relaxed)
    }

    pub fn generation_failures(&self) -> u64 {
        self.generation_failures.load(Ordering::Relaxed)
    }

    pub fn remote_fetches(&self) -> u64 {
        self.remote_fetches.load(Ordering::Relaxed)
    }

    pub fn remote_mirror_hits(&self) -> u64 {
        self.remote_mirror_hits.load(Ordering::Relaxed)
    }

    pub fn materializer_status_count(&self, status: u16) -> u64 {
        self.materializer_status
            .lock()
            .map(|counts| counts.get(&status).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Render all counters in Prometheus text exposition format
    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();

        let counters = [
            (
                "thumbnails_generated_total",
                "Thumbnails derived and published",
                self.thumbnails_generated(),
            ),
            (
                "thumbnail_cache_hits_total",
                "Requests answered by an existing thumbnail",
                self.cache_hits(),
            ),
            (
                "thumbnail_placeholders_total",
                "Requests answered with a placeholder URL",
                self.placeholders_served(),
            ),
            (
                "thumbnail_generation_failures_total",
                "Derivations that failed",
                self.generation_failures(),
            ),
            (
                "remote_fetches_total",
                "Remote sources fetched over the network",
                self.remote_fetches(),
            ),
            (
                "remote_mirror_hits_total",
                "Remote sources served from a fresh local mirror",
                self.remote_mirror_hits(),
            ),
            (
                "thumbnail_descriptors_written_total",
                "Sidecar descriptors written",
                self.descriptors_written.load(Ordering::Relaxed),
            ),
        ];

        for (name, help, value) in counters {
            output.push_str(&format!("# HELP {} {}\n", name, help));
            output.push_str(&format!("# TYPE {} counter\n", name));
            output.push_str(&format!("{} {}\n\n", name, value));
        }

        output.push_str(
            "# HELP thumbnail_generation_seconds_total Cumulative time spent generating thumbnails\n",
        );
        output.push_str("# TYPE thumbnail_generation_seconds_total counter\n");
        output.push_str(&format!(
            "thumbnail_generation_seconds_total {:.6}\n\n",
            self.generation_time_us.load(Ordering::Relaxed) as f64 / 1_000_000.0
        ));

        output.push_str("# HELP materializer_requests_total Materializer responses by status code\n");
        output.push_str("# TYPE materializer_requests_total counter\n");
        if let Ok(counts) = self.materializer_status.lock() {
            for (status, count) in counts.iter() {
                output.push_str(&format!(
                    "materializer_requests_total{{status=\"{}\"}} {}\n",
                    status, count
                ));
            }
        }

        output
    }
}

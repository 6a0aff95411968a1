//! Rolling response-time windows, memory snapshots, and threshold checks
//! against the cache's reported hit rate.

use cache::CacheStats;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceThresholds {
    pub min_hit_rate: f64,
    pub max_response_time_ms: f64,
    pub max_memory_bytes: u64,
}

impl Default for PerformanceThresholds {
    fn default() -> Self {
        Self {
            min_hit_rate: 0.8,
            max_response_time_ms: 50.0,
            max_memory_bytes: 1 << 30, // 1 GiB
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdCheck {
    pub hit_rate_ok: bool,
    pub response_time_ok: bool,
    pub memory_usage_ok: bool,
    pub overall_healthy: bool,
}

/// Fixed-capacity window of response-time samples in milliseconds, oldest
/// evicted first once full.
struct ResponseTimeWindow {
    samples: Vec<f64>,
    capacity: usize,
}

impl ResponseTimeWindow {
    fn new(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
        }
    }

    fn record(&mut self, ms: f64) {
        if self.samples.len() >= self.capacity {
            self.samples.remove(0);
        }
        self.samples.push(ms);
    }

    fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    fn percentile(&self, p: f64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let mut sorted = self.samples.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let index = ((sorted.len() as f64 * p) as usize).min(sorted.len() - 1);
        sorted[index]
    }
}

pub struct PerformanceMonitor {
    response_times: Mutex<ResponseTimeWindow>,
    thresholds: PerformanceThresholds,
}

impl PerformanceMonitor {
    pub fn new(thresholds: PerformanceThresholds) -> Self {
        Self::with_capacity(thresholds, 1024)
    }

    pub fn with_capacity(thresholds: PerformanceThresholds, capacity: usize) -> Self {
        Self {
            response_times: Mutex::new(ResponseTimeWindow::new(capacity)),
            thresholds,
        }
    }

    pub fn record_response_time_ms(&self, ms: f64) {
        if let Ok(mut window) = self.response_times.lock() {
            window.record(ms);
        }
    }

    pub fn mean_response_time_ms(&self) -> f64 {
        self.response_times.lock().map(|w| w.mean()).unwrap_or(0.0)
    }

    pub fn p50_response_time_ms(&self) -> f64 {
        self.response_times.lock().map(|w| w.percentile(0.50)).unwrap_or(0.0)
    }

    pub fn p95_response_time_ms(&self) -> f64 {
        self.response_times.lock().map(|w| w.percentile(0.95)).unwrap_or(0.0)
    }

    pub fn p99_response_time_ms(&self) -> f64 {
        self.response_times.lock().map(|w| w.percentile(0.99)).unwrap_or(0.0)
    }

    /// Current resident set size, read from `/proc/self/status` on Linux and
    /// via `getrusage` elsewhere.
    pub fn memory_usage_bytes(&self) -> anyhow::Result<u64> {
        #[cfg(target_os = "linux")]
        {
            if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
                for line in status.lines() {
                    if line.starts_with("VmRSS:") {
                        if let Some(kb_str) = line.split_whitespace().nth(1) {
                            if let Ok(kb) = kb_str.parse::<u64>() {
                                return Ok(kb * 1024);
                            }
                        }
                    }
                }
            }
            anyhow::bail!("failed to read memory usage from /proc/self/status");
        }

        #[cfg(not(target_os = "linux"))]
        {
            unsafe {
                let mut rusage = std::mem::MaybeUninit::<libc::rusage>::uninit();
                if libc::getrusage(libc::RUSAGE_SELF, rusage.as_mut_ptr()) == 0 {
                    let rusage = rusage.assume_init();
                    #[cfg(target_os = "macos")]
                    {
                        Ok(rusage.ru_maxrss as u64)
                    }
                    #[cfg(not(target_os = "macos"))]
                    {
                        Ok((rusage.ru_maxrss as u64) * 1024)
                    }
                } else {
                    let errno = std::io::Error::last_os_error();
                    anyhow::bail!("getrusage failed: {errno}");
                }
            }
        }
    }

    pub fn check_performance_thresholds(&self, cache_stats: &CacheStats) -> ThresholdCheck {
        let hit_rate_ok = cache_stats.hit_rate >= self.thresholds.min_hit_rate;
        let response_time_ok = self.p95_response_time_ms() <= self.thresholds.max_response_time_ms;
        let memory_usage_ok = self
            .memory_usage_bytes()
            .map(|bytes| bytes <= self.thresholds.max_memory_bytes)
            .unwrap_or_else(|e| {
                tracing::warn!("failed to read memory usage, treating as ok: {e}");
                true
            });

        ThresholdCheck {
            hit_rate_ok,
            response_time_ok,
            memory_usage_ok,
            overall_healthy: hit_rate_ok && response_time_ok && memory_usage_ok,
        }
    }

    pub fn generate_performance_report(&self, cache_stats: &CacheStats) -> String {
        let memory_bytes = self.memory_usage_bytes().unwrap_or(0);
        format!(
            "Cache Performance Report\n\
             Hit Rate: {:.2}% ({} hits / {} misses)\n\
             Response Times: mean={:.2}ms p50={:.2}ms p95={:.2}ms p99={:.2}ms\n\
             Memory Usage: {:.2} MB ({} entries, {} evictions)\n",
            cache_stats.hit_rate * 100.0,
            cache_stats.hits,
            cache_stats.misses,
            self.mean_response_time_ms(),
            self.p50_response_time_ms(),
            self.p95_response_time_ms(),
            self.p99_response_time_ms(),
            memory_bytes as f64 / (1024.0 * 1024.0),
            cache_stats.entries,
            cache_stats.evictions,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(hit_rate: f64) -> CacheStats {
        CacheStats {
            hits: 80,
            misses: 20,
            hit_rate,
            entries: 100,
            memory_usage: 0,
            evictions: 0,
        }
    }

    #[test]
    fn percentiles_reflect_recorded_samples() {
        let monitor = PerformanceMonitor::new(PerformanceThresholds::default());
        for ms in 1..=100 {
            monitor.record_response_time_ms(ms as f64);
        }
        assert!(monitor.p99_response_time_ms() >= monitor.p95_response_time_ms());
        assert!(monitor.p95_response_time_ms() >= monitor.p50_response_time_ms());
    }

    #[test]
    fn window_evicts_oldest_sample_once_full() {
        let monitor = PerformanceMonitor::with_capacity(PerformanceThresholds::default(), 3);
        monitor.record_response_time_ms(1.0);
        monitor.record_response_time_ms(2.0);
        monitor.record_response_time_ms(3.0);
        monitor.record_response_time_ms(100.0);
        // the "1.0" sample should have been evicted
        assert!(monitor.mean_response_time_ms() > 30.0);
    }

    #[test]
    fn low_hit_rate_fails_the_threshold_check() {
        let monitor = PerformanceMonitor::new(PerformanceThresholds::default());
        let check = monitor.check_performance_thresholds(&stats(0.1));
        assert!(!check.hit_rate_ok);
        assert!(!check.overall_healthy);
    }

    #[test]
    fn report_contains_required_section_headers() {
        let monitor = PerformanceMonitor::new(PerformanceThresholds::default());
        monitor.record_response_time_ms(5.0);
        let report = monitor.generate_performance_report(&stats(0.9));
        assert!(report.contains("Cache Performance Report"));
        assert!(report.contains("Hit Rate:"));
        assert!(report.contains("Response Times:"));
        assert!(report.contains("Memory Usage:"));
    }
}

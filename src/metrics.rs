//! Throughput and latency statistics for batch scoring runs.

use crate::types::score::RiskLevel;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for scoring runs
pub struct ScoringMetrics {
    /// Total records scored
    pub records_scored: AtomicU64,
    /// Records rejected by validation or inference errors
    pub records_rejected: AtomicU64,
    /// Scored records by risk level
    by_level: RwLock<HashMap<RiskLevel, u64>>,
    /// Per-record processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Score distribution in ten buckets of width 10
    score_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

impl ScoringMetrics {
    pub fn new() -> Self {
        Self {
            records_scored: AtomicU64::new(0),
            records_rejected: AtomicU64::new(0),
            by_level: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a scored applicant
    pub fn record_score(&self, processing_time: Duration, score: u8, risk_level: RiskLevel) {
        self.records_scored.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only last 10000
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        let bucket = (score as usize / 10).min(9);
        if let Ok(mut buckets) = self.score_buckets.write() {
            buckets[bucket] += 1;
        }

        if let Ok(mut by_level) = self.by_level.write() {
            *by_level.entry(risk_level).or_insert(0) += 1;
        }
    }

    pub fn record_rejection(&self) {
        self.records_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let Ok(times) = self.processing_times.read() else {
            return ProcessingStats::default();
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();
        let percentile = |p: f64| sorted[((count as f64 * p) as usize).min(count - 1)];

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Records scored per second since creation
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.records_scored.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_score_distribution(&self) -> [u64; 10] {
        self.score_buckets.read().map(|b| *b).unwrap_or_default()
    }

    pub fn get_counts_by_level(&self) -> HashMap<RiskLevel, u64> {
        self.by_level.read().map(|m| m.clone()).unwrap_or_default()
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let scored = self.records_scored.load(Ordering::Relaxed);
        let rejected = self.records_rejected.load(Ordering::Relaxed);
        let processing = self.get_processing_stats();
        let by_level = self.get_counts_by_level();
        let score_dist = self.get_score_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║               CREDIT SCORING - METRICS SUMMARY               ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Records Scored: {:>8}  │  Rejected: {:>6}  │  {:>7.1} rec/s ║",
            scored,
            rejected,
            self.get_throughput()
        );
        info!(
            "║ Processing Time (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Risk Levels:                                                 ║");
        for level in [RiskLevel::High, RiskLevel::Medium, RiskLevel::Low] {
            let count = by_level.get(&level).copied().unwrap_or(0);
            let pct = if scored > 0 {
                (count as f64 / scored as f64) * 100.0
            } else {
                0.0
            };
            info!("║   {:12}: {:>6} ({:>5.1}%)", level.as_str(), count, pct);
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Score Distribution:                                          ║");
        let total: u64 = score_dist.iter().sum();
        for (i, &count) in score_dist.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar: String = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:>3}-{:<3}: {:>6} ({:>5.1}%) {}",
                i * 10,
                if i == 9 { 100 } else { i * 10 + 9 },
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for ScoringMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = ScoringMetrics::new();

        metrics.record_score(Duration::from_micros(100), 35, RiskLevel::High);
        metrics.record_score(Duration::from_micros(300), 85, RiskLevel::Low);
        metrics.record_score(Duration::from_micros(200), 100, RiskLevel::Low);
        metrics.record_rejection();

        assert_eq!(metrics.records_scored.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.records_rejected.load(Ordering::Relaxed), 1);

        let by_level = metrics.get_counts_by_level();
        assert_eq!(by_level.get(&RiskLevel::Low), Some(&2));
        assert_eq!(by_level.get(&RiskLevel::Medium), None);

        let dist = metrics.get_score_distribution();
        assert_eq!(dist[3], 1);
        assert_eq!(dist[8], 1);
        assert_eq!(dist[9], 1);
    }

    #[test]
    fn test_processing_stats() {
        let metrics = ScoringMetrics::new();
        for us in [100, 200, 300, 400] {
            metrics.record_score(Duration::from_micros(us), 50, RiskLevel::Medium);
        }

        let stats = metrics.get_processing_stats();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean_us, 250);
        assert_eq!(stats.p50_us, 300);
        assert_eq!(stats.max_us, 400);
    }

    #[test]
    fn test_empty_stats() {
        let metrics = ScoringMetrics::new();
        assert_eq!(metrics.get_processing_stats().count, 0);
    }
}

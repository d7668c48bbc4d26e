// src/quality/drift.rs — Quality degradation against a fixed baseline

use serde::{Deserialize, Serialize};

/// Summary statistics of a batch of quality scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityStats {
    pub mean: f64,
    pub median: f64,
    pub stdev: f64,
    pub count: usize,
}

impl QualityStats {
    /// `None` for an empty batch. Non-finite scores are ignored.
    pub fn from_scores(scores: &[f64]) -> Option<Self> {
        let mut values: Vec<f64> = scores.iter().copied().filter(|s| s.is_finite()).collect();
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let n = values.len();
        let mean = values.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 0 {
            (values[n / 2 - 1] + values[n / 2]) / 2.0
        } else {
            values[n / 2]
        };
        let stdev = if n < 2 {
            0.0
        } else {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
        };

        Some(Self {
            mean,
            median,
            stdev,
            count: n,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub drift_detected: bool,
    /// `baseline.mean − current.mean`; positive means quality dropped.
    pub degradation: f64,
    pub baseline: QualityStats,
    pub current: QualityStats,
    pub recommend_retrain: bool,
    /// True when this batch became the baseline.
    pub baseline_established: bool,
}

/// Compares each batch to a baseline captured once (first batch or explicit reset).
#[derive(Debug, Clone)]
pub struct DriftDetector {
    threshold: f64,
    baseline: Option<QualityStats>,
}

impl DriftDetector {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            baseline: None,
        }
    }

    pub fn baseline(&self) -> Option<&QualityStats> {
        self.baseline.as_ref()
    }

    /// Explicitly set the baseline from a reference batch.
    pub fn set_baseline(&mut self, scores: &[f64]) -> Option<QualityStats> {
        self.baseline = QualityStats::from_scores(scores);
        self.baseline
    }

    /// Forget the baseline; the next batch establishes a new one.
    pub fn reset(&mut self) {
        self.baseline = None;
    }

    /// Check a batch. `None` when the batch is empty.
    pub fn check(&mut self, scores: &[f64]) -> Option<DriftReport> {
        let current = QualityStats::from_scores(scores)?;

        let Some(baseline) = self.baseline else {
            self.baseline = Some(current);
            tracing::info!(
                "Quality baseline established: mean {:.3} over {} scores",
                current.mean,
                current.count
            );
            return Some(DriftReport {
                drift_detected: false,
                degradation: 0.0,
                baseline: current,
                current,
                recommend_retrain: false,
                baseline_established: true,
            });
        };

        let degradation = baseline.mean - current.mean;
        let drift_detected = degradation > self.threshold;
        if drift_detected {
            tracing::warn!(
                "Quality drift: mean {:.3} vs baseline {:.3} (degradation {:.3} > {:.3}); retrain recommended",
                current.mean,
                baseline.mean,
                degradation,
                self.threshold
            );
        }

        Some(DriftReport {
            drift_detected,
            degradation,
            baseline,
            current,
            recommend_retrain: drift_detected,
            baseline_established: false,
        })
    }
}

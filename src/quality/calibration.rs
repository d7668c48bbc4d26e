// src/quality/calibration.rs — Pattern confidence calibrator

use std::collections::HashMap;

use crate::core::types::{Pattern, PatternType};

const BIN_COUNT: usize = 10;

/// Pseudo-observations given to the raw confidence when blending.
const PRIOR_STRENGTH: f64 = 5.0;

/// Calibrates detector confidence against how often users accepted patterns
/// of similar raw confidence.
#[derive(Debug, Clone)]
pub struct ConfidenceCalibrator {
    min_samples: u32,
    /// Outcome counts per pattern type, binned by raw confidence.
    history: HashMap<PatternType, [OutcomeBin; BIN_COUNT]>,
}

/// Accept/total counts for one confidence bin.
#[derive(Debug, Clone, Copy, Default)]
struct OutcomeBin {
    accepted: u32,
    total: u32,
}

impl OutcomeBin {
    fn acceptance_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.accepted as f64 / self.total as f64
    }
}

fn bin_for(raw_confidence: f64) -> usize {
    let clamped = if raw_confidence.is_finite() {
        raw_confidence.clamp(0.0, 1.0)
    } else {
        0.0
    };
    ((clamped * BIN_COUNT as f64) as usize).min(BIN_COUNT - 1)
}

impl Default for ConfidenceCalibrator {
    fn default() -> Self {
        Self::new(5)
    }
}

impl ConfidenceCalibrator {
    pub fn new(min_samples: u32) -> Self {
        Self {
            min_samples: min_samples.max(1),
            history: HashMap::new(),
        }
    }

    /// Record the outcome of a pattern shown to the user.
    pub fn record(&mut self, pattern_type: PatternType, raw_confidence: f64, accepted: bool) {
        let bins = self.history.entry(pattern_type).or_default();
        let bin = &mut bins[bin_for(raw_confidence)];
        bin.total += 1;
        if accepted {
            bin.accepted += 1;
        }
    }

    /// Calibrated confidence, or `None` while the bin has too little data.
    pub fn calibrated_confidence(&self, pattern_type: PatternType, raw_confidence: f64) -> Option<f64> {
        let bin = self.history.get(&pattern_type)?[bin_for(raw_confidence)];
        if bin.total < self.min_samples {
            return None;
        }
        let blended = (bin.accepted as f64 + PRIOR_STRENGTH * raw_confidence)
            / (bin.total as f64 + PRIOR_STRENGTH);
        Some(blended.clamp(0.0, 1.0))
    }

    /// A calibrated copy of the pattern; passthrough when there is not enough data.
    pub fn calibrate(&self, pattern: &Pattern) -> Pattern {
        match self.calibrated_confidence(pattern.pattern_type, pattern.raw_confidence) {
            Some(confidence) => pattern.with_calibrated_confidence(confidence),
            None => pattern.clone(),
        }
    }

    pub fn stats(&self, pattern_type: PatternType) -> Option<CalibrationStats> {
        self.history.get(&pattern_type).map(|bins| {
            let total: u32 = bins.iter().map(|b| b.total).sum();
            let accepted: u32 = bins.iter().map(|b| b.accepted).sum();
            CalibrationStats {
                total,
                acceptance_rate: OutcomeBin { accepted, total }.acceptance_rate(),
                calibrated_bins: bins.iter().filter(|b| b.total >= self.min_samples).count(),
            }
        })
    }
}

/// Summary of calibration data for one pattern type.
#[derive(Debug, Clone)]
pub struct CalibrationStats {
    pub total: u32,
    pub acceptance_rate: f64,
    pub calibrated_bins: usize,
}

// src/quality/learning_loop.rs — Long-lived quality state shared across runs

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::calibration::ConfidenceCalibrator;
use super::drift::{DriftDetector, DriftReport};
use super::hitl::{CorrectionModel, HitlCorrector};
use super::learner::{Learner, LearnerUpdate};
use super::scorer::QualityScorer;
use super::weights::QualityWeights;
use crate::core::types::{FeedbackSubject, QualityComponents, QualityFeedback};
use crate::infra::config::QualityConfig;
use crate::infra::errors::HearthError;

/// What a scoring pass needs; cheap to clone.
#[derive(Debug, Clone, PartialEq)]
pub struct LearningSnapshot {
    pub weights: QualityWeights,
    pub correction: Option<CorrectionModel>,
}

impl LearningSnapshot {
    pub fn scorer(&self) -> QualityScorer {
        QualityScorer::ensemble(self.weights, self.correction.clone())
    }
}

/// Weights, feedback history, drift baseline, expert corrections and
/// calibration data. The caller owns its lifecycle and persistence.
pub struct LearningLoop {
    learner: Learner,
    drift: DriftDetector,
    hitl: HitlCorrector,
    calibrator: ConfidenceCalibrator,
}

impl LearningLoop {
    pub fn new(config: &QualityConfig) -> Result<Self, HearthError> {
        Ok(Self {
            learner: Learner::new(config.weights, config.learning_rate, config.batch_size)?,
            drift: DriftDetector::new(config.drift_threshold),
            hitl: HitlCorrector::new(
                config.quality_threshold,
                config.hitl_min_samples,
                config.max_correction,
            ),
            calibrator: ConfidenceCalibrator::new(config.calibration_min_samples),
        })
    }

    pub fn snapshot(&self) -> LearningSnapshot {
        LearningSnapshot {
            weights: self.learner.weights(),
            correction: self.hitl.model().cloned(),
        }
    }

    pub fn learner(&self) -> &Learner {
        &self.learner
    }

    pub fn calibrator(&self) -> &ConfidenceCalibrator {
        &self.calibrator
    }

    pub fn hitl(&self) -> &HitlCorrector {
        &self.hitl
    }

    pub fn drift(&self) -> &DriftDetector {
        &self.drift
    }

    /// The single weight-mutating operation. Pattern feedback also feeds calibration.
    pub fn ingest_feedback(&mut self, feedback: QualityFeedback) -> Result<LearnerUpdate, HearthError> {
        let calibration = feedback
            .pattern_type
            .zip(feedback.raw_confidence)
            .map(|(pt, raw)| (pt, raw, feedback.actual_outcome));

        let update = self.learner.update(feedback)?;
        if let Some((pattern_type, raw, accepted)) = calibration {
            self.calibrator.record(pattern_type, raw, accepted);
        }
        Ok(update)
    }

    pub fn check_drift(&mut self, scores: &[f64]) -> Option<DriftReport> {
        self.drift.check(scores)
    }

    pub fn reset_drift_baseline(&mut self) {
        self.drift.reset();
    }

    /// `review_key` names the relationship, stable across runs.
    pub fn flag_for_review(
        &mut self,
        review_key: &str,
        subject: FeedbackSubject,
        predicted_quality: f64,
        components: QualityComponents,
    ) -> bool {
        self.hitl.flag(review_key, subject, predicted_quality, components)
    }

    /// Record an expert verdict and refit the correction when enough samples exist.
    pub fn record_expert_review(
        &mut self,
        subject_id: &str,
        expert_score: f64,
    ) -> Result<Option<CorrectionModel>, HearthError> {
        self.hitl.record_review(subject_id, expert_score)?;
        let weights = self.learner.weights();
        Ok(self.hitl.retrain(&weights)?.cloned())
    }
}

/// `LearningLoop` behind a lock: many readers, one writer.
#[derive(Clone)]
pub struct SharedLearningLoop {
    inner: Arc<RwLock<LearningLoop>>,
}

impl SharedLearningLoop {
    pub fn new(learning_loop: LearningLoop) -> Self {
        Self {
            inner: Arc::new(RwLock::new(learning_loop)),
        }
    }

    pub fn read(&self) -> Result<RwLockReadGuard<'_, LearningLoop>, HearthError> {
        self.inner
            .read()
            .map_err(|_| HearthError::Other(anyhow::anyhow!("learning loop lock poisoned")))
    }

    pub fn write(&self) -> Result<RwLockWriteGuard<'_, LearningLoop>, HearthError> {
        self.inner
            .write()
            .map_err(|_| HearthError::Other(anyhow::anyhow!("learning loop lock poisoned")))
    }

    pub fn snapshot(&self) -> Result<LearningSnapshot, HearthError> {
        Ok(self.read()?.snapshot())
    }

    /// Scoring snapshot plus a copy of the calibrator, so a run can mine
    /// without holding the lock.
    pub fn run_state(&self) -> Result<(LearningSnapshot, ConfidenceCalibrator), HearthError> {
        let guard = self.read()?;
        Ok((guard.snapshot(), guard.calibrator().clone()))
    }

    pub fn ingest_feedback(&self, feedback: QualityFeedback) -> Result<LearnerUpdate, HearthError> {
        self.write()?.ingest_feedback(feedback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Pattern, TimeRange};

    fn components() -> QualityComponents {
        QualityComponents {
            confidence: 0.7,
            frequency: 0.6,
            temporal: 0.9,
            relationship: 0.5,
        }
    }

    #[test]
    fn test_pattern_feedback_feeds_calibration() {
        let mut lp = LearningLoop::new(&QualityConfig::default()).unwrap();
        let pattern = Pattern::time_of_day(
            "light.kitchen",
            0.9,
            10,
            TimeRange {
                start_minute: 420,
                end_minute: 480,
                peak_minute: 421.0,
            },
        );
        for _ in 0..5 {
            let fb = QualityFeedback::new(
                FeedbackSubject::Pattern(pattern.pattern_id.clone()),
                0.8,
                components(),
                false,
            )
            .for_pattern(&pattern);
            lp.ingest_feedback(fb).unwrap();
        }
        let calibrated = lp.calibrator().calibrate(&pattern);
        assert!(calibrated.calibrated);
        assert!(calibrated.confidence < pattern.confidence);
        assert_eq!(lp.learner().archive().len(), 5);
    }

    #[test]
    fn test_expert_reviews_build_correction() {
        let mut lp = LearningLoop::new(&QualityConfig::default()).unwrap();
        let mut last = None;
        for i in 0..10 {
            let id = format!("s-{i}");
            assert!(lp.flag_for_review(&id, FeedbackSubject::Synergy(id.clone()), 0.3, components()));
            last = lp.record_expert_review(&id, 0.5).unwrap();
        }
        let model = last.unwrap();
        assert!((model.mean_error - 0.2).abs() < 1e-9);
        assert_eq!(lp.snapshot().correction, Some(model));
    }

    #[test]
    fn test_run_state_is_detached_from_the_loop() {
        let shared = SharedLearningLoop::new(LearningLoop::new(&QualityConfig::default()).unwrap());
        let pattern = Pattern::time_of_day(
            "light.kitchen",
            0.9,
            10,
            TimeRange {
                start_minute: 420,
                end_minute: 480,
                peak_minute: 421.0,
            },
        );
        let (snapshot, calibrator) = shared.run_state().unwrap();

        // Writers are not blocked while the copy is in use
        for _ in 0..5 {
            let fb = QualityFeedback::new(
                FeedbackSubject::Pattern(pattern.pattern_id.clone()),
                0.8,
                components(),
                false,
            )
            .for_pattern(&pattern);
            shared.ingest_feedback(fb).unwrap();
        }

        assert!(!calibrator.calibrate(&pattern).calibrated);
        assert!(shared.read().unwrap().calibrator().calibrate(&pattern).calibrated);
        assert!(snapshot != shared.snapshot().unwrap());
    }

    #[test]
    fn test_shared_loop_serializes_writes() {
        let shared = SharedLearningLoop::new(LearningLoop::new(&QualityConfig::default()).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        let fb = QualityFeedback::new(
                            FeedbackSubject::Synergy(format!("{t}-{i}")),
                            0.5,
                            components(),
                            i % 2 == 0,
                        );
                        shared.ingest_feedback(fb).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let guard = shared.read().unwrap();
        assert_eq!(guard.learner().archive().len(), 100);
        assert!((guard.snapshot().weights.sum() - 1.0).abs() < 1e-6);
    }
}

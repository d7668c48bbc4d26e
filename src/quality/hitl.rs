// src/quality/hitl.rs — Expert review queue and score correction

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::weights::{component_array, components_from_array, QualityWeights};
use crate::core::types::{FeedbackSubject, QualityComponents};
use crate::infra::errors::HearthError;

/// A low-quality discovery waiting for an expert verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewItem {
    /// Stable identity of the reviewed relationship, the same across runs.
    pub review_key: String,
    /// The latest discovery record for that relationship.
    pub subject: FeedbackSubject,
    pub predicted_quality: f64,
    pub components: QualityComponents,
    pub flagged_at: DateTime<Utc>,
}

/// A (predicted, expert) pair used to fit the correction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExpertSample {
    pub predicted: f64,
    pub expert: f64,
}

/// Additive correction learned from expert reviews.
///
/// The mean signed error is split across components in proportion to their
/// weights; the total is clamped to ±`max_correction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionModel {
    pub version: u32,
    pub sample_count: usize,
    pub mean_error: f64,
    pub adjustments: QualityComponents,
    pub max_correction: f64,
    pub trained_at: DateTime<Utc>,
}

impl CorrectionModel {
    pub fn total_adjustment(&self) -> f64 {
        component_array(&self.adjustments)
            .iter()
            .sum::<f64>()
            .clamp(-self.max_correction, self.max_correction)
    }

    pub fn apply(&self, score: f64) -> f64 {
        (score + self.total_adjustment()).clamp(0.0, 1.0)
    }
}

/// Flags low scorers for review and maintains the correction model.
#[derive(Debug, Clone)]
pub struct HitlCorrector {
    quality_threshold: f64,
    min_samples: usize,
    max_correction: f64,
    queue: Vec<ReviewItem>,
    /// review_key -> position in `queue`
    positions: HashMap<String, usize>,
    samples: Vec<ExpertSample>,
    model: Option<CorrectionModel>,
    /// Sample count the current model was fit on.
    trained_on: usize,
}

impl HitlCorrector {
    pub fn new(quality_threshold: f64, min_samples: usize, max_correction: f64) -> Self {
        Self {
            quality_threshold,
            min_samples: min_samples.max(1),
            max_correction: max_correction.abs(),
            queue: Vec::new(),
            positions: HashMap::new(),
            samples: Vec::new(),
            model: None,
            trained_on: 0,
        }
    }

    /// Queue the relationship when it scores under the threshold. Returns whether it is flagged.
    ///
    /// One item per `review_key`: a later run refreshes the queued item in
    /// place, and a run that scores it above the threshold withdraws it.
    pub fn flag(
        &mut self,
        review_key: &str,
        subject: FeedbackSubject,
        predicted_quality: f64,
        components: QualityComponents,
    ) -> bool {
        let existing = self.positions.get(review_key).copied();
        if predicted_quality >= self.quality_threshold {
            if let Some(pos) = existing {
                self.remove_at(pos);
            }
            return false;
        }

        let item = ReviewItem {
            review_key: review_key.to_string(),
            subject,
            predicted_quality,
            components,
            flagged_at: Utc::now(),
        };
        match existing {
            Some(pos) => self.queue[pos] = item,
            None => {
                self.positions.insert(item.review_key.clone(), self.queue.len());
                self.queue.push(item);
            }
        }
        true
    }

    pub fn pending_reviews(&self) -> &[ReviewItem] {
        &self.queue
    }

    /// Resolve a queued item with the expert's quality verdict. `id` is the
    /// subject id of the latest record or the review key.
    pub fn record_review(&mut self, id: &str, expert_score: f64) -> Result<(), HearthError> {
        validate_unit(expert_score, "expert score")?;
        let pos = self
            .positions
            .get(id)
            .copied()
            .or_else(|| self.queue.iter().position(|item| item.subject.id() == id))
            .ok_or_else(|| HearthError::InvalidFeedback(format!("'{id}' is not awaiting review")))?;
        let item = self.remove_at(pos);
        self.samples.push(ExpertSample {
            predicted: item.predicted_quality,
            expert: expert_score,
        });
        Ok(())
    }

    fn remove_at(&mut self, pos: usize) -> ReviewItem {
        let item = self.queue.remove(pos);
        self.positions.remove(&item.review_key);
        for (i, later) in self.queue.iter().enumerate().skip(pos) {
            self.positions.insert(later.review_key.clone(), i);
        }
        item
    }

    /// Record a pair that did not go through the queue (e.g. imported audits).
    pub fn record_sample(&mut self, predicted: f64, expert: f64) -> Result<(), HearthError> {
        validate_unit(predicted, "predicted score")?;
        validate_unit(expert, "expert score")?;
        self.samples.push(ExpertSample { predicted, expert });
        Ok(())
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn model(&self) -> Option<&CorrectionModel> {
        self.model.as_ref()
    }

    /// Refit once enough samples exist and new ones arrived since the last fit.
    /// The previous model stays in place unless the new one is valid.
    pub fn retrain(&mut self, weights: &QualityWeights) -> Result<Option<&CorrectionModel>, HearthError> {
        if self.samples.len() < self.min_samples || self.samples.len() == self.trained_on {
            return Ok(self.model.as_ref());
        }

        let n = self.samples.len() as f64;
        let mean_error = self.samples.iter().map(|s| s.expert - s.predicted).sum::<f64>() / n;
        let weights = weights.normalized()?;
        let adjustments = weights.as_array().map(|w| mean_error * w);

        if !mean_error.is_finite() || adjustments.iter().any(|a| !a.is_finite()) {
            return Err(HearthError::InvalidFeedback(
                "correction model did not converge to finite values".into(),
            ));
        }

        let version = self.model.as_ref().map(|m| m.version + 1).unwrap_or(1);
        self.model = Some(CorrectionModel {
            version,
            sample_count: self.samples.len(),
            mean_error,
            adjustments: components_from_array(adjustments),
            max_correction: self.max_correction,
            trained_at: Utc::now(),
        });
        self.trained_on = self.samples.len();
        tracing::info!(
            "HITL correction v{} fit on {} samples (mean error {:+.3})",
            version,
            self.trained_on,
            mean_error
        );
        Ok(self.model.as_ref())
    }
}

fn validate_unit(value: f64, what: &str) -> Result<(), HearthError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(HearthError::InvalidFeedback(format!(
            "{what} must be within [0, 1], got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corrector() -> HitlCorrector {
        HitlCorrector::new(0.5, 10, 0.15)
    }

    fn flag(h: &mut HitlCorrector, key: &str, id: &str, score: f64) -> bool {
        h.flag(key, FeedbackSubject::Synergy(id.into()), score, QualityComponents::default())
    }

    #[test]
    fn test_flags_only_low_scores() {
        let mut h = corrector();
        assert!(flag(&mut h, "a", "a", 0.3));
        assert!(!flag(&mut h, "b", "b", 0.8));
        // Re-flagging does not duplicate
        assert!(flag(&mut h, "a", "a", 0.3));
        assert_eq!(h.pending_reviews().len(), 1);
    }

    #[test]
    fn test_same_relationship_across_runs_is_one_item() {
        let mut h = corrector();
        for run in 0..5 {
            assert!(flag(&mut h, "hall|light", &format!("run{run}-a"), 0.4));
            assert!(flag(&mut h, "den|cover", &format!("run{run}-b"), 0.3));
        }
        let pending = h.pending_reviews();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].subject.id(), "run4-a");
        assert_eq!(pending[1].subject.id(), "run4-b");

        // Resolvable by the latest id or by the key
        h.record_review("run4-a", 0.5).unwrap();
        h.record_review("den|cover", 0.5).unwrap();
        assert!(h.pending_reviews().is_empty());
        assert_eq!(h.sample_count(), 2);
    }

    #[test]
    fn test_improved_relationship_is_withdrawn() {
        let mut h = corrector();
        flag(&mut h, "x", "x1", 0.2);
        flag(&mut h, "y", "y1", 0.2);
        flag(&mut h, "z", "z1", 0.2);
        assert!(!flag(&mut h, "x", "x2", 0.9));
        assert_eq!(h.pending_reviews().len(), 2);
        // Positions stay consistent after the removal
        h.record_review("z", 0.4).unwrap();
        assert_eq!(h.pending_reviews()[0].review_key, "y");
    }

    #[test]
    fn test_record_review_moves_to_samples() {
        let mut h = corrector();
        h.flag("p", FeedbackSubject::Pattern("p".into()), 0.2, QualityComponents::default());
        h.record_review("p", 0.6).unwrap();
        assert!(h.pending_reviews().is_empty());
        assert_eq!(h.sample_count(), 1);
        assert!(h.record_review("p", 0.6).is_err());
        assert!(h.record_review("other", 1.5).is_err());
    }

    #[test]
    fn test_no_model_below_min_samples() {
        let mut h = corrector();
        for _ in 0..9 {
            h.record_sample(0.4, 0.5).unwrap();
        }
        assert!(h.retrain(&QualityWeights::default()).unwrap().is_none());
    }

    #[test]
    fn test_model_apportions_by_weight() {
        let mut h = corrector();
        for _ in 0..10 {
            h.record_sample(0.4, 0.5).unwrap();
        }
        let model = h.retrain(&QualityWeights::default()).unwrap().unwrap().clone();
        assert_eq!(model.version, 1);
        assert!((model.mean_error - 0.1).abs() < 1e-9);
        assert!((model.adjustments.confidence - 0.04).abs() < 1e-9);
        assert!((model.adjustments.relationship - 0.01).abs() < 1e-9);
        assert!((model.apply(0.5) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_correction_is_clamped() {
        let mut h = corrector();
        for _ in 0..10 {
            h.record_sample(0.0, 1.0).unwrap();
        }
        let model = h.retrain(&QualityWeights::default()).unwrap().unwrap();
        assert!((model.total_adjustment() - 0.15).abs() < 1e-9);
        assert_eq!(model.apply(0.95), 1.0);
    }

    #[test]
    fn test_retrain_is_incremental() {
        let mut h = corrector();
        for _ in 0..10 {
            h.record_sample(0.4, 0.5).unwrap();
        }
        h.retrain(&QualityWeights::default()).unwrap();
        // Nothing new: same model
        let v = h.retrain(&QualityWeights::default()).unwrap().unwrap().version;
        assert_eq!(v, 1);
        h.record_sample(0.5, 0.5).unwrap();
        let v = h.retrain(&QualityWeights::default()).unwrap().unwrap().version;
        assert_eq!(v, 2);
    }

    #[test]
    fn test_failed_retrain_keeps_old_model() {
        let mut h = corrector();
        for _ in 0..10 {
            h.record_sample(0.4, 0.5).unwrap();
        }
        h.retrain(&QualityWeights::default()).unwrap();
        h.record_sample(0.4, 0.5).unwrap();
        let zero = QualityWeights::from_array([0.0; 4]);
        assert!(h.retrain(&zero).is_err());
        assert_eq!(h.model().unwrap().version, 1);
    }
}

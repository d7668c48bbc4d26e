// src/quality/learner.rs — Feedback-driven weight adjustment

use serde::{Deserialize, Serialize};

use super::weights::{component_array, QualityWeights};
use crate::core::types::QualityFeedback;
use crate::infra::errors::HearthError;

/// Result of feeding one feedback record to the learner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearnerUpdate {
    pub weights: QualityWeights,
    /// Whether this record completed a batch and moved the weights.
    pub applied: bool,
    pub reward: f64,
    pub cumulative_reward: f64,
}

/// Owns the ensemble weights and adjusts them from accept/reject feedback.
///
/// Each record contributes `gradient = (predicted − actual) × component`;
/// gradients are averaged over `batch_size` records before
/// `weight -= learning_rate × gradient` and renormalization.
#[derive(Debug, Clone)]
pub struct Learner {
    weights: QualityWeights,
    learning_rate: f64,
    batch_size: usize,
    pending: Vec<QualityFeedback>,
    archive: Vec<QualityFeedback>,
    cumulative_reward: f64,
    updates: u64,
}

impl Learner {
    pub fn new(
        initial: QualityWeights,
        learning_rate: f64,
        batch_size: usize,
    ) -> Result<Self, HearthError> {
        if !learning_rate.is_finite() || learning_rate < 0.0 {
            return Err(HearthError::Config(format!(
                "learning_rate must be a non-negative number, got {learning_rate}"
            )));
        }
        Ok(Self {
            weights: initial.normalized()?,
            learning_rate,
            batch_size: batch_size.max(1),
            pending: Vec::new(),
            archive: Vec::new(),
            cumulative_reward: 0.0,
            updates: 0,
        })
    }

    pub fn weights(&self) -> QualityWeights {
        self.weights
    }

    pub fn cumulative_reward(&self) -> f64 {
        self.cumulative_reward
    }

    pub fn update_count(&self) -> u64 {
        self.updates
    }

    /// Consumed feedback, oldest first.
    pub fn archive(&self) -> &[QualityFeedback] {
        &self.archive
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Reject feedback the update rule cannot use.
    pub fn validate(feedback: &QualityFeedback) -> Result<(), HearthError> {
        if !feedback.predicted_quality.is_finite()
            || !(0.0..=1.0).contains(&feedback.predicted_quality)
        {
            return Err(HearthError::InvalidFeedback(format!(
                "predicted_quality must be within [0, 1], got {}",
                feedback.predicted_quality
            )));
        }
        Ok(())
    }

    /// Consume one feedback record. On a normalization failure the previous
    /// weights stay in effect and the error is returned.
    pub fn update(&mut self, feedback: QualityFeedback) -> Result<LearnerUpdate, HearthError> {
        Self::validate(&feedback)?;

        let reward = feedback.reward();
        self.cumulative_reward += reward;
        self.pending.push(feedback);

        if self.pending.len() < self.batch_size {
            return Ok(LearnerUpdate {
                weights: self.weights,
                applied: false,
                reward,
                cumulative_reward: self.cumulative_reward,
            });
        }

        let batch: Vec<QualityFeedback> = self.pending.drain(..).collect();
        let result = self.apply_batch(&batch);
        self.archive.extend(batch);
        let weights = result?;

        Ok(LearnerUpdate {
            weights,
            applied: true,
            reward,
            cumulative_reward: self.cumulative_reward,
        })
    }

    fn apply_batch(&mut self, batch: &[QualityFeedback]) -> Result<QualityWeights, HearthError> {
        let n = batch.len() as f64;
        let mut gradient = [0.0f64; 4];
        for fb in batch {
            let actual = if fb.actual_outcome { 1.0 } else { 0.0 };
            let error = fb.predicted_quality - actual;
            for (g, c) in gradient.iter_mut().zip(component_array(&fb.components)) {
                *g += error * c / n;
            }
        }

        let mut next = self.weights.as_array();
        for (w, g) in next.iter_mut().zip(gradient) {
            *w -= self.learning_rate * g;
        }
        let next = QualityWeights::from_array(next).normalized()?;

        self.weights = next;
        self.updates += 1;
        tracing::debug!(
            "Learner update #{}: weights = [{:.3}, {:.3}, {:.3}, {:.3}]",
            self.updates,
            next.confidence,
            next.frequency,
            next.temporal,
            next.relationship
        );
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{FeedbackSubject, QualityComponents};

    fn feedback(predicted: f64, accepted: bool, c: [f64; 4]) -> QualityFeedback {
        QualityFeedback::new(
            FeedbackSubject::Synergy("s".into()),
            predicted,
            QualityComponents {
                confidence: c[0],
                frequency: c[1],
                temporal: c[2],
                relationship: c[3],
            },
            accepted,
        )
    }

    #[test]
    fn test_weights_stay_normalized() {
        let mut learner = Learner::new(QualityWeights::default(), 0.1, 1).unwrap();
        for i in 0..50 {
            let accepted = i % 3 != 0;
            let out = learner
                .update(feedback(0.6, accepted, [0.9, 0.2, 0.8, 0.5]))
                .unwrap();
            assert!((out.weights.sum() - 1.0).abs() < 1e-6);
            assert!(out.applied);
        }
        assert_eq!(learner.archive().len(), 50);
    }

    #[test]
    fn test_accepted_feedback_raises_strong_component() {
        let mut learner = Learner::new(QualityWeights::default(), 0.1, 1).unwrap();
        let before = learner.weights();
        // Under-predicted and accepted; confidence was the strong signal.
        learner.update(feedback(0.3, true, [1.0, 0.0, 0.0, 0.0])).unwrap();
        assert!(learner.weights().confidence > before.confidence);
    }

    #[test]
    fn test_rejected_feedback_lowers_strong_component() {
        let mut learner = Learner::new(QualityWeights::default(), 0.1, 1).unwrap();
        let before = learner.weights();
        learner.update(feedback(0.8, false, [0.0, 1.0, 0.0, 0.0])).unwrap();
        assert!(learner.weights().frequency < before.frequency);
    }

    #[test]
    fn test_rewards() {
        let mut learner = Learner::new(QualityWeights::default(), 0.05, 1).unwrap();
        let a = learner.update(feedback(0.5, true, [0.5; 4])).unwrap();
        assert_eq!(a.reward, 1.0);
        let b = learner.update(feedback(0.5, false, [0.5; 4])).unwrap();
        assert_eq!(b.reward, -0.5);
        assert!((learner.cumulative_reward() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_mini_batch_waits_for_full_batch() {
        let mut learner = Learner::new(QualityWeights::default(), 0.1, 3).unwrap();
        let before = learner.weights();
        let first = learner.update(feedback(0.2, true, [1.0, 0.0, 0.0, 0.0])).unwrap();
        assert!(!first.applied);
        assert_eq!(first.weights, before);
        learner.update(feedback(0.2, true, [1.0, 0.0, 0.0, 0.0])).unwrap();
        assert_eq!(learner.pending(), 2);
        let third = learner.update(feedback(0.2, true, [1.0, 0.0, 0.0, 0.0])).unwrap();
        assert!(third.applied);
        assert_eq!(learner.pending(), 0);
        assert_eq!(learner.update_count(), 1);
        assert!(third.weights.confidence > before.confidence);
    }

    #[test]
    fn test_rejects_out_of_range_prediction() {
        let mut learner = Learner::new(QualityWeights::default(), 0.1, 1).unwrap();
        assert!(learner.update(feedback(1.5, true, [0.5; 4])).is_err());
        assert!(learner.archive().is_empty());
    }

    #[test]
    fn test_collapsing_weights_keep_previous() {
        let start = QualityWeights::from_array([1.0, 0.0, 0.0, 0.0]);
        let mut learner = Learner::new(start, 5.0, 1).unwrap();
        let err = learner
            .update(feedback(1.0, false, [1.0, 0.0, 0.0, 0.0]))
            .unwrap_err();
        assert!(matches!(err, HearthError::WeightsNotNormalizable { .. }));
        assert_eq!(learner.weights(), start);
        assert_eq!(learner.archive().len(), 1);
    }

    #[test]
    fn test_invalid_initial_weights() {
        assert!(Learner::new(QualityWeights::from_array([0.0; 4]), 0.1, 1).is_err());
        assert!(Learner::new(QualityWeights::default(), -1.0, 1).is_err());
    }
}

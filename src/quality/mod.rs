// src/quality/mod.rs — Quality scoring and the feedback learning loop

pub mod calibration;
pub mod drift;
pub mod hitl;
pub mod learner;
pub mod learning_loop;
pub mod scorer;
pub mod weights;

pub use calibration::ConfidenceCalibrator;
pub use drift::{DriftDetector, DriftReport, QualityStats};
pub use hitl::{CorrectionModel, HitlCorrector, ReviewItem};
pub use learner::{Learner, LearnerUpdate};
pub use learning_loop::{LearningLoop, LearningSnapshot, SharedLearningLoop};
pub use scorer::{
    BaselineModel, CorrectedModel, EnsembleModel, QualityModel, QualityScorer, ScoredPattern,
    WeightedCombiner,
};
pub use weights::QualityWeights;

// src/index/mod.rs — Similarity index over relationship feature vectors

pub mod features;
pub mod flat;

pub use features::{RelationshipFeatures, FEATURE_DIMENSION};
pub use flat::{CorrelationVectorIndex, Neighbor};

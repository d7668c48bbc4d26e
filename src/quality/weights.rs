// src/quality/weights.rs — Ensemble component weights

use serde::{Deserialize, Serialize};

use crate::core::types::QualityComponents;
use crate::infra::errors::HearthError;

/// Below this the weights carry no usable signal.
const MIN_WEIGHT_SUM: f64 = 1e-9;

/// Weights of the four quality components. Always sums to 1.0 once normalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    pub confidence: f64,
    pub frequency: f64,
    pub temporal: f64,
    pub relationship: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            confidence: 0.40,
            frequency: 0.30,
            temporal: 0.20,
            relationship: 0.10,
        }
    }
}

impl QualityWeights {
    pub fn as_array(&self) -> [f64; 4] {
        [self.confidence, self.frequency, self.temporal, self.relationship]
    }

    pub fn from_array(values: [f64; 4]) -> Self {
        Self {
            confidence: values[0],
            frequency: values[1],
            temporal: values[2],
            relationship: values[3],
        }
    }

    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }

    /// Negative entries are floored at zero, then everything is scaled to sum to 1.0.
    pub fn normalized(&self) -> Result<Self, HearthError> {
        let floored = self.as_array().map(|w| if w.is_finite() { w.max(0.0) } else { 0.0 });
        let sum: f64 = floored.iter().sum();
        if !sum.is_finite() || sum < MIN_WEIGHT_SUM {
            return Err(HearthError::WeightsNotNormalizable { sum: self.sum() });
        }
        Ok(Self::from_array(floored.map(|w| w / sum)))
    }

    /// Weighted sum of component values.
    pub fn apply(&self, components: &QualityComponents) -> f64 {
        self.as_array()
            .iter()
            .zip(component_array(components))
            .map(|(w, c)| w * c)
            .sum()
    }
}

pub fn component_array(c: &QualityComponents) -> [f64; 4] {
    [c.confidence, c.frequency, c.temporal, c.relationship]
}

pub fn components_from_array(values: [f64; 4]) -> QualityComponents {
    QualityComponents {
        confidence: values[0],
        frequency: values[1],
        temporal: values[2],
        relationship: values[3],
    }
}

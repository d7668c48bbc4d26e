// src/quality/scorer.rs — Ensemble quality scoring for patterns and synergies

use serde::{Deserialize, Serialize};

use super::hitl::CorrectionModel;
use super::weights::QualityWeights;
use crate::core::types::{
    DeviceRegistry, Pattern, PatternType, QualityComponents, QualityTier, SynergyOpportunity,
    SynergyType,
};

// ─── Components ─────────────────────────────────────────────────────────────

/// Step function over observation counts.
pub fn frequency_component(occurrences: u32) -> f64 {
    match occurrences {
        0 => 0.0,
        1..=2 => 0.3,
        3..=5 => 0.6,
        6..=10 => 0.8,
        _ => 1.0,
    }
}

pub fn pattern_temporal_component(pattern_type: PatternType) -> f64 {
    match pattern_type {
        PatternType::TimeOfDay => 0.9,
        PatternType::CoOccurrence => 0.8,
    }
}

pub fn synergy_temporal_component(synergy_type: SynergyType) -> f64 {
    match synergy_type {
        SynergyType::DevicePair => 0.8,
        SynergyType::DeviceChain => 0.7,
        SynergyType::EventContext => 0.9,
        SynergyType::EnergyContext => 0.75,
    }
}

pub fn relationship_component(same_area: bool) -> f64 {
    if same_area {
        0.5
    } else {
        0.3
    }
}

/// Single-device patterns count as same-area.
pub fn pattern_components(pattern: &Pattern, registry: &DeviceRegistry) -> QualityComponents {
    let same_area = match pattern.device_ids.as_slice() {
        [_] => true,
        [a, b, ..] => registry.same_area(a, b),
        [] => false,
    };
    QualityComponents {
        confidence: pattern.confidence.clamp(0.0, 1.0),
        frequency: frequency_component(pattern.occurrences),
        temporal: pattern_temporal_component(pattern.pattern_type),
        relationship: relationship_component(same_area),
    }
}

pub fn synergy_components(synergy: &SynergyOpportunity) -> QualityComponents {
    QualityComponents {
        confidence: synergy.confidence.clamp(0.0, 1.0),
        frequency: frequency_component(synergy.occurrences),
        temporal: synergy_temporal_component(synergy.synergy_type),
        relationship: relationship_component(synergy.context_metadata.same_area),
    }
}

// ─── Models ─────────────────────────────────────────────────────────────────

/// A strategy turning component values into a quality score.
pub trait QualityModel: Send + Sync {
    fn name(&self) -> &str;
    fn score(&self, components: &QualityComponents) -> f64;
}

/// Raw confidence only.
pub struct BaselineModel;

impl QualityModel for BaselineModel {
    fn name(&self) -> &str {
        "baseline"
    }

    fn score(&self, components: &QualityComponents) -> f64 {
        components.confidence
    }
}

/// Weighted sum of the four components.
pub struct EnsembleModel {
    weights: QualityWeights,
}

impl EnsembleModel {
    pub fn new(weights: QualityWeights) -> Self {
        Self { weights }
    }
}

impl QualityModel for EnsembleModel {
    fn name(&self) -> &str {
        "ensemble"
    }

    fn score(&self, components: &QualityComponents) -> f64 {
        self.weights.apply(components)
    }
}

/// Any model plus the expert-review correction.
pub struct CorrectedModel {
    base: Box<dyn QualityModel>,
    correction: CorrectionModel,
}

impl CorrectedModel {
    pub fn new(base: Box<dyn QualityModel>, correction: CorrectionModel) -> Self {
        Self { base, correction }
    }
}

impl QualityModel for CorrectedModel {
    fn name(&self) -> &str {
        "hitl_corrected"
    }

    fn score(&self, components: &QualityComponents) -> f64 {
        self.correction.apply(self.base.score(components))
    }
}

/// Weighted average of several models.
#[derive(Default)]
pub struct WeightedCombiner {
    members: Vec<(Box<dyn QualityModel>, f64)>,
}

impl WeightedCombiner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, model: Box<dyn QualityModel>, weight: f64) -> Self {
        if weight > 0.0 && weight.is_finite() {
            self.members.push((model, weight));
        }
        self
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl QualityModel for WeightedCombiner {
    fn name(&self) -> &str {
        "combined"
    }

    fn score(&self, components: &QualityComponents) -> f64 {
        let total: f64 = self.members.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return 0.0;
        }
        self.members
            .iter()
            .map(|(m, w)| m.score(components) * w)
            .sum::<f64>()
            / total
    }
}

// ─── Scorer ─────────────────────────────────────────────────────────────────

/// A pattern with its quality assessment. The pattern itself stays untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPattern {
    pub pattern: Pattern,
    pub quality_score: f64,
    pub quality_tier: QualityTier,
    pub components: QualityComponents,
}

/// Scores patterns and synergies with a pluggable model.
pub struct QualityScorer {
    model: Box<dyn QualityModel>,
}

impl QualityScorer {
    pub fn new(model: Box<dyn QualityModel>) -> Self {
        Self { model }
    }

    /// Ensemble with the given weights, corrected when a correction model exists.
    pub fn ensemble(weights: QualityWeights, correction: Option<CorrectionModel>) -> Self {
        let base: Box<dyn QualityModel> = Box::new(EnsembleModel::new(weights));
        let model: Box<dyn QualityModel> = match correction {
            Some(c) => Box::new(CorrectedModel::new(base, c)),
            None => base,
        };
        Self { model }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Score in [0, 1] and its tier.
    pub fn score(&self, components: &QualityComponents) -> (f64, QualityTier) {
        let raw = self.model.score(components);
        let score = if raw.is_finite() { raw.clamp(0.0, 1.0) } else { 0.0 };
        (score, QualityTier::from_score(score))
    }

    pub fn score_pattern(&self, pattern: &Pattern, registry: &DeviceRegistry) -> ScoredPattern {
        let components = pattern_components(pattern, registry);
        let (quality_score, quality_tier) = self.score(&components);
        ScoredPattern {
            pattern: pattern.clone(),
            quality_score,
            quality_tier,
            components,
        }
    }

    /// Fill in `quality_score` / `quality_tier`; returns the components used.
    pub fn score_synergy(&self, synergy: &mut SynergyOpportunity) -> QualityComponents {
        let components = synergy_components(synergy);
        let (score, tier) = self.score(&components);
        synergy.quality_score = score;
        synergy.quality_tier = tier;
        components
    }
}

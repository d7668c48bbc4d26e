// src/synergy/enrichers/mod.rs — Signals that support or veto a candidate

pub mod capability;
pub mod energy;
pub mod spatial;
pub mod temporal;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::types::{DeviceRegistry, HomeType, Pattern, PatternType, SynergyType};
use crate::index::flat::CorrelationVectorIndex;
use crate::infra::config::SynergyConfig;
use crate::infra::errors::HearthError;
use crate::synergy::candidates::SynergyCandidate;

pub use capability::{CapabilityEnricher, CapabilityProvider, DeviceCapabilities, RegistryCapabilities};
pub use energy::EnergyEnricher;
pub use spatial::SpatialEnricher;
pub use temporal::TemporalEnricher;

/// Everything an enricher may look at. Read-only for the whole detection pass.
pub struct EnrichmentContext<'a> {
    pub registry: &'a DeviceRegistry,
    pub home_type: HomeType,
    pub patterns: &'a [Pattern],
    pub index: Option<&'a CorrelationVectorIndex>,
    pub config: &'a SynergyConfig,
}

impl<'a> EnrichmentContext<'a> {
    /// The co-occurrence pattern with this exact direction, if mined.
    pub fn co_occurrence(&self, trigger: &str, action: &str) -> Option<&'a Pattern> {
        self.patterns.iter().find(|p| {
            p.pattern_type == PatternType::CoOccurrence
                && p.device_ids.len() == 2
                && p.device_ids[0] == trigger
                && p.device_ids[1] == action
        })
    }

    pub fn time_of_day(&self, device_id: &str) -> Vec<&'a Pattern> {
        self.patterns
            .iter()
            .filter(|p| p.pattern_type == PatternType::TimeOfDay && p.involves(device_id))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Support,
    Reject { reason: String },
}

/// One enricher's opinion about a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    pub enricher: String,
    /// Type this signal argues for; `None` for purely validating signals.
    pub suggested_type: Option<SynergyType>,
    /// Signal strength in [0, 1]; drives type selection and confidence weighting.
    pub strength: f64,
    pub confidence: f64,
    /// 1.0 when the enricher has no notion of lift.
    pub lift: f64,
    pub verdict: Verdict,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Enrichment {
    pub fn support(enricher: &str, suggested_type: Option<SynergyType>, strength: f64, confidence: f64) -> Self {
        Self {
            enricher: enricher.to_string(),
            suggested_type,
            strength: strength.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
            lift: 1.0,
            verdict: Verdict::Support,
            metadata: BTreeMap::new(),
        }
    }

    pub fn reject(enricher: &str, reason: impl Into<String>) -> Self {
        Self {
            enricher: enricher.to_string(),
            suggested_type: None,
            strength: 0.0,
            confidence: 0.0,
            lift: 1.0,
            verdict: Verdict::Reject {
                reason: reason.into(),
            },
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_lift(mut self, lift: f64) -> Self {
        self.lift = if lift.is_finite() { lift.max(0.0) } else { 1.0 };
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn is_reject(&self) -> bool {
        matches!(self.verdict, Verdict::Reject { .. })
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        obj.insert("strength".into(), self.strength.into());
        obj.insert("confidence".into(), self.confidence.into());
        obj.insert("lift".into(), self.lift.into());
        if let Some(t) = self.suggested_type {
            obj.insert("suggested_type".into(), t.as_str().into());
        }
        if let Verdict::Reject { reason } = &self.verdict {
            obj.insert("rejected".into(), reason.clone().into());
        }
        for (k, v) in &self.metadata {
            obj.insert(k.clone(), v.clone());
        }
        serde_json::Value::Object(obj)
    }
}

/// A source of evidence about a candidate relationship.
///
/// `Ok(None)` means the enricher has nothing to say. `Err` means a lookup
/// failed; the detector logs it and continues without this signal.
pub trait Enricher: Send + Sync {
    fn name(&self) -> &str;

    fn enrich(
        &self,
        candidate: &SynergyCandidate,
        ctx: &EnrichmentContext<'_>,
    ) -> Result<Option<Enrichment>, HearthError>;
}

/// The standard ordered enricher pipeline.
pub fn default_enrichers() -> Vec<Box<dyn Enricher>> {
    vec![
        Box::new(SpatialEnricher),
        Box::new(TemporalEnricher),
        Box::new(CapabilityEnricher::new(Box::new(RegistryCapabilities))),
        Box::new(EnergyEnricher),
    ]
}

// src/synergy/detector.rs — Turns candidates into synergy opportunities

use std::collections::BTreeMap;

use chrono::Utc;
use rayon::prelude::*;

use super::candidates::{relationship_label, CandidateGenerator, SynergyCandidate};
use super::enrichers::{default_enrichers, Enricher, Enrichment, EnrichmentContext};
use crate::core::types::{
    ContextMetadata, DeviceClass, DeviceRegistry, HomeType, Pattern, QualityTier,
    SynergyOpportunity, SynergyType,
};
use crate::index::flat::CorrelationVectorIndex;
use crate::infra::config::{SynergyConfig, TieBreakPolicy};

/// Bonus for candidates backed by mined patterns.
const PATTERN_VALIDATION_BONUS: f64 = 0.1;
/// Share of the energy signal added on top of the action benefit.
const ENERGY_IMPACT_WEIGHT: f64 = 0.2;

/// How much automating an action of this class tends to matter.
fn action_benefit(class: DeviceClass) -> f64 {
    match class {
        DeviceClass::Security => 0.9,
        DeviceClass::Climate => 0.85,
        DeviceClass::Lighting => 0.7,
        DeviceClass::Cover => 0.65,
        DeviceClass::Power => 0.6,
        DeviceClass::Media => 0.5,
        _ => 0.4,
    }
}

/// Pick the synergy type from the strongest type-suggesting signal.
pub fn select_type(enrichments: &[Enrichment], policy: TieBreakPolicy) -> Option<(SynergyType, usize)> {
    const EPS: f64 = 1e-9;
    let mut best: Option<(usize, &Enrichment)> = None;
    for (i, e) in enrichments.iter().enumerate() {
        if e.is_reject() || e.strength <= 0.0 || e.suggested_type.is_none() {
            continue;
        }
        let Some((_, current)) = best else {
            best = Some((i, e));
            continue;
        };
        let better = if (e.strength - current.strength).abs() > EPS {
            e.strength > current.strength
        } else {
            match policy {
                TieBreakPolicy::ConfidenceTimesLift => {
                    e.confidence * e.lift > current.confidence * current.lift + EPS
                }
                TieBreakPolicy::Confidence => e.confidence > current.confidence + EPS,
                TieBreakPolicy::EnricherOrder => false,
            }
        };
        if better {
            best = Some((i, e));
        }
    }
    best.and_then(|(i, e)| e.suggested_type.map(|t| (t, i)))
}

/// Strength-weighted mean confidence over supporting signals.
fn blended_confidence(enrichments: &[Enrichment]) -> f64 {
    let (num, den) = enrichments
        .iter()
        .filter(|e| !e.is_reject() && e.strength > 0.0)
        .fold((0.0, 0.0), |(n, d), e| (n + e.strength * e.confidence, d + e.strength));
    if den <= 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Runs the enricher pipeline over every candidate and assembles pairs and chains.
pub struct SynergyDetector {
    config: SynergyConfig,
    enrichers: Vec<Box<dyn Enricher>>,
}

impl SynergyDetector {
    pub fn new(config: SynergyConfig) -> Self {
        Self::with_enrichers(config, default_enrichers())
    }

    pub fn with_enrichers(config: SynergyConfig, enrichers: Vec<Box<dyn Enricher>>) -> Self {
        Self { config, enrichers }
    }

    pub fn enricher_names(&self) -> Vec<&str> {
        self.enrichers.iter().map(|e| e.name()).collect()
    }

    pub fn detect(
        &self,
        patterns: &[Pattern],
        registry: &DeviceRegistry,
        home_type: HomeType,
        index: Option<&CorrelationVectorIndex>,
    ) -> Vec<SynergyOpportunity> {
        let candidates =
            CandidateGenerator::new(self.config.routine_alignment_minutes).generate(patterns, registry);
        let ctx = EnrichmentContext {
            registry,
            home_type,
            patterns,
            index,
            config: &self.config,
        };

        let pairs: Vec<SynergyOpportunity> = candidates
            .par_iter()
            .filter_map(|c| self.evaluate(c, &ctx))
            .collect();
        let chains = self.build_chains(&pairs, registry);

        tracing::info!(
            "Synergy detection: {} candidates -> {} pairs, {} chains",
            candidates.len(),
            pairs.len(),
            chains.len()
        );

        let mut out = pairs;
        out.extend(chains);
        out
    }

    /// Enrich one candidate; `None` when vetoed, signal-free or below the bar.
    pub fn evaluate(&self, candidate: &SynergyCandidate, ctx: &EnrichmentContext<'_>) -> Option<SynergyOpportunity> {
        let mut enrichments = Vec::with_capacity(self.enrichers.len());
        for enricher in &self.enrichers {
            match enricher.enrich(candidate, ctx) {
                Ok(Some(e)) => enrichments.push(e),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        "Enricher '{}' failed for {} -> {}: {}",
                        enricher.name(),
                        candidate.trigger,
                        candidate.action,
                        e
                    );
                }
            }
        }

        if let Some(veto) = enrichments.iter().find(|e| e.is_reject()) {
            tracing::debug!(
                "Candidate {} -> {} vetoed by {}",
                candidate.trigger,
                candidate.action,
                veto.enricher
            );
            return None;
        }

        let (synergy_type, _) = select_type(&enrichments, self.config.tie_break)?;
        let validated = candidate.validated_by_patterns();
        let mut confidence = blended_confidence(&enrichments);
        if validated {
            confidence = (confidence + PATTERN_VALIDATION_BONUS).min(1.0);
        }
        if confidence < self.config.min_confidence {
            return None;
        }

        let registry = ctx.registry;
        let action_class = registry
            .get(&candidate.action)
            .map(|e| e.class())
            .unwrap_or(DeviceClass::Other);
        let energy_strength = enrichments
            .iter()
            .find(|e| e.suggested_type == Some(SynergyType::EnergyContext))
            .map(|e| e.strength)
            .unwrap_or(0.0);
        let impact = (action_benefit(action_class) * (0.5 + 0.5 * confidence)
            + ENERGY_IMPACT_WEIGHT * energy_strength)
            .clamp(0.0, 1.0);

        let cross_floor = match (registry.floor_of(&candidate.trigger), registry.floor_of(&candidate.action)) {
            (Some(a), Some(b)) => a != b,
            _ => false,
        };
        let context_metadata = ContextMetadata {
            relationship: relationship_label(registry, &candidate.trigger, &candidate.action),
            trigger_entity: candidate.trigger.clone(),
            action_entity: candidate.action.clone(),
            area: registry.area_of(&candidate.trigger).map(String::from),
            same_area: registry.same_area(&candidate.trigger, &candidate.action),
            cross_floor,
        };

        let mut context_breakdown: BTreeMap<String, serde_json::Value> = enrichments
            .iter()
            .map(|e| (e.enricher.clone(), e.to_json()))
            .collect();
        context_breakdown.insert("source".into(), candidate.source.as_str().into());
        if validated {
            context_breakdown.insert("pattern_ids".into(), candidate.pattern_ids.clone().into());
        }

        let explanation = explain_pair(synergy_type, &context_metadata, &enrichments);
        Some(SynergyOpportunity {
            synergy_id: uuid::Uuid::new_v4().to_string(),
            synergy_type,
            device_ids: vec![candidate.trigger.clone(), candidate.action.clone()],
            synergy_depth: 2,
            impact_score: impact,
            confidence,
            quality_score: 0.0,
            quality_tier: QualityTier::Poor,
            context_metadata,
            validated_by_patterns: validated,
            occurrences: candidate.occurrences,
            explanation,
            context_breakdown,
            created_at: Utc::now(),
        })
    }

    /// A → B → C chains from accepted pairs that share a middle device.
    pub fn build_chains(&self, pairs: &[SynergyOpportunity], registry: &DeviceRegistry) -> Vec<SynergyOpportunity> {
        if self.config.max_chain_depth < 3 {
            return Vec::new();
        }
        let mut by_trigger: BTreeMap<&str, Vec<&SynergyOpportunity>> = BTreeMap::new();
        for p in pairs {
            by_trigger
                .entry(p.context_metadata.trigger_entity.as_str())
                .or_default()
                .push(p);
        }

        let mut chains = Vec::new();
        for start in pairs {
            let mut path = vec![start];
            self.extend_chain(&mut path, &by_trigger, registry, &mut chains);
        }
        chains
    }

    fn extend_chain<'p>(
        &self,
        path: &mut Vec<&'p SynergyOpportunity>,
        by_trigger: &BTreeMap<&str, Vec<&'p SynergyOpportunity>>,
        registry: &DeviceRegistry,
        out: &mut Vec<SynergyOpportunity>,
    ) {
        let Some(last) = path.last() else {
            return;
        };
        // n links span n + 1 devices; one more link must stay within the depth limit
        if path.len() + 2 > self.config.max_chain_depth {
            return;
        }
        let Some(next_links) = by_trigger.get(last.context_metadata.action_entity.as_str()) else {
            return;
        };
        for next in next_links {
            let action = next.context_metadata.action_entity.as_str();
            let revisits = path.iter().any(|p| p.context_metadata.trigger_entity == action)
                || path.iter().any(|p| p.context_metadata.action_entity == action);
            if revisits {
                continue;
            }
            path.push(next);
            if let Some(chain) = self.assemble_chain(path, registry) {
                out.push(chain);
            }
            self.extend_chain(path, by_trigger, registry, out);
            path.pop();
        }
    }

    fn assemble_chain(&self, links: &[&SynergyOpportunity], registry: &DeviceRegistry) -> Option<SynergyOpportunity> {
        let first = links.first()?;
        let confidence: f64 = links.iter().map(|l| l.confidence).product();
        if confidence < self.config.min_confidence {
            return None;
        }

        let mut device_ids = vec![first.context_metadata.trigger_entity.clone()];
        device_ids.extend(links.iter().map(|l| l.context_metadata.action_entity.clone()));

        let class = |id: &str| registry.get(id).map(|e| e.class()).unwrap_or(DeviceClass::Other);
        let relationship = device_ids
            .iter()
            .map(|id| class(id).as_str().to_string())
            .collect::<Vec<_>>()
            .join("_to_");

        let impact = links.iter().map(|l| l.impact_score).sum::<f64>() / links.len() as f64;
        let occurrences = links.iter().map(|l| l.occurrences).min().unwrap_or(0);
        let validated = links.iter().all(|l| l.validated_by_patterns);
        let first_area = registry.area_of(&device_ids[0]);
        let same_area = device_ids.iter().all(|id| registry.area_of(id) == first_area && first_area.is_some());
        let floors: Vec<i32> = device_ids.iter().filter_map(|id| registry.floor_of(id)).collect();
        let cross_floor = floors.windows(2).any(|w| w[0] != w[1]);

        let mut context_breakdown = BTreeMap::new();
        context_breakdown.insert(
            "links".to_string(),
            links
                .iter()
                .map(|l| l.synergy_id.clone())
                .collect::<Vec<_>>()
                .into(),
        );
        context_breakdown.insert(
            "link_confidences".to_string(),
            links.iter().map(|l| l.confidence).collect::<Vec<_>>().into(),
        );

        let explanation = format!(
            "{} sets off a chain of {} devices ending at {} (combined confidence {:.0}%).",
            device_ids[0],
            device_ids.len(),
            device_ids[device_ids.len() - 1],
            confidence * 100.0
        );

        Some(SynergyOpportunity {
            synergy_id: uuid::Uuid::new_v4().to_string(),
            synergy_type: SynergyType::DeviceChain,
            synergy_depth: device_ids.len(),
            impact_score: impact,
            confidence,
            quality_score: 0.0,
            quality_tier: QualityTier::Poor,
            context_metadata: ContextMetadata {
                relationship,
                trigger_entity: device_ids[0].clone(),
                action_entity: device_ids[device_ids.len() - 1].clone(),
                area: first_area.map(String::from),
                same_area,
                cross_floor,
            },
            validated_by_patterns: validated,
            occurrences,
            explanation,
            context_breakdown,
            device_ids,
            created_at: Utc::now(),
        })
    }
}

fn explain_pair(synergy_type: SynergyType, meta: &ContextMetadata, enrichments: &[Enrichment]) -> String {
    let find = |name: &str| enrichments.iter().find(|e| e.enricher == name);
    let mut parts = Vec::new();

    match synergy_type {
        SynergyType::DevicePair => parts.push(format!(
            "{} could control {} ({})",
            meta.trigger_entity, meta.action_entity, meta.relationship
        )),
        SynergyType::EventContext => parts.push(format!(
            "{} and {} follow the same daily routine",
            meta.trigger_entity, meta.action_entity
        )),
        SynergyType::EnergyContext => parts.push(format!(
            "{} could move {} out of peak hours",
            meta.trigger_entity, meta.action_entity
        )),
        SynergyType::DeviceChain => parts.push(format!(
            "{} starts a chain through {}",
            meta.trigger_entity, meta.action_entity
        )),
    }

    if let Some(lag) = find("temporal").and_then(|e| e.metadata.get("mean_lag_secs")).and_then(|v| v.as_f64()) {
        parts.push(format!("usually {lag:.0}s apart"));
    }
    if let Some(savings) = find("energy").and_then(|e| e.metadata.get("monthly_savings")).and_then(|v| v.as_f64()) {
        parts.push(format!("saving about {savings:.2}/month"));
    }
    if meta.same_area {
        if let Some(area) = &meta.area {
            parts.push(format!("both in the {area}"));
        }
    } else if meta.cross_floor {
        parts.push("across floors".to_string());
    }

    let mut text = parts.join(", ");
    text.push('.');
    text
}

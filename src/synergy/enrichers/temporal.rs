// src/synergy/enrichers/temporal.rs — Timing evidence from mined patterns

use super::{Enricher, Enrichment, EnrichmentContext};
use crate::core::types::{Pattern, SynergyType};
use crate::index::features::RelationshipFeatures;
use crate::infra::errors::HearthError;
use crate::synergy::candidates::{circular_gap, SynergyCandidate};

/// Ceiling for evidence that only comes from similar known relationships.
const SIMILARITY_STRENGTH: f64 = 0.4;
const SIMILAR_NEIGHBOURS: usize = 3;

/// Looks for, in order: a co-occurrence pattern in the candidate's direction,
/// aligned time-of-day routines, and similar relationships in the index.
pub struct TemporalEnricher;

impl TemporalEnricher {
    fn from_co_occurrence(&self, pattern: &Pattern) -> Option<Enrichment> {
        let metrics = pattern.association?;
        Some(
            Enrichment::support(
                self.name(),
                Some(SynergyType::DevicePair),
                pattern.confidence,
                pattern.confidence,
            )
            .with_lift(metrics.lift)
            .with_meta("evidence", "co_occurrence")
            .with_meta("pattern_id", pattern.pattern_id.as_str())
            .with_meta("support", metrics.support)
            .with_meta("mean_lag_secs", metrics.mean_lag_secs)
            .with_meta("lag_stdev_secs", metrics.lag_stdev_secs)
            .with_meta("occurrences", pattern.occurrences),
        )
    }

    fn from_routines(&self, candidate: &SynergyCandidate, ctx: &EnrichmentContext<'_>) -> Option<Enrichment> {
        let alignment = ctx.config.routine_alignment_minutes.max(1) as f64;
        let triggers = ctx.time_of_day(&candidate.trigger);
        let actions = ctx.time_of_day(&candidate.action);

        let (t, a, gap) = triggers
            .iter()
            .flat_map(|t| actions.iter().map(move |a| (*t, *a)))
            .filter_map(|(t, a)| {
                let gap = circular_gap(t.time_range?.peak_minute, a.time_range?.peak_minute);
                Some((t, a, gap))
            })
            .filter(|(_, _, gap)| *gap <= alignment)
            .min_by(|x, y| x.2.total_cmp(&y.2))?;

        let confidence = t.confidence.min(a.confidence);
        let strength = confidence * (1.0 - gap / (2.0 * alignment));
        let peak_hour = t.time_range.map(|r| r.peak_minute / 60.0).unwrap_or_default();
        Some(
            Enrichment::support(self.name(), Some(SynergyType::EventContext), strength, confidence)
                .with_meta("evidence", "routine")
                .with_meta("offset_minutes", gap)
                .with_meta("peak_hour", peak_hour)
                .with_meta("pattern_ids", vec![t.pattern_id.clone(), a.pattern_id.clone()]),
        )
    }

    fn from_similar(
        &self,
        candidate: &SynergyCandidate,
        ctx: &EnrichmentContext<'_>,
    ) -> Result<Option<Enrichment>, HearthError> {
        let Some(index) = ctx.index.filter(|i| !i.is_empty()) else {
            return Ok(None);
        };
        let max_distance = ctx.config.similar_relationship_max_distance.max(f32::EPSILON);
        let query = RelationshipFeatures::from_registry(ctx.registry, &candidate.trigger, &candidate.action).encode();
        let neighbours = index.search(&query, SIMILAR_NEIGHBOURS, Some(max_distance))?;
        let Some(best) = neighbours.first() else {
            return Ok(None);
        };

        let closeness = 1.0 - (best.distance / max_distance) as f64;
        let strength = SIMILARITY_STRENGTH * closeness.clamp(0.0, 1.0);
        let similar: Vec<String> = neighbours
            .iter()
            .map(|n| format!("{} -> {}", n.entity1, n.entity2))
            .collect();
        Ok(Some(
            Enrichment::support(self.name(), Some(SynergyType::DevicePair), strength, strength)
                .with_meta("evidence", "similar_relationships")
                .with_meta("nearest_distance", best.distance as f64)
                .with_meta("similar", similar),
        ))
    }
}

impl Enricher for TemporalEnricher {
    fn name(&self) -> &str {
        "temporal"
    }

    fn enrich(
        &self,
        candidate: &SynergyCandidate,
        ctx: &EnrichmentContext<'_>,
    ) -> Result<Option<Enrichment>, HearthError> {
        if let Some(p) = ctx.co_occurrence(&candidate.trigger, &candidate.action) {
            if let Some(e) = self.from_co_occurrence(p) {
                return Ok(Some(e));
            }
        }
        if let Some(e) = self.from_routines(candidate, ctx) {
            return Ok(Some(e));
        }
        self.from_similar(candidate, ctx)
    }
}

// src/synergy/candidates.rs — Plausible trigger → action pairs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::types::{DeviceClass, DeviceRegistry, Pattern, PatternType};

/// Where a candidate came from, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    CoOccurrence,
    Routine,
    Spatial,
}

impl CandidateSource {
    pub fn as_str(&self) -> &str {
        match self {
            Self::CoOccurrence => "co_occurrence",
            Self::Routine => "routine",
            Self::Spatial => "spatial",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynergyCandidate {
    pub trigger: String,
    pub action: String,
    pub source: CandidateSource,
    /// Observations behind the candidate; 0 for registry-only candidates.
    pub occurrences: u32,
    pub pattern_ids: Vec<String>,
}

impl SynergyCandidate {
    pub fn new(trigger: &str, action: &str, source: CandidateSource) -> Self {
        Self {
            trigger: trigger.to_string(),
            action: action.to_string(),
            source,
            occurrences: 0,
            pattern_ids: Vec::new(),
        }
    }

    pub fn validated_by_patterns(&self) -> bool {
        !self.pattern_ids.is_empty()
    }
}

/// `<trigger_class>_to_<action_class>`; unknown entities are `other`.
pub fn relationship_label(registry: &DeviceRegistry, trigger: &str, action: &str) -> String {
    let class = |id: &str| registry.get(id).map(|e| e.class()).unwrap_or(DeviceClass::Other);
    format!("{}_to_{}", class(trigger).as_str(), class(action).as_str())
}

/// Builds the candidate list from mined patterns and the registry.
pub struct CandidateGenerator {
    routine_alignment_minutes: u32,
}

impl CandidateGenerator {
    pub fn new(routine_alignment_minutes: u32) -> Self {
        Self {
            routine_alignment_minutes,
        }
    }

    /// One candidate per ordered (trigger, action); the highest-priority source wins.
    pub fn generate(&self, patterns: &[Pattern], registry: &DeviceRegistry) -> Vec<SynergyCandidate> {
        let mut found: BTreeMap<(String, String), SynergyCandidate> = BTreeMap::new();
        let mut offer = |candidate: SynergyCandidate| {
            if candidate.trigger == candidate.action
                || candidate.trigger.is_empty()
                || candidate.action.is_empty()
            {
                return;
            }
            let key = (candidate.trigger.clone(), candidate.action.clone());
            match found.get(&key) {
                Some(existing) if existing.source <= candidate.source => {}
                _ => {
                    found.insert(key, candidate);
                }
            }
        };

        for p in patterns.iter().filter(|p| p.pattern_type == PatternType::CoOccurrence) {
            if let [trigger, follower] = p.device_ids.as_slice() {
                let mut c = SynergyCandidate::new(trigger, follower, CandidateSource::CoOccurrence);
                c.occurrences = p.occurrences;
                c.pattern_ids.push(p.pattern_id.clone());
                offer(c);
            }
        }

        for c in self.routine_pairs(patterns, registry) {
            offer(c);
        }

        for c in spatial_pairs(registry) {
            offer(c);
        }

        found.into_values().collect()
    }

    /// Time-of-day patterns on two devices peaking close together; the earlier
    /// one triggers, and the later one must be an actuator.
    fn routine_pairs(&self, patterns: &[Pattern], registry: &DeviceRegistry) -> Vec<SynergyCandidate> {
        let routines: Vec<(&Pattern, &str, f64)> = patterns
            .iter()
            .filter(|p| p.pattern_type == PatternType::TimeOfDay)
            .filter_map(|p| {
                let device = p.device_ids.first()?;
                let peak = p.time_range?.peak_minute;
                Some((p, device.as_str(), peak))
            })
            .collect();

        let mut out = Vec::new();
        for (a, a_dev, a_peak) in &routines {
            for (b, b_dev, b_peak) in &routines {
                if a_dev == b_dev || a_peak > b_peak {
                    continue;
                }
                // Equal peaks: order by id so each pair is considered once
                if a_peak == b_peak && a_dev > b_dev {
                    continue;
                }
                if circular_gap(*a_peak, *b_peak) > self.routine_alignment_minutes as f64 {
                    continue;
                }
                let actuator = registry
                    .get(b_dev)
                    .map(|e| e.class().is_actuator())
                    .unwrap_or(false);
                if !actuator {
                    continue;
                }
                let mut c = SynergyCandidate::new(a_dev, b_dev, CandidateSource::Routine);
                c.occurrences = a.occurrences.min(b.occurrences);
                c.pattern_ids = vec![a.pattern_id.clone(), b.pattern_id.clone()];
                out.push(c);
            }
        }
        out
    }
}

/// Minutes between two times of day, going the short way round midnight.
pub(crate) fn circular_gap(a: f64, b: f64) -> f64 {
    let d = (a - b).abs() % 1440.0;
    d.min(1440.0 - d)
}

/// Non-actuator triggers paired with actuators in the same or an adjacent area.
fn spatial_pairs(registry: &DeviceRegistry) -> Vec<SynergyCandidate> {
    let mut out = Vec::new();
    for trigger in registry.entities.values() {
        if trigger.class().is_actuator() {
            continue;
        }
        let Some(t_area) = trigger.area.as_deref() else {
            continue;
        };
        for action in registry.entities.values() {
            if action.entity_id == trigger.entity_id || !action.class().is_actuator() {
                continue;
            }
            let Some(a_area) = action.area.as_deref() else {
                continue;
            };
            if registry.layout.hops(t_area, a_area, 1).is_some() {
                out.push(SynergyCandidate::new(
                    &trigger.entity_id,
                    &action.entity_id,
                    CandidateSource::Spatial,
                ));
            }
        }
    }
    out
}

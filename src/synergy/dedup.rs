// src/synergy/dedup.rs — Collapse synergies that describe the same relationship

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::core::types::SynergyOpportunity;

/// (sorted first two device ids, relationship label, area).
pub type CanonicalKey = (String, String, String, String);

/// `None` when the synergy lacks two usable device ids.
pub fn canonical_key(synergy: &SynergyOpportunity) -> Option<CanonicalKey> {
    let [a, b] = [synergy.device_ids.first()?, synergy.device_ids.get(1)?];
    let (a, b) = (a.trim(), b.trim());
    if a.is_empty() || b.is_empty() {
        return None;
    }
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    Some((
        lo.to_string(),
        hi.to_string(),
        synergy.context_metadata.relationship.clone(),
        synergy.area().unwrap_or_default().to_string(),
    ))
}

fn rank(s: &SynergyOpportunity) -> (f64, f64, f64) {
    (s.quality_score, s.confidence, s.impact_score)
}

fn compare_rank(a: &SynergyOpportunity, b: &SynergyOpportunity) -> Ordering {
    let (ra, rb) = (rank(a), rank(b));
    ra.0.total_cmp(&rb.0)
        .then(ra.1.total_cmp(&rb.1))
        .then(ra.2.total_cmp(&rb.2))
}

#[derive(Debug, Default)]
pub struct DedupOutcome {
    pub kept: Vec<SynergyOpportunity>,
    /// Duplicates discarded in favour of a better group member.
    pub removed: usize,
    /// Records without a usable key, passed through untouched.
    pub skipped: usize,
}

/// Keep the best `(quality_score, confidence, impact_score)` member of each
/// key group. Output follows the position of each group's first member;
/// ties keep the earlier record.
pub fn deduplicate(synergies: Vec<SynergyOpportunity>) -> DedupOutcome {
    let mut outcome = DedupOutcome::default();
    let mut slots: Vec<SynergyOpportunity> = Vec::with_capacity(synergies.len());
    let mut slot_of: HashMap<CanonicalKey, usize> = HashMap::new();

    for synergy in synergies {
        let Some(key) = canonical_key(&synergy) else {
            tracing::warn!(
                "Skipping synergy {} in dedup: needs two device ids, got {:?}",
                synergy.synergy_id,
                synergy.device_ids
            );
            outcome.skipped += 1;
            slots.push(synergy);
            continue;
        };

        match slot_of.get(&key) {
            Some(&slot) => {
                outcome.removed += 1;
                if compare_rank(&synergy, &slots[slot]) == Ordering::Greater {
                    tracing::debug!(
                        "Dedup: {} replaces {}",
                        synergy.synergy_id,
                        slots[slot].synergy_id
                    );
                    slots[slot] = synergy;
                }
            }
            None => {
                slot_of.insert(key, slots.len());
                slots.push(synergy);
            }
        }
    }

    if outcome.removed > 0 {
        tracing::info!("Dedup removed {} duplicate synergies", outcome.removed);
    }
    outcome.kept = slots;
    outcome
}

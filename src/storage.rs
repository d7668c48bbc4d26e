// src/storage.rs — Caller-supplied persistence boundary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::types::{Pattern, QualityFeedback, SynergyOpportunity};
use crate::quality::scorer::ScoredPattern;

/// Everything one run produced, committed as a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryBatch {
    pub run_id: String,
    pub patterns: Vec<ScoredPattern>,
    pub synergies: Vec<SynergyOpportunity>,
    pub created_at: DateTime<Utc>,
}

impl DiscoveryBatch {
    pub fn new(patterns: Vec<ScoredPattern>, synergies: Vec<SynergyOpportunity>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            patterns,
            synergies,
            created_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty() && self.synergies.is_empty()
    }
}

/// Where discoveries and feedback audit records go. Implemented by the host.
///
/// `commit` must be atomic from the caller's point of view: either the whole
/// batch is stored or none of it is.
pub trait DiscoveryStore {
    fn commit(&mut self, batch: &DiscoveryBatch) -> anyhow::Result<()>;
    fn record_feedback(&mut self, feedback: &QualityFeedback) -> anyhow::Result<()>;
}

/// In-process store; keeps every batch. Useful for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    batches: Vec<DiscoveryBatch>,
    feedback: Vec<QualityFeedback>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> &[DiscoveryBatch] {
        &self.batches
    }

    pub fn latest(&self) -> Option<&DiscoveryBatch> {
        self.batches.last()
    }

    /// Patterns from the latest batch; later runs supersede earlier ones.
    pub fn current_patterns(&self) -> Vec<&Pattern> {
        self.latest()
            .map(|b| b.patterns.iter().map(|p| &p.pattern).collect())
            .unwrap_or_default()
    }

    pub fn current_synergies(&self) -> &[SynergyOpportunity] {
        self.latest().map(|b| b.synergies.as_slice()).unwrap_or(&[])
    }

    pub fn feedback(&self) -> &[QualityFeedback] {
        &self.feedback
    }
}

impl DiscoveryStore for MemoryStore {
    fn commit(&mut self, batch: &DiscoveryBatch) -> anyhow::Result<()> {
        self.batches.push(batch.clone());
        Ok(())
    }

    fn record_feedback(&mut self, feedback: &QualityFeedback) -> anyhow::Result<()> {
        self.feedback.push(feedback.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{FeedbackSubject, QualityComponents};

    #[test]
    fn test_memory_store_keeps_batches() {
        let mut store = MemoryStore::new();
        assert!(store.latest().is_none());
        assert!(store.current_synergies().is_empty());

        let first = DiscoveryBatch::new(vec![], vec![]);
        assert!(first.is_empty());
        store.commit(&first).unwrap();
        let second = DiscoveryBatch::new(vec![], vec![]);
        store.commit(&second).unwrap();

        assert_eq!(store.batches().len(), 2);
        assert_eq!(store.latest().unwrap().run_id, second.run_id);
        assert_ne!(first.run_id, second.run_id);
    }

    #[test]
    fn test_feedback_audit() {
        let mut store = MemoryStore::new();
        let fb = QualityFeedback::new(
            FeedbackSubject::Synergy("s-1".into()),
            0.4,
            QualityComponents::default(),
            true,
        );
        store.record_feedback(&fb).unwrap();
        assert_eq!(store.feedback(), &[fb]);
    }
}

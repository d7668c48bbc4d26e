// src/pipeline.rs — One discovery run, from events to committed discoveries

use std::collections::HashSet;

use crate::core::types::{
    DeviceRegistry, Event, FeedbackSubject, HomeType, Pattern, QualityComponents, QualityFeedback,
    SynergyOpportunity,
};
use crate::index::features::{RelationshipFeatures, FEATURE_DIMENSION};
use crate::index::flat::CorrelationVectorIndex;
use crate::infra::config::Config;
use crate::infra::errors::HearthError;
use crate::patterns::PatternMiner;
use crate::quality::drift::DriftReport;
use crate::quality::hitl::CorrectionModel;
use crate::quality::learner::{Learner, LearnerUpdate};
use crate::quality::learning_loop::{LearningLoop, SharedLearningLoop};
use crate::quality::scorer::ScoredPattern;
use crate::storage::{DiscoveryBatch, DiscoveryStore};
use crate::synergy::dedup::{canonical_key, deduplicate};
use crate::synergy::detector::SynergyDetector;

/// What the host hands over for one run.
pub struct DiscoveryInput<'a> {
    pub events: &'a [Event],
    pub registry: &'a DeviceRegistry,
    /// Free-form classification such as "apartment" or "multi-story".
    pub home_type: &'a str,
}

/// Result of a committed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub patterns: Vec<ScoredPattern>,
    pub synergies: Vec<SynergyOpportunity>,
    pub drift: Option<DriftReport>,
    /// Subjects scoring under the review threshold, now queued for experts.
    pub flagged_for_review: Vec<FeedbackSubject>,
    pub duplicates_removed: usize,
    /// Relationships newly added to the similarity index.
    pub indexed: usize,
}

/// Stage notifications for hosts that want progress output.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    PatternsMined { count: usize },
    SynergiesDetected { count: usize },
    Deduplicated { kept: usize, removed: usize },
    Committed { run_id: String },
}

/// Owns the long-lived state across runs: the learning loop handle and the
/// similarity index. Every run builds fresh detectors.
pub struct DiscoveryPipeline {
    config: Config,
    learning: SharedLearningLoop,
    index: CorrelationVectorIndex,
    indexed_pairs: HashSet<(String, String)>,
    on_progress: Option<Box<dyn Fn(PipelineEvent) + Send>>,
}

impl DiscoveryPipeline {
    pub fn new(config: Config) -> Result<Self, HearthError> {
        let learning = SharedLearningLoop::new(LearningLoop::new(&config.quality)?);
        Self::with_learning(config, learning)
    }

    /// Share a learning loop with other pipelines or feedback handlers.
    pub fn with_learning(config: Config, learning: SharedLearningLoop) -> Result<Self, HearthError> {
        config.validate()?;
        if config.index.dimension != FEATURE_DIMENSION {
            return Err(HearthError::Config(format!(
                "index.dimension must be {FEATURE_DIMENSION} for relationship features, got {}",
                config.index.dimension
            )));
        }
        let index = CorrelationVectorIndex::new(config.index.dimension);
        Ok(Self {
            config,
            learning,
            index,
            indexed_pairs: HashSet::new(),
            on_progress: None,
        })
    }

    pub fn with_progress(mut self, cb: impl Fn(PipelineEvent) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(cb));
        self
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(ref cb) = self.on_progress {
            cb(event);
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn learning(&self) -> &SharedLearningLoop {
        &self.learning
    }

    pub fn index(&self) -> &CorrelationVectorIndex {
        &self.index
    }

    /// Mine, detect, score, dedup, then commit once. Learning state and the
    /// index change only after the store accepted the batch.
    pub fn run<S: DiscoveryStore + ?Sized>(
        &mut self,
        input: DiscoveryInput<'_>,
        store: &mut S,
    ) -> Result<RunReport, HearthError> {
        let home_type = HomeType::from_label(input.home_type);

        // 1. Patterns, calibrated with what users accepted so far
        let (snapshot, calibrator) = self.learning.run_state()?;
        let scorer = snapshot.scorer();
        let patterns = PatternMiner::new(&self.config.patterns)
            .with_calibrator(&calibrator)
            .mine(input.events);
        self.emit(PipelineEvent::PatternsMined {
            count: patterns.len(),
        });

        let scored_patterns: Vec<ScoredPattern> = patterns
            .iter()
            .map(|p| scorer.score_pattern(p, input.registry))
            .collect();

        // 2. Synergies
        let detector = SynergyDetector::new(self.config.synergy.clone());
        let mut synergies = detector.detect(&patterns, input.registry, home_type, Some(&self.index));
        self.emit(PipelineEvent::SynergiesDetected {
            count: synergies.len(),
        });

        let mut components: Vec<(String, QualityComponents)> = Vec::with_capacity(synergies.len());
        for s in synergies.iter_mut() {
            let c = scorer.score_synergy(s);
            components.push((s.synergy_id.clone(), c));
        }

        // 3. One representative per relationship
        let dedup = deduplicate(synergies);
        self.emit(PipelineEvent::Deduplicated {
            kept: dedup.kept.len(),
            removed: dedup.removed,
        });

        // 4. All-or-nothing commit
        let batch = DiscoveryBatch::new(scored_patterns, dedup.kept);
        store
            .commit(&batch)
            .map_err(|e| HearthError::Storage(format!("commit of run {} failed: {e:#}", batch.run_id)))?;
        self.emit(PipelineEvent::Committed {
            run_id: batch.run_id.clone(),
        });

        // 5. Post-commit bookkeeping
        let (drift, flagged) = self.after_commit(&batch, &components)?;
        let indexed = self.index_validated(&batch.synergies, input.registry);

        tracing::info!(
            "Run {} committed: {} patterns, {} synergies ({} duplicates removed, {} flagged, {} indexed)",
            batch.run_id,
            batch.patterns.len(),
            batch.synergies.len(),
            dedup.removed,
            flagged.len(),
            indexed
        );

        Ok(RunReport {
            run_id: batch.run_id,
            patterns: batch.patterns,
            synergies: batch.synergies,
            drift,
            flagged_for_review: flagged,
            duplicates_removed: dedup.removed,
            indexed,
        })
    }

    fn after_commit(
        &self,
        batch: &DiscoveryBatch,
        synergy_components: &[(String, QualityComponents)],
    ) -> Result<(Option<DriftReport>, Vec<FeedbackSubject>), HearthError> {
        let mut learning = self.learning.write()?;

        let scores: Vec<f64> = batch
            .patterns
            .iter()
            .map(|p| p.quality_score)
            .chain(batch.synergies.iter().map(|s| s.quality_score))
            .collect();
        let drift = learning.check_drift(&scores);

        let mut flagged = Vec::new();
        for p in &batch.patterns {
            let subject = FeedbackSubject::Pattern(p.pattern.pattern_id.clone());
            let key = pattern_review_key(&p.pattern);
            if learning.flag_for_review(&key, subject.clone(), p.quality_score, p.components) {
                flagged.push(subject);
            }
        }
        for s in &batch.synergies {
            let components = synergy_components
                .iter()
                .find(|(id, _)| *id == s.synergy_id)
                .map(|(_, c)| *c)
                .unwrap_or_default();
            let subject = FeedbackSubject::Synergy(s.synergy_id.clone());
            let key = synergy_review_key(s);
            if learning.flag_for_review(&key, subject.clone(), s.quality_score, components) {
                flagged.push(subject);
            }
        }
        Ok((drift, flagged))
    }

    /// Add pattern-validated pairs to the similarity index, once per pair.
    fn index_validated(&mut self, synergies: &[SynergyOpportunity], registry: &DeviceRegistry) -> usize {
        let mut added = 0;
        for s in synergies {
            if !s.validated_by_patterns || s.synergy_depth != 2 {
                continue;
            }
            let (Some(a), Some(b)) = (s.device_ids.first(), s.device_ids.get(1)) else {
                continue;
            };
            let key = (a.clone(), b.clone());
            if self.indexed_pairs.contains(&key) {
                continue;
            }
            let vector = relationship_vector(s, registry);
            match self.index.add(&key.0, &key.1, vector) {
                Ok(()) => {
                    self.indexed_pairs.insert(key);
                    added += 1;
                }
                Err(e) => tracing::warn!("Could not index {} -> {}: {}", key.0, key.1, e),
            }
        }
        added
    }

    /// Rebuild the index from stored synergies, e.g. after a restart.
    pub fn rebuild_index(&mut self, synergies: &[SynergyOpportunity], registry: &DeviceRegistry) -> usize {
        self.index.clear();
        self.indexed_pairs.clear();
        self.index_validated(synergies, registry)
    }

    /// Audit one user verdict in the store, then feed it to the learning loop.
    /// A failed audit leaves the learning state untouched, so a retry applies
    /// the feedback exactly once.
    pub fn submit_feedback<S: DiscoveryStore + ?Sized>(
        &self,
        feedback: QualityFeedback,
        store: &mut S,
    ) -> Result<LearnerUpdate, HearthError> {
        Learner::validate(&feedback)?;
        // Held across the audit so audit order matches ingest order
        let mut learning = self.learning.write()?;
        store
            .record_feedback(&feedback)
            .map_err(|e| HearthError::Storage(format!("feedback audit failed: {e:#}")))?;
        learning.ingest_feedback(feedback)
    }

    /// Resolve a queued review with an expert score.
    pub fn submit_review(&self, subject_id: &str, expert_score: f64) -> Result<Option<CorrectionModel>, HearthError> {
        self.learning.write()?.record_expert_review(subject_id, expert_score)
    }
}

/// Review identity of a pattern: type, devices and time bucket.
fn pattern_review_key(pattern: &Pattern) -> String {
    let bucket = pattern
        .time_range
        .map(|r| r.start_minute.to_string())
        .unwrap_or_default();
    format!(
        "pattern:{}:{}:{}",
        pattern.pattern_type.as_str(),
        pattern.device_ids.join(">"),
        bucket
    )
}

/// Review identity of a synergy: the dedup key for pairs, the full path for chains.
fn synergy_review_key(synergy: &SynergyOpportunity) -> String {
    match canonical_key(synergy) {
        Some((a, b, relationship, area)) if synergy.synergy_depth <= 2 => {
            format!("synergy:{a}|{b}|{relationship}|{area}")
        }
        _ => format!(
            "synergy:{}|{}",
            synergy.device_ids.join(">"),
            synergy.context_metadata.relationship
        ),
    }
}

/// Feature vector for a pair synergy, with lag and hour when the evidence has them.
pub fn relationship_vector(synergy: &SynergyOpportunity, registry: &DeviceRegistry) -> Vec<f32> {
    let temporal = synergy.context_breakdown.get("temporal");
    let field = |name: &str| temporal.and_then(|t| t.get(name)).and_then(|v| v.as_f64());

    let mut features = RelationshipFeatures::from_registry(
        registry,
        &synergy.context_metadata.trigger_entity,
        &synergy.context_metadata.action_entity,
    );
    if let Some(lag) = field("mean_lag_secs") {
        features = features.with_lag(lag);
    }
    if let Some(hour) = field("peak_hour") {
        features = features.with_hour(hour);
    }
    features.encode()
}

// src/synergy/mod.rs — Device synergy discovery

pub mod candidates;
pub mod dedup;
pub mod detector;
pub mod enrichers;

pub use candidates::{relationship_label, CandidateGenerator, CandidateSource, SynergyCandidate};
pub use dedup::{canonical_key, deduplicate, DedupOutcome};
pub use detector::SynergyDetector;
pub use enrichers::{Enricher, Enrichment, EnrichmentContext, Verdict};

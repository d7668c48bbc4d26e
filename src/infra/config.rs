// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::infra::errors::HearthError;
use crate::quality::weights::QualityWeights;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub patterns: PatternsConfig,

    #[serde(default)]
    pub synergy: SynergyConfig,

    #[serde(default)]
    pub quality: QualityConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternsConfig {
    /// Offset applied to UTC timestamps before bucketing by time of day.
    pub utc_offset_minutes: i32,
    /// States that are not real state changes (dropped before detection).
    pub ignored_states: Vec<String>,
    #[serde(default)]
    pub time_of_day: TimeOfDayConfig,
    #[serde(default)]
    pub co_occurrence: CoOccurrenceConfig,
}

impl Default for PatternsConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            ignored_states: vec!["unavailable".into(), "unknown".into()],
            time_of_day: TimeOfDayConfig::default(),
            co_occurrence: CoOccurrenceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeOfDayConfig {
    pub bucket_minutes: u32,
    pub min_occurrences: u32,
    pub min_confidence: f64,
}

impl Default for TimeOfDayConfig {
    fn default() -> Self {
        Self {
            bucket_minutes: 60,
            min_occurrences: 3,
            min_confidence: 0.6,
        }
    }
}

/// Longest co-occurrence window: one day.
pub const MAX_CO_OCCURRENCE_WINDOW_SECONDS: i64 = 86_400;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoOccurrenceConfig {
    pub window_seconds: i64,
    pub min_occurrences: u32,
    pub min_support: f64,
    pub min_confidence: f64,
}

impl Default for CoOccurrenceConfig {
    fn default() -> Self {
        Self {
            window_seconds: 120,
            min_occurrences: 3,
            min_support: 0.3,
            min_confidence: 0.6,
        }
    }
}

/// How to pick the synergy type when several enrichers report equally strong signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreakPolicy {
    #[default]
    ConfidenceTimesLift,
    Confidence,
    EnricherOrder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynergyConfig {
    pub min_confidence: f64,
    pub max_chain_depth: usize,
    pub routine_alignment_minutes: u32,
    pub tie_break: TieBreakPolicy,
    /// Neighbours further than this (squared distance) are not "similar".
    pub similar_relationship_max_distance: f32,
    #[serde(default)]
    pub energy: EnergyConfig,
}

impl Default for SynergyConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            max_chain_depth: 3,
            routine_alignment_minutes: 30,
            tie_break: TieBreakPolicy::default(),
            similar_relationship_max_distance: 0.5,
            energy: EnergyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyConfig {
    pub peak_start_hour: u32,
    pub peak_end_hour: u32,
    /// Price per kWh during the peak window.
    pub peak_price: f64,
    pub off_peak_price: f64,
    /// Monthly savings that count as a full-strength signal.
    pub savings_norm: f64,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            peak_start_hour: 16,
            peak_end_hour: 21,
            peak_price: 0.32,
            off_peak_price: 0.12,
            savings_norm: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    #[serde(default)]
    pub weights: QualityWeights,
    pub learning_rate: f64,
    /// Feedback events averaged per weight update (1 = plain SGD).
    pub batch_size: usize,
    pub drift_threshold: f64,
    /// Items scoring below this are queued for expert review.
    pub quality_threshold: f64,
    pub hitl_min_samples: usize,
    pub max_correction: f64,
    pub calibration_min_samples: u32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            weights: QualityWeights::default(),
            learning_rate: 0.05,
            batch_size: 1,
            drift_threshold: 0.10,
            quality_threshold: 0.50,
            hitl_min_samples: 10,
            max_correction: 0.15,
            calibration_min_samples: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub dimension: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dimension: crate::index::features::FEATURE_DIMENSION,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Config {
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, HearthError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make a run meaningless.
    pub fn validate(&self) -> Result<(), HearthError> {
        let tod = &self.patterns.time_of_day;
        if tod.bucket_minutes == 0 || 1440 % tod.bucket_minutes != 0 {
            return Err(HearthError::Config(format!(
                "time_of_day.bucket_minutes must divide 1440, got {}",
                tod.bucket_minutes
            )));
        }
        let window = self.patterns.co_occurrence.window_seconds;
        if window <= 0 || window > MAX_CO_OCCURRENCE_WINDOW_SECONDS {
            return Err(HearthError::Config(format!(
                "co_occurrence.window_seconds must be within 1..={MAX_CO_OCCURRENCE_WINDOW_SECONDS}, got {window}"
            )));
        }
        if self.index.dimension == 0 {
            return Err(HearthError::Config("index.dimension must be positive".into()));
        }
        if self.quality.batch_size == 0 {
            return Err(HearthError::Config("quality.batch_size must be at least 1".into()));
        }

        let unit = [
            ("time_of_day.min_confidence", tod.min_confidence),
            ("co_occurrence.min_support", self.patterns.co_occurrence.min_support),
            ("co_occurrence.min_confidence", self.patterns.co_occurrence.min_confidence),
            ("synergy.min_confidence", self.synergy.min_confidence),
            ("quality.quality_threshold", self.quality.quality_threshold),
            ("quality.drift_threshold", self.quality.drift_threshold),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(HearthError::Config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        let energy = &self.synergy.energy;
        if energy.peak_start_hour >= 24 || energy.peak_end_hour > 24 {
            return Err(HearthError::Config("energy peak hours must be within 0..24".into()));
        }

        self.quality.weights.normalized()?;
        Ok(())
    }
}

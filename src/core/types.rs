// src/core/types.rs — Core domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

// ─── Inputs ─────────────────────────────────────────────────────────────────

/// A single state change read from the home's event history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub entity_id: String,
    pub state: String,
    pub domain: String,
}

impl Event {
    pub fn new(
        timestamp: DateTime<Utc>,
        entity_id: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        let entity_id = entity_id.into();
        let domain = entity_id
            .split_once('.')
            .map(|(d, _)| d.to_string())
            .unwrap_or_default();
        Self {
            timestamp,
            entity_id,
            state: state.into(),
            domain,
        }
    }
}

/// Registry metadata for one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityInfo {
    pub entity_id: String,
    pub domain: String,
    pub area: Option<String>,
    pub floor: Option<i32>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl EntityInfo {
    pub fn new(entity_id: impl Into<String>, area: Option<&str>) -> Self {
        let entity_id = entity_id.into();
        let domain = entity_id
            .split_once('.')
            .map(|(d, _)| d.to_string())
            .unwrap_or_default();
        Self {
            entity_id,
            domain,
            area: area.map(String::from),
            ..Default::default()
        }
    }

    pub fn with_capabilities(mut self, caps: &[&str]) -> Self {
        self.capabilities = caps.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_floor(mut self, floor: i32) -> Self {
        self.floor = Some(floor);
        self
    }

    pub fn with_manufacturer(mut self, manufacturer: &str) -> Self {
        self.manufacturer = Some(manufacturer.to_string());
        self
    }

    pub fn has_capability(&self, cap: &str) -> bool {
        self.capabilities.iter().any(|c| c.eq_ignore_ascii_case(cap))
    }

    pub fn class(&self) -> DeviceClass {
        DeviceClass::of(self)
    }
}

/// Which areas touch each other, and which floor an area is on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AreaLayout {
    #[serde(default)]
    pub adjacency: BTreeMap<String, BTreeSet<String>>,
    #[serde(default)]
    pub floors: BTreeMap<String, i32>,
}

impl AreaLayout {
    /// Record a symmetric adjacency between two areas.
    pub fn connect(&mut self, a: &str, b: &str) {
        self.adjacency
            .entry(a.to_string())
            .or_default()
            .insert(b.to_string());
        self.adjacency
            .entry(b.to_string())
            .or_default()
            .insert(a.to_string());
    }

    pub fn set_floor(&mut self, area: &str, floor: i32) {
        self.floors.insert(area.to_string(), floor);
    }

    /// Shortest number of adjacency hops between two areas (BFS), if connected
    /// within `max_hops`.
    pub fn hops(&self, from: &str, to: &str, max_hops: u32) -> Option<u32> {
        if from == to {
            return Some(0);
        }
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut queue: VecDeque<(&str, u32)> = VecDeque::new();
        seen.insert(from);
        queue.push_back((from, 0));

        while let Some((area, depth)) = queue.pop_front() {
            if depth >= max_hops {
                continue;
            }
            let Some(neighbours) = self.adjacency.get(area) else {
                continue;
            };
            for next in neighbours {
                if next == to {
                    return Some(depth + 1);
                }
                if seen.insert(next.as_str()) {
                    queue.push_back((next.as_str(), depth + 1));
                }
            }
        }
        None
    }
}

/// Device and entity registry as handed over by the host system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceRegistry {
    pub entities: BTreeMap<String, EntityInfo>,
    #[serde(default)]
    pub layout: AreaLayout,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: EntityInfo) {
        self.entities.insert(entity.entity_id.clone(), entity);
    }

    pub fn get(&self, entity_id: &str) -> Option<&EntityInfo> {
        self.entities.get(entity_id)
    }

    pub fn area_of(&self, entity_id: &str) -> Option<&str> {
        self.get(entity_id).and_then(|e| e.area.as_deref())
    }

    /// Entity floor, falling back to the floor of its area.
    pub fn floor_of(&self, entity_id: &str) -> Option<i32> {
        let entity = self.get(entity_id)?;
        entity.floor.or_else(|| {
            entity
                .area
                .as_ref()
                .and_then(|a| self.layout.floors.get(a).copied())
        })
    }

    pub fn same_area(&self, a: &str, b: &str) -> bool {
        match (self.area_of(a), self.area_of(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Coarse home classification; drives spatial tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HomeType {
    Apartment,
    SingleFamily,
    MultiStory,
    #[default]
    Unknown,
}

impl HomeType {
    pub fn from_label(label: &str) -> Self {
        let normalized = label.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "apartment" | "condo" | "studio" | "flat" => Self::Apartment,
            "house" | "single_family" | "bungalow" | "cottage" => Self::SingleFamily,
            "multi_story" | "multistory" | "townhouse" | "multi_level" => Self::MultiStory,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Apartment => "apartment",
            Self::SingleFamily => "single_family",
            Self::MultiStory => "multi_story",
            Self::Unknown => "unknown",
        }
    }
}

/// Functional class of an entity, used for relationship labels and features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Presence,
    Contact,
    Environment,
    Lighting,
    Power,
    Climate,
    Cover,
    Media,
    Security,
    Other,
}

impl DeviceClass {
    pub const ALL: [DeviceClass; 10] = [
        Self::Presence,
        Self::Contact,
        Self::Environment,
        Self::Lighting,
        Self::Power,
        Self::Climate,
        Self::Cover,
        Self::Media,
        Self::Security,
        Self::Other,
    ];

    pub fn of(entity: &EntityInfo) -> Self {
        Self::classify(&entity.domain, &entity.entity_id, &entity.capabilities)
    }

    pub fn classify(domain: &str, entity_id: &str, capabilities: &[String]) -> Self {
        let hint = |words: &[&str]| {
            words.iter().any(|w| {
                entity_id.contains(w) || capabilities.iter().any(|c| c.eq_ignore_ascii_case(w))
            })
        };
        match domain {
            "light" => Self::Lighting,
            "switch" | "fan" => Self::Power,
            "climate" | "water_heater" | "humidifier" => Self::Climate,
            "cover" => Self::Cover,
            "media_player" => Self::Media,
            "lock" | "alarm_control_panel" | "siren" => Self::Security,
            "person" | "device_tracker" => Self::Presence,
            "binary_sensor" if hint(&["motion", "occupancy", "presence"]) => Self::Presence,
            "binary_sensor" if hint(&["door", "window", "contact", "opening"]) => Self::Contact,
            "binary_sensor" | "sensor" => Self::Environment,
            _ => Self::Other,
        }
    }

    /// Whether entities of this class accept commands.
    pub fn is_actuator(&self) -> bool {
        matches!(
            self,
            Self::Lighting | Self::Power | Self::Climate | Self::Cover | Self::Media | Self::Security
        )
    }

    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|c| c == self).unwrap_or(Self::ALL.len() - 1)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Presence => "presence",
            Self::Contact => "contact",
            Self::Environment => "environment",
            Self::Lighting => "lighting",
            Self::Power => "power",
            Self::Climate => "climate",
            Self::Cover => "cover",
            Self::Media => "media",
            Self::Security => "security",
            Self::Other => "other",
        }
    }
}

// ─── Patterns ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    TimeOfDay,
    CoOccurrence,
}

impl PatternType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::TimeOfDay => "time_of_day",
            Self::CoOccurrence => "co_occurrence",
        }
    }
}

/// Minutes since local midnight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_minute: u32,
    pub end_minute: u32,
    /// Mean time of the occurrences inside the bucket.
    pub peak_minute: f64,
}

/// Association-rule metrics for a trigger → follower pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssociationMetrics {
    pub support: f64,
    pub confidence: f64,
    pub lift: f64,
    pub mean_lag_secs: f64,
    pub lag_stdev_secs: f64,
}

/// A statistically supported recurring device behaviour.
///
/// Patterns are values: later runs or calibration produce a new Pattern
/// instead of mutating a stored one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub pattern_id: String,
    pub pattern_type: PatternType,
    /// One device for time_of_day; [trigger, follower] for co_occurrence.
    pub device_ids: Vec<String>,
    pub confidence: f64,
    pub raw_confidence: f64,
    pub calibrated: bool,
    pub occurrences: u32,
    pub time_range: Option<TimeRange>,
    pub association: Option<AssociationMetrics>,
    pub created_at: DateTime<Utc>,
}

impl Pattern {
    pub fn time_of_day(device_id: &str, confidence: f64, occurrences: u32, range: TimeRange) -> Self {
        let confidence = confidence.clamp(0.0, 1.0);
        Self {
            pattern_id: uuid::Uuid::new_v4().to_string(),
            pattern_type: PatternType::TimeOfDay,
            device_ids: vec![device_id.to_string()],
            confidence,
            raw_confidence: confidence,
            calibrated: false,
            occurrences,
            time_range: Some(range),
            association: None,
            created_at: Utc::now(),
        }
    }

    pub fn co_occurrence(
        trigger: &str,
        follower: &str,
        occurrences: u32,
        metrics: AssociationMetrics,
    ) -> Self {
        let confidence = metrics.confidence.clamp(0.0, 1.0);
        Self {
            pattern_id: uuid::Uuid::new_v4().to_string(),
            pattern_type: PatternType::CoOccurrence,
            device_ids: vec![trigger.to_string(), follower.to_string()],
            confidence,
            raw_confidence: confidence,
            calibrated: false,
            occurrences,
            time_range: None,
            association: Some(metrics),
            created_at: Utc::now(),
        }
    }

    /// A superseding copy carrying a calibrated confidence.
    pub fn with_calibrated_confidence(&self, confidence: f64) -> Self {
        Self {
            confidence: confidence.clamp(0.0, 1.0),
            calibrated: true,
            ..self.clone()
        }
    }

    pub fn involves(&self, device_id: &str) -> bool {
        self.device_ids.iter().any(|d| d == device_id)
    }
}

// ─── Synergies ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynergyType {
    DevicePair,
    DeviceChain,
    EventContext,
    EnergyContext,
}

impl SynergyType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::DevicePair => "device_pair",
            Self::DeviceChain => "device_chain",
            Self::EventContext => "event_context",
            Self::EnergyContext => "energy_context",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Poor,
    Low,
    Medium,
    High,
}

impl QualityTier {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.70 {
            Self::High
        } else if score >= 0.50 {
            Self::Medium
        } else if score >= 0.30 {
            Self::Low
        } else {
            Self::Poor
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Poor => "poor",
        }
    }
}

/// What the synergy connects, in the host's vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextMetadata {
    pub relationship: String,
    pub trigger_entity: String,
    pub action_entity: String,
    /// Area of the trigger entity.
    pub area: Option<String>,
    #[serde(default)]
    pub same_area: bool,
    #[serde(default)]
    pub cross_floor: bool,
}

/// An inferred beneficial relationship between two or more devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynergyOpportunity {
    pub synergy_id: String,
    pub synergy_type: SynergyType,
    pub device_ids: Vec<String>,
    pub synergy_depth: usize,
    pub impact_score: f64,
    pub confidence: f64,
    pub quality_score: f64,
    pub quality_tier: QualityTier,
    pub context_metadata: ContextMetadata,
    pub validated_by_patterns: bool,
    /// Observations backing the relationship (feeds the frequency component).
    pub occurrences: u32,
    pub explanation: String,
    #[serde(default)]
    pub context_breakdown: BTreeMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl SynergyOpportunity {
    pub fn area(&self) -> Option<&str> {
        self.context_metadata.area.as_deref()
    }
}

// ─── Quality & feedback ─────────────────────────────────────────────────────

/// The four ensemble inputs, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityComponents {
    pub confidence: f64,
    pub frequency: f64,
    pub temporal: f64,
    pub relationship: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum FeedbackSubject {
    Pattern(String),
    Synergy(String),
}

impl FeedbackSubject {
    pub fn id(&self) -> &str {
        match self {
            Self::Pattern(id) | Self::Synergy(id) => id,
        }
    }
}

/// An accept/reject verdict from a user on a scored discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityFeedback {
    pub feedback_id: String,
    pub subject: FeedbackSubject,
    /// Set when the subject is a pattern; drives confidence calibration.
    pub pattern_type: Option<PatternType>,
    pub raw_confidence: Option<f64>,
    pub predicted_quality: f64,
    pub actual_outcome: bool,
    /// `actual − predicted`, with actual mapped to 1.0 / 0.0.
    pub error: f64,
    /// Component values at prediction time.
    pub components: QualityComponents,
    pub timestamp: DateTime<Utc>,
}

impl QualityFeedback {
    pub fn new(
        subject: FeedbackSubject,
        predicted_quality: f64,
        components: QualityComponents,
        accepted: bool,
    ) -> Self {
        let actual = if accepted { 1.0 } else { 0.0 };
        Self {
            feedback_id: uuid::Uuid::new_v4().to_string(),
            subject,
            pattern_type: None,
            raw_confidence: None,
            predicted_quality,
            actual_outcome: accepted,
            error: actual - predicted_quality,
            components,
            timestamp: Utc::now(),
        }
    }

    pub fn for_pattern(mut self, pattern: &Pattern) -> Self {
        self.pattern_type = Some(pattern.pattern_type);
        self.raw_confidence = Some(pattern.raw_confidence);
        self
    }

    pub fn reward(&self) -> f64 {
        if self.actual_outcome {
            1.0
        } else {
            -0.5
        }
    }
}

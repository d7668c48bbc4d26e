// src/index/features.rs — Fixed-length relationship encoding

use crate::core::types::{DeviceClass, DeviceRegistry};

/// Trigger class one-hot (10), action class one-hot (10), same-area flag,
/// normalized lag, hour-of-day sine and cosine.
pub const FEATURE_DIMENSION: usize = 24;

const CLASS_COUNT: usize = DeviceClass::ALL.len();
const SAME_AREA_SLOT: usize = 2 * CLASS_COUNT;
const LAG_SLOT: usize = SAME_AREA_SLOT + 1;
const HOUR_SIN_SLOT: usize = LAG_SLOT + 1;
const HOUR_COS_SLOT: usize = HOUR_SIN_SLOT + 1;

/// Lags at or beyond this many seconds encode as 1.0.
const LAG_SCALE_SECS: f64 = 300.0;

/// What is known about a trigger → action relationship.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelationshipFeatures {
    pub trigger_class: DeviceClass,
    pub action_class: DeviceClass,
    pub same_area: bool,
    pub lag_secs: Option<f64>,
    /// Fractional local hour the relationship is typically active.
    pub hour: Option<f64>,
}

impl RelationshipFeatures {
    /// Classes and area from the registry; unknown entities count as `Other`.
    pub fn from_registry(registry: &DeviceRegistry, trigger: &str, action: &str) -> Self {
        let class = |id: &str| {
            registry
                .get(id)
                .map(|e| e.class())
                .unwrap_or(DeviceClass::Other)
        };
        Self {
            trigger_class: class(trigger),
            action_class: class(action),
            same_area: registry.same_area(trigger, action),
            lag_secs: None,
            hour: None,
        }
    }

    pub fn with_lag(mut self, lag_secs: f64) -> Self {
        self.lag_secs = Some(lag_secs);
        self
    }

    pub fn with_hour(mut self, hour: f64) -> Self {
        self.hour = Some(hour);
        self
    }

    pub fn encode(&self) -> Vec<f32> {
        let mut v = vec![0.0f32; FEATURE_DIMENSION];
        v[self.trigger_class.index()] = 1.0;
        v[CLASS_COUNT + self.action_class.index()] = 1.0;
        if self.same_area {
            v[SAME_AREA_SLOT] = 1.0;
        }
        if let Some(lag) = self.lag_secs.filter(|l| l.is_finite()) {
            v[LAG_SLOT] = (lag.abs() / LAG_SCALE_SECS).min(1.0) as f32;
        }
        if let Some(hour) = self.hour.filter(|h| h.is_finite()) {
            let angle = hour.rem_euclid(24.0) / 24.0 * std::f64::consts::TAU;
            v[HOUR_SIN_SLOT] = angle.sin() as f32;
            v[HOUR_COS_SLOT] = angle.cos() as f32;
        }
        v
    }
}

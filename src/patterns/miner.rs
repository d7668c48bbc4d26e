// src/patterns/miner.rs — Pattern detection from device event history

use crate::core::types::{Event, Pattern, PatternType};
use crate::infra::config::PatternsConfig;
use crate::quality::calibration::ConfidenceCalibrator;

use super::co_occurrence::CoOccurrenceDetector;
use super::event_log::EventLog;
use super::time_of_day::TimeOfDayDetector;

/// Runs every pattern detector over one historical window of events.
pub struct PatternMiner<'a> {
    config: &'a PatternsConfig,
    calibrator: Option<&'a ConfidenceCalibrator>,
}

impl<'a> PatternMiner<'a> {
    pub fn new(config: &'a PatternsConfig) -> Self {
        Self {
            config,
            calibrator: None,
        }
    }

    /// Apply feedback-based calibration to every detected pattern.
    pub fn with_calibrator(mut self, calibrator: &'a ConfidenceCalibrator) -> Self {
        self.calibrator = Some(calibrator);
        self
    }

    /// Mine patterns from raw events. Empty or sparse input gives an empty list.
    pub fn mine(&self, events: &[Event]) -> Vec<Pattern> {
        let log = EventLog::build(events, &self.config.ignored_states, self.config.utc_offset_minutes);
        self.mine_log(&log)
    }

    pub fn mine_log(&self, log: &EventLog) -> Vec<Pattern> {
        if log.is_empty() {
            return Vec::new();
        }

        let mut patterns = Vec::new();

        // 1. Time-of-day routines per device
        patterns.extend(TimeOfDayDetector::new(self.config.time_of_day.clone()).detect(log));

        // 2. Trigger → follower pairs
        patterns.extend(CoOccurrenceDetector::new(self.config.co_occurrence.clone()).detect(log));

        // 3. Calibrate against past outcomes
        if let Some(calibrator) = self.calibrator {
            patterns = patterns.iter().map(|p| calibrator.calibrate(p)).collect();
        }

        let time_of_day = patterns
            .iter()
            .filter(|p| p.pattern_type == PatternType::TimeOfDay)
            .count();
        tracing::info!(
            "Mined {} patterns ({} time_of_day, {} co_occurrence) from {} state changes",
            patterns.len(),
            time_of_day,
            patterns.len() - time_of_day,
            log.len()
        );
        patterns
    }
}

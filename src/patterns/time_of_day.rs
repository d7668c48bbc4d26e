// src/patterns/time_of_day.rs — Recurring time-of-day behaviour per device

use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

use super::event_log::{EventLog, StateChange};
use crate::core::types::{Pattern, TimeRange};
use crate::infra::config::TimeOfDayConfig;

/// Weight of temporal consistency vs. day coverage in the pattern confidence.
const CONSISTENCY_WEIGHT: f64 = 0.7;

/// Detects devices that change state in the same time-of-day bucket across days.
pub struct TimeOfDayDetector {
    config: TimeOfDayConfig,
}

impl TimeOfDayDetector {
    pub fn new(config: TimeOfDayConfig) -> Self {
        Self { config }
    }

    /// One pattern per qualifying (device, bucket). Sparse input yields nothing.
    pub fn detect(&self, log: &EventLog) -> Vec<Pattern> {
        let entities: Vec<&str> = log.entities().collect();

        let mut patterns: Vec<Pattern> = entities
            .par_iter()
            .flat_map_iter(|entity| self.detect_for_device(entity, log.changes(entity)))
            .collect();

        patterns.sort_by(|a, b| {
            a.device_ids.cmp(&b.device_ids).then_with(|| {
                let sa = a.time_range.map(|r| r.start_minute).unwrap_or(0);
                let sb = b.time_range.map(|r| r.start_minute).unwrap_or(0);
                sa.cmp(&sb)
            })
        });

        tracing::debug!(
            "TimeOfDay: {} patterns across {} devices",
            patterns.len(),
            entities.len()
        );
        patterns
    }

    fn detect_for_device(&self, device_id: &str, changes: &[StateChange]) -> Vec<Pattern> {
        let min_occurrences = self.config.min_occurrences.max(1) as usize;
        if changes.len() < min_occurrences {
            return Vec::new();
        }

        let bucket_minutes = self.config.bucket_minutes.max(1);
        let observed_days: BTreeSet<_> = changes.iter().map(|c| c.day).collect();

        let mut buckets: BTreeMap<u32, Vec<&StateChange>> = BTreeMap::new();
        for change in changes {
            buckets
                .entry(change.minute_of_day / bucket_minutes)
                .or_default()
                .push(change);
        }

        let mut patterns = Vec::new();
        for (bucket, members) in &buckets {
            // A routine recurs across days; bursts within one day count once
            let bucket_days: BTreeSet<_> = members.iter().map(|c| c.day).collect();
            if bucket_days.len() < min_occurrences {
                continue;
            }

            let minutes: Vec<f64> = members.iter().map(|c| c.minute_of_day as f64).collect();
            let (mean, stdev) = mean_and_stdev(&minutes);

            let half_width = bucket_minutes as f64 / 2.0;
            let consistency = (1.0 - stdev / half_width).clamp(0.0, 1.0);

            let coverage = bucket_days.len() as f64 / observed_days.len().max(1) as f64;

            let confidence =
                CONSISTENCY_WEIGHT * consistency + (1.0 - CONSISTENCY_WEIGHT) * coverage;
            if confidence < self.config.min_confidence {
                continue;
            }

            patterns.push(Pattern::time_of_day(
                device_id,
                confidence,
                bucket_days.len() as u32,
                TimeRange {
                    start_minute: bucket * bucket_minutes,
                    end_minute: (bucket + 1) * bucket_minutes,
                    peak_minute: mean,
                },
            ));
        }
        patterns
    }
}

/// Population mean and standard deviation.
pub(crate) fn mean_and_stdev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Event;
    use chrono::{Duration, TimeZone, Utc};

    fn daily(entity: &str, days: i64, hour: u32, minute: u32) -> Vec<Event> {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, hour, minute, 0).unwrap();
        (0..days)
            .map(|d| Event::new(start + Duration::days(d), entity, "on"))
            .collect()
    }

    fn detect(events: &[Event]) -> Vec<Pattern> {
        let log = EventLog::build(events, &[], 0);
        TimeOfDayDetector::new(TimeOfDayConfig::default()).detect(&log)
    }

    #[test]
    fn test_daily_toggle_yields_one_pattern() {
        let patterns = detect(&daily("light.kitchen", 20, 7, 0));
        assert_eq!(patterns.len(), 1);
        let p = &patterns[0];
        assert!(p.confidence > 0.85);
        assert_eq!(p.occurrences, 20);
        let range = p.time_range.unwrap();
        assert_eq!(range.start_minute, 420);
        assert_eq!(range.end_minute, 480);
        assert!((range.peak_minute - 420.0).abs() < 1e-9);
    }

    #[test]
    fn test_below_min_occurrences_emits_nothing() {
        assert!(detect(&daily("light.kitchen", 2, 7, 0)).is_empty());
    }

    #[test]
    fn test_single_day_burst_is_not_a_routine() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 7, 0, 0).unwrap();
        let events: Vec<Event> = (0..3)
            .flat_map(|m| {
                let t = start + Duration::minutes(m * 10);
                [
                    Event::new(t, "light.porch", "on"),
                    Event::new(t + Duration::minutes(1), "light.porch", "off"),
                ]
            })
            .collect();
        assert!(detect(&events).is_empty());
    }

    #[test]
    fn test_occurrences_count_days_not_toggles() {
        let mut events = daily("light.kitchen", 5, 7, 0);
        events.extend(
            daily("light.kitchen", 5, 7, 20)
                .into_iter()
                .map(|e| Event::new(e.timestamp, e.entity_id, "off")),
        );
        let patterns = detect(&events);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].occurrences, 5);
    }

    #[test]
    fn test_empty_input() {
        assert!(detect(&[]).is_empty());
    }

    #[test]
    fn test_scattered_times_fall_below_confidence() {
        // Spread across the whole bucket: high variance, and only a third of
        // observed days land in any bucket.
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut events = Vec::new();
        for d in 0..30 {
            let minute = ((d * 37) % 60) as i64;
            let hour = (d % 3) as i64 * 6;
            events.push(Event::new(
                start + Duration::days(d) + Duration::hours(hour) + Duration::minutes(minute),
                "switch.pump",
                "on",
            ));
        }
        assert!(detect(&events).is_empty());
    }

    #[test]
    fn test_two_buckets_for_morning_and_evening() {
        let mut events = daily("light.hall", 10, 7, 5);
        events.extend(daily("light.hall", 10, 19, 30));
        let patterns = detect(&events);
        assert_eq!(patterns.len(), 2);
        assert_eq!(patterns[0].time_range.unwrap().start_minute, 420);
        assert_eq!(patterns[1].time_range.unwrap().start_minute, 1140);
    }

    #[test]
    fn test_mean_and_stdev() {
        let (m, s) = mean_and_stdev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((m - 5.0).abs() < 1e-9);
        assert!((s - 2.0).abs() < 1e-9);
        assert_eq!(mean_and_stdev(&[]), (0.0, 0.0));
    }
}

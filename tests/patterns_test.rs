// tests/patterns_test.rs — Integration test: pattern mining over event history

use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;

use hearth::core::types::{Event, PatternType};
use hearth::infra::config::PatternsConfig;
use hearth::patterns::PatternMiner;
use hearth::quality::ConfidenceCalibrator;

fn day0(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, hour, minute, 0).unwrap()
}

#[test]
fn test_daily_toggle_at_seven() {
    let events: Vec<Event> = (0..20)
        .map(|d| Event::new(day0(7, 0) + Duration::days(d), "light.porch", "on"))
        .collect();
    let config = PatternsConfig::default();
    let patterns = PatternMiner::new(&config).mine(&events);

    assert_eq!(patterns.len(), 1);
    let p = &patterns[0];
    assert_eq!(p.pattern_type, PatternType::TimeOfDay);
    assert_eq!(p.device_ids, vec!["light.porch".to_string()]);
    assert_eq!(p.occurrences, 20);
    assert!(p.confidence > 0.85, "confidence {}", p.confidence);
    let range = p.time_range.unwrap();
    assert_eq!((range.start_minute, range.end_minute), (420, 480));
}

#[test]
fn test_follower_on_fifteen_of_twenty_windows() {
    let mut events = Vec::new();
    for d in 0..20 {
        let t = day0(12, 0) + Duration::days(d);
        events.push(Event::new(t, "binary_sensor.front_door", "on"));
        if d < 15 {
            events.push(Event::new(t + Duration::seconds(10), "light.entry", "on"));
        }
    }
    let mut config = PatternsConfig::default();
    config.co_occurrence.window_seconds = 30;
    let patterns = PatternMiner::new(&config).mine(&events);

    let co: Vec<_> = patterns
        .iter()
        .filter(|p| p.pattern_type == PatternType::CoOccurrence)
        .collect();
    assert_eq!(co.len(), 1);
    assert_eq!(
        co[0].device_ids,
        vec!["binary_sensor.front_door".to_string(), "light.entry".to_string()]
    );
    let metrics = co[0].association.unwrap();
    assert!((metrics.support - 0.75).abs() < 1e-9);
    assert!((metrics.confidence - 0.75).abs() < 1e-9);
    assert!((metrics.mean_lag_secs - 10.0).abs() < 1e-9);
    assert_eq!(co[0].occurrences, 15);
}

#[test]
fn test_sparse_history_is_empty_not_an_error() {
    let events = vec![
        Event::new(day0(7, 0), "light.porch", "on"),
        Event::new(day0(7, 0) + Duration::days(1), "light.porch", "on"),
    ];
    let config = PatternsConfig::default();
    assert!(PatternMiner::new(&config).mine(&events).is_empty());
    assert!(PatternMiner::new(&config).mine(&[]).is_empty());
}

#[test]
fn test_repeated_reports_on_one_morning_are_not_a_routine() {
    let events: Vec<Event> = (0..3)
        .map(|m| Event::new(day0(7, m), "light.porch", "on"))
        .collect();
    let config = PatternsConfig::default();
    assert!(PatternMiner::new(&config).mine(&events).is_empty());
}

#[test]
fn test_ignored_states_never_form_patterns() {
    let events: Vec<Event> = (0..20)
        .map(|d| Event::new(day0(7, 0) + Duration::days(d), "light.porch", "unavailable"))
        .collect();
    let config = PatternsConfig::default();
    assert!(PatternMiner::new(&config).mine(&events).is_empty());
}

#[test]
fn test_local_offset_moves_the_bucket() {
    // 05:00 UTC is 07:00 at UTC+2
    let events: Vec<Event> = (0..10)
        .map(|d| Event::new(day0(5, 0) + Duration::days(d), "cover.bedroom", "open"))
        .collect();
    let config = PatternsConfig {
        utc_offset_minutes: 120,
        ..PatternsConfig::default()
    };
    let patterns = PatternMiner::new(&config).mine(&events);
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].time_range.unwrap().start_minute, 420);
}

#[test]
fn test_calibration_supersedes_confidence() {
    let events: Vec<Event> = (0..20)
        .map(|d| Event::new(day0(7, 0) + Duration::days(d), "light.porch", "on"))
        .collect();
    let config = PatternsConfig::default();
    let raw = PatternMiner::new(&config).mine(&events);
    let raw_confidence = raw[0].confidence;

    let mut calibrator = ConfidenceCalibrator::new(5);
    for _ in 0..10 {
        calibrator.record(PatternType::TimeOfDay, raw_confidence, false);
    }
    let calibrated = PatternMiner::new(&config)
        .with_calibrator(&calibrator)
        .mine(&events);

    assert_eq!(calibrated.len(), 1);
    assert!(calibrated[0].calibrated);
    assert_eq!(calibrated[0].raw_confidence, raw_confidence);
    assert!(calibrated[0].confidence < raw_confidence);
}

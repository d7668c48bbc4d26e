// src/patterns/event_log.rs — Cleaned, time-decomposed event history

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use std::collections::{BTreeMap, HashMap};

use crate::core::types::Event;

/// One real state change, with its local time decomposition.
#[derive(Debug, Clone)]
pub struct StateChange {
    pub timestamp: DateTime<Utc>,
    pub state: String,
    pub day: NaiveDate,
    pub minute_of_day: u32,
}

/// The event history a run works on: sorted, de-noised, grouped by entity.
#[derive(Debug, Default)]
pub struct EventLog {
    by_entity: BTreeMap<String, Vec<StateChange>>,
    /// Every retained change in time order, as (timestamp, entity_id).
    timeline: Vec<(DateTime<Utc>, String)>,
}

/// What the log last kept for one entity.
struct LastRetained<'e> {
    state: &'e str,
    day: NaiveDate,
    timestamp: DateTime<Utc>,
    /// States already kept at `timestamp`.
    states_at_timestamp: Vec<&'e str>,
}

impl EventLog {
    /// Build from raw events. Dropped before detection:
    /// ignored states, exact duplicates (same entity, state and timestamp),
    /// and re-reports of the retained state on the same local day.
    pub fn build(events: &[Event], ignored_states: &[String], utc_offset_minutes: i32) -> Self {
        let mut sorted: Vec<&Event> = events.iter().collect();
        sorted.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        let offset = Duration::minutes(utc_offset_minutes as i64);
        let mut last_kept: HashMap<&str, LastRetained<'_>> = HashMap::new();
        let mut log = EventLog::default();

        for event in sorted {
            if event.entity_id.is_empty()
                || ignored_states.iter().any(|s| s.eq_ignore_ascii_case(&event.state))
            {
                continue;
            }
            let local = event.timestamp.naive_utc() + offset;
            let day = local.date();
            let state = event.state.as_str();

            match last_kept.get_mut(event.entity_id.as_str()) {
                Some(last) => {
                    let same_instant = last.timestamp == event.timestamp;
                    if same_instant && last.states_at_timestamp.contains(&state) {
                        continue;
                    }
                    if last.state == state && last.day == day {
                        continue;
                    }
                    if !same_instant {
                        last.timestamp = event.timestamp;
                        last.states_at_timestamp.clear();
                    }
                    last.states_at_timestamp.push(state);
                    last.state = state;
                    last.day = day;
                }
                None => {
                    last_kept.insert(
                        &event.entity_id,
                        LastRetained {
                            state,
                            day,
                            timestamp: event.timestamp,
                            states_at_timestamp: vec![state],
                        },
                    );
                }
            }

            log.by_entity
                .entry(event.entity_id.clone())
                .or_default()
                .push(StateChange {
                    timestamp: event.timestamp,
                    state: event.state.clone(),
                    day,
                    minute_of_day: local.hour() * 60 + local.minute(),
                });
            log.timeline.push((event.timestamp, event.entity_id.clone()));
        }

        let dropped = events.len() - log.timeline.len();
        if dropped > 0 {
            tracing::debug!(
                "Event log: kept {} of {} events ({} duplicates/repeats/ignored)",
                log.timeline.len(),
                events.len(),
                dropped
            );
        }
        log
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.by_entity.keys().map(String::as_str)
    }

    pub fn changes(&self, entity_id: &str) -> &[StateChange] {
        self.by_entity
            .get(entity_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn timeline(&self) -> &[(DateTime<Utc>, String)] {
        &self.timeline
    }

    pub fn len(&self) -> usize {
        self.timeline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_drops_duplicates_and_ignored() {
        let events = vec![
            Event::new(at(7, 0), "light.kitchen", "on"),
            Event::new(at(7, 0), "light.kitchen", "on"),
            Event::new(at(7, 2), "light.kitchen", "unavailable"),
            Event::new(at(7, 3), "light.kitchen", "off"),
        ];
        let log = EventLog::build(&events, &["unavailable".to_string()], 0);
        assert_eq!(log.changes("light.kitchen").len(), 2);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_same_state_reports_within_a_day_collapse() {
        let events = vec![
            Event::new(at(7, 0), "light.porch", "on"),
            Event::new(at(7, 1), "light.porch", "on"),
            Event::new(at(7, 2), "light.porch", "on"),
            Event::new(at(9, 0), "light.porch", "off"),
            Event::new(at(9, 30), "light.porch", "on"),
        ];
        let log = EventLog::build(&events, &[], 0);
        let states: Vec<&str> = log
            .changes("light.porch")
            .iter()
            .map(|c| c.state.as_str())
            .collect();
        assert_eq!(states, vec!["on", "off", "on"]);
        assert_eq!(log.changes("light.porch")[0].minute_of_day, 7 * 60);
    }

    #[test]
    fn test_exact_duplicate_behind_other_state_is_dropped() {
        let events = vec![
            Event::new(at(7, 0), "light.kitchen", "on"),
            Event::new(at(7, 0), "light.kitchen", "off"),
            Event::new(at(7, 0), "light.kitchen", "on"),
        ];
        let log = EventLog::build(&events, &[], 0);
        assert_eq!(log.changes("light.kitchen").len(), 2);
    }

    #[test]
    fn test_keeps_same_state_on_different_days() {
        let events = vec![
            Event::new(at(7, 0), "light.kitchen", "on"),
            Event::new(at(7, 0) + Duration::days(1), "light.kitchen", "on"),
        ];
        let log = EventLog::build(&events, &[], 0);
        assert_eq!(log.changes("light.kitchen").len(), 2);
    }

    #[test]
    fn test_sorts_unordered_input() {
        let events = vec![
            Event::new(at(9, 0), "switch.fan", "off"),
            Event::new(at(8, 0), "switch.fan", "on"),
        ];
        let log = EventLog::build(&events, &[], 0);
        let changes = log.changes("switch.fan");
        assert_eq!(changes[0].state, "on");
        assert_eq!(changes[0].minute_of_day, 8 * 60);
    }

    #[test]
    fn test_local_offset_shifts_minute_and_day() {
        let events = vec![Event::new(at(23, 30), "light.porch", "on")];
        let log = EventLog::build(&events, &[], 60);
        let change = &log.changes("light.porch")[0];
        assert_eq!(change.minute_of_day, 30);
        assert_eq!(change.day, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
    }

    #[test]
    fn test_unknown_entity_is_empty() {
        let log = EventLog::build(&[], &[], 0);
        assert!(log.is_empty());
        assert!(log.changes("light.none").is_empty());
    }
}

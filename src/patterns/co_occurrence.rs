// src/patterns/co_occurrence.rs — Trigger → follower association mining

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};

use super::event_log::EventLog;
use super::time_of_day::mean_and_stdev;
use crate::core::types::{AssociationMetrics, Pattern};
use crate::infra::config::{CoOccurrenceConfig, MAX_CO_OCCURRENCE_WINDOW_SECONDS};

/// Counts state changes of one device that follow another within a window,
/// and scores the pair the way association-rule mining scores an itemset.
pub struct CoOccurrenceDetector {
    config: CoOccurrenceConfig,
}

/// Share of global transactions each entity appears in.
struct TransactionStats {
    total: usize,
    per_entity: HashMap<String, usize>,
}

impl TransactionStats {
    /// Segment the timeline into fixed windows: each event further than
    /// `window` from the current window start opens a new transaction.
    fn build(log: &EventLog, window: Duration) -> Self {
        let mut total = 0usize;
        let mut per_entity: HashMap<String, usize> = HashMap::new();
        let mut current_start: Option<DateTime<Utc>> = None;
        let mut members: BTreeSet<&str> = BTreeSet::new();

        for (ts, entity) in log.timeline() {
            let open_new = match current_start {
                Some(start) => *ts - start > window,
                None => true,
            };
            if open_new {
                for m in &members {
                    *per_entity.entry(m.to_string()).or_default() += 1;
                }
                members.clear();
                current_start = Some(*ts);
                total += 1;
            }
            members.insert(entity.as_str());
        }
        for m in &members {
            *per_entity.entry(m.to_string()).or_default() += 1;
        }

        Self { total, per_entity }
    }

    fn probability(&self, entity: &str) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.per_entity.get(entity).copied().unwrap_or(0) as f64 / self.total as f64
    }
}

/// Raw counts for one direction of a pair.
#[derive(Debug, Clone)]
struct DirectionStats {
    hits: u32,
    metrics: AssociationMetrics,
}

impl CoOccurrenceDetector {
    pub fn new(config: CoOccurrenceConfig) -> Self {
        Self { config }
    }

    pub fn detect(&self, log: &EventLog) -> Vec<Pattern> {
        let window = Duration::seconds(
            self.config
                .window_seconds
                .clamp(1, MAX_CO_OCCURRENCE_WINDOW_SECONDS),
        );
        let min_occurrences = self.config.min_occurrences.max(1) as usize;

        let times: Vec<(&str, Vec<DateTime<Utc>>)> = log
            .entities()
            .map(|e| (e, log.changes(e).iter().map(|c| c.timestamp).collect()))
            .filter(|(_, ts): &(&str, Vec<DateTime<Utc>>)| ts.len() >= min_occurrences)
            .collect();
        if times.len() < 2 {
            return Vec::new();
        }

        let stats = TransactionStats::build(log, window);

        let mut patterns: Vec<Pattern> = (0..times.len())
            .into_par_iter()
            .flat_map_iter(|i| {
                let (a, a_times) = &times[i];
                times[i + 1..]
                    .iter()
                    .filter_map(|(b, b_times)| {
                        let forward = self.evaluate(a_times, b_times, b, window, &stats);
                        let backward = self.evaluate(b_times, a_times, a, window, &stats);
                        let (trigger, follower, best) = match (forward, backward) {
                            (Some(f), Some(r)) if rank(&r) > rank(&f) => (*b, *a, r),
                            (Some(f), _) => (*a, *b, f),
                            (None, Some(r)) => (*b, *a, r),
                            (None, None) => return None,
                        };
                        Some(Pattern::co_occurrence(trigger, follower, best.hits, best.metrics))
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        patterns.sort_by(|x, y| x.device_ids.cmp(&y.device_ids));
        tracing::debug!(
            "CoOccurrence: {} patterns from {} active devices ({} transactions)",
            patterns.len(),
            times.len(),
            stats.total
        );
        patterns
    }

    /// Score `trigger → follower`. `None` unless every threshold is met.
    fn evaluate(
        &self,
        trigger: &[DateTime<Utc>],
        follower: &[DateTime<Utc>],
        follower_id: &str,
        window: Duration,
        stats: &TransactionStats,
    ) -> Option<DirectionStats> {
        if trigger.is_empty() || follower.is_empty() {
            return None;
        }

        let mut lags = Vec::new();
        for t in trigger {
            let next = follower.partition_point(|f| f < t);
            if let Some(f) = follower.get(next) {
                if *f - *t <= window {
                    lags.push((*f - *t).num_milliseconds() as f64 / 1000.0);
                }
            }
        }
        let hits = lags.len();
        if hits < self.config.min_occurrences.max(1) as usize {
            return None;
        }

        // Follower changes outside every trigger window are their own observation windows.
        let orphans = follower
            .iter()
            .filter(|f| {
                let idx = trigger.partition_point(|t| t <= *f);
                idx == 0 || **f - trigger[idx - 1] > window
            })
            .count();

        let windows = trigger.len() + orphans;
        let support = hits as f64 / windows as f64;
        let confidence = hits as f64 / trigger.len() as f64;
        if support < self.config.min_support || confidence < self.config.min_confidence {
            return None;
        }

        let p_follower = stats.probability(follower_id);
        let lift = if p_follower > 0.0 {
            confidence / p_follower
        } else {
            0.0
        };
        let (mean_lag, lag_stdev) = mean_and_stdev(&lags);

        Some(DirectionStats {
            hits: hits as u32,
            metrics: AssociationMetrics {
                support,
                confidence,
                lift,
                mean_lag_secs: mean_lag,
                lag_stdev_secs: lag_stdev,
            },
        })
    }
}

/// Ordering key for choosing between the two directions of a pair.
fn rank(s: &DirectionStats) -> (f64, f64, u32) {
    (s.metrics.confidence, s.metrics.support, s.hits)
}

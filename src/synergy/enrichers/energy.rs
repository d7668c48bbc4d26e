// src/synergy/enrichers/energy.rs — Load shifting estimates for heavy consumers

use super::{Enricher, Enrichment, EnrichmentContext};
use crate::core::types::{EntityInfo, SynergyType};
use crate::infra::config::EnergyConfig;
use crate::infra::errors::HearthError;
use crate::synergy::candidates::SynergyCandidate;

const DAYS_PER_MONTH: f64 = 30.0;
const DEFAULT_RUNTIME_HOURS: f64 = 1.0;
/// Share of usage assumed to fall in the peak window when no routine says otherwise.
const UNKNOWN_PEAK_SHARE: f64 = 0.5;

/// Typical rated power (kW) for loads worth shifting.
const KNOWN_LOADS: &[(&str, f64)] = &[
    ("ev_charger", 7.0),
    ("water_heater", 4.0),
    ("dryer", 3.0),
    ("heater", 2.0),
    ("pool_pump", 1.5),
    ("dishwasher", 1.2),
    ("washer", 0.5),
];

/// Rated kW for an entity worth shifting, or `None` for light loads.
pub fn rated_kw(entity: &EntityInfo) -> Option<f64> {
    if let Some((_, kw)) = KNOWN_LOADS
        .iter()
        .find(|(name, _)| entity.entity_id.contains(name))
    {
        return Some(*kw);
    }
    match entity.domain.as_str() {
        "water_heater" => Some(4.0),
        "climate" => Some(2.0),
        "switch" if entity.has_capability("power") || entity.has_capability("energy") => Some(1.0),
        _ => None,
    }
}

fn in_peak(hour: f64, config: &EnergyConfig) -> bool {
    let (start, end) = (config.peak_start_hour as f64, config.peak_end_hour as f64);
    if start <= end {
        hour >= start && hour < end
    } else {
        hour >= start || hour < end
    }
}

/// Estimates what moving the action's usage out of the peak tariff saves.
pub struct EnergyEnricher;

impl Enricher for EnergyEnricher {
    fn name(&self) -> &str {
        "energy"
    }

    fn enrich(
        &self,
        candidate: &SynergyCandidate,
        ctx: &EnrichmentContext<'_>,
    ) -> Result<Option<Enrichment>, HearthError> {
        let Some(entity) = ctx.registry.get(&candidate.action) else {
            return Ok(None);
        };
        let Some(kw) = rated_kw(entity) else {
            return Ok(None);
        };
        let config = &ctx.config.energy;

        let peak_hours: Vec<f64> = ctx
            .time_of_day(&candidate.action)
            .iter()
            .filter_map(|p| p.time_range.map(|r| r.peak_minute / 60.0))
            .collect();
        let (peak_share, observed) = if peak_hours.is_empty() {
            (UNKNOWN_PEAK_SHARE, false)
        } else {
            let in_window = peak_hours.iter().filter(|h| in_peak(**h, config)).count();
            (in_window as f64 / peak_hours.len() as f64, true)
        };
        if peak_share <= 0.0 {
            // Already runs off-peak; nothing to shift
            return Ok(None);
        }

        let monthly_kwh = kw * DEFAULT_RUNTIME_HOURS * DAYS_PER_MONTH * peak_share;
        let price_gap = (config.peak_price - config.off_peak_price).max(0.0);
        let monthly_savings = monthly_kwh * price_gap;
        let strength = if config.savings_norm > 0.0 {
            (monthly_savings / config.savings_norm).min(1.0)
        } else {
            0.0
        };
        let confidence = if observed { 0.6 } else { 0.4 };

        Ok(Some(
            Enrichment::support(self.name(), Some(SynergyType::EnergyContext), strength, confidence)
                .with_meta("rated_kw", kw)
                .with_meta("peak_share", peak_share)
                .with_meta("monthly_kwh_shifted", monthly_kwh)
                .with_meta("monthly_savings", (monthly_savings * 100.0).round() / 100.0)
                .with_meta("peak_window", format!("{:02}:00-{:02}:00", config.peak_start_hour, config.peak_end_hour))
                .with_meta("usage_observed", observed),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{DeviceRegistry, HomeType, Pattern, TimeRange};
    use crate::infra::config::SynergyConfig;
    use crate::synergy::candidates::CandidateSource;

    fn registry() -> DeviceRegistry {
        let mut r = DeviceRegistry::new();
        r.insert(EntityInfo::new("binary_sensor.garage_door", Some("garage")));
        r.insert(EntityInfo::new("switch.ev_charger", Some("garage")));
        r.insert(EntityInfo::new("switch.garage_radio", Some("garage")));
        r.insert(EntityInfo::new("switch.freezer", Some("garage")).with_capabilities(&["power"]));
        r
    }

    fn enrich(patterns: &[Pattern], action: &str) -> Option<Enrichment> {
        let registry = registry();
        let config = SynergyConfig::default();
        let ctx = EnrichmentContext {
            registry: &registry,
            home_type: HomeType::SingleFamily,
            patterns,
            index: None,
            config: &config,
        };
        EnergyEnricher
            .enrich(
                &SynergyCandidate::new("binary_sensor.garage_door", action, CandidateSource::Spatial),
                &ctx,
            )
            .unwrap()
    }

    fn evening(device: &str, minute: f64) -> Pattern {
        Pattern::time_of_day(
            device,
            0.9,
            20,
            TimeRange {
                start_minute: 0,
                end_minute: 1440,
                peak_minute: minute,
            },
        )
    }

    #[test]
    fn test_light_loads_are_ignored() {
        assert!(enrich(&[], "switch.garage_radio").is_none());
    }

    #[test]
    fn test_peak_usage_saves_money() {
        let e = enrich(&[evening("switch.ev_charger", 18.0 * 60.0)], "switch.ev_charger").unwrap();
        assert_eq!(e.suggested_type, Some(SynergyType::EnergyContext));
        // 7 kW * 1 h * 30 days * $0.20 = $42/month, well over the norm
        assert_eq!(e.strength, 1.0);
        assert_eq!(e.confidence, 0.6);
        assert_eq!(e.metadata["monthly_savings"], 42.0);
    }

    #[test]
    fn test_off_peak_usage_has_nothing_to_shift() {
        assert!(enrich(&[evening("switch.ev_charger", 2.0 * 60.0)], "switch.ev_charger").is_none());
    }

    #[test]
    fn test_unobserved_metered_switch() {
        let e = enrich(&[], "switch.freezer").unwrap();
        // 1 kW * 30 h * 0.5 * $0.20 = $3
        assert!((e.strength - 0.3).abs() < 1e-9);
        assert_eq!(e.confidence, 0.4);
    }

    #[test]
    fn test_peak_window_wraps_midnight() {
        let config = EnergyConfig {
            peak_start_hour: 22,
            peak_end_hour: 2,
            ..EnergyConfig::default()
        };
        assert!(in_peak(23.0, &config));
        assert!(in_peak(1.0, &config));
        assert!(!in_peak(12.0, &config));
    }
}

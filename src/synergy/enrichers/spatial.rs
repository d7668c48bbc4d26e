// src/synergy/enrichers/spatial.rs — Area adjacency with home-type tolerance

use super::{Enricher, Enrichment, EnrichmentContext};
use crate::core::types::{HomeType, SynergyType};
use crate::infra::errors::HearthError;
use crate::synergy::candidates::SynergyCandidate;

/// How far apart two areas may be, and how fast the signal fades per hop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialTolerance {
    pub max_hops: u32,
    pub decay_per_hop: f64,
    pub allow_cross_floor: bool,
}

impl SpatialTolerance {
    pub fn for_home(home_type: HomeType) -> Self {
        match home_type {
            HomeType::Apartment => Self {
                max_hops: 1,
                decay_per_hop: 0.5,
                allow_cross_floor: false,
            },
            HomeType::SingleFamily => Self {
                max_hops: 1,
                decay_per_hop: 0.6,
                allow_cross_floor: false,
            },
            HomeType::MultiStory => Self {
                max_hops: 2,
                decay_per_hop: 0.7,
                allow_cross_floor: true,
            },
            HomeType::Unknown => Self {
                max_hops: 1,
                decay_per_hop: 0.5,
                allow_cross_floor: false,
            },
        }
    }
}

const CROSS_FLOOR_PENALTY: f64 = 0.8;

pub struct SpatialEnricher;

impl Enricher for SpatialEnricher {
    fn name(&self) -> &str {
        "spatial"
    }

    fn enrich(
        &self,
        candidate: &SynergyCandidate,
        ctx: &EnrichmentContext<'_>,
    ) -> Result<Option<Enrichment>, HearthError> {
        let registry = ctx.registry;
        let (Some(t_area), Some(a_area)) = (
            registry.area_of(&candidate.trigger),
            registry.area_of(&candidate.action),
        ) else {
            return Ok(None);
        };

        let tolerance = SpatialTolerance::for_home(ctx.home_type);
        let cross_floor = match (
            registry.floor_of(&candidate.trigger),
            registry.floor_of(&candidate.action),
        ) {
            (Some(a), Some(b)) => a != b,
            _ => false,
        };
        let hops = registry.layout.hops(t_area, a_area, tolerance.max_hops);

        let strength = match hops {
            Some(_) if cross_floor && !tolerance.allow_cross_floor => 0.0,
            Some(h) => {
                let base = tolerance.decay_per_hop.powi(h as i32);
                if cross_floor {
                    base * CROSS_FLOOR_PENALTY
                } else {
                    base
                }
            }
            None => 0.0,
        };

        let suggested = (strength > 0.0).then_some(SynergyType::DevicePair);
        let mut enrichment = Enrichment::support(self.name(), suggested, strength, 0.6 * strength)
            .with_meta("trigger_area", t_area)
            .with_meta("action_area", a_area)
            .with_meta("same_area", t_area == a_area)
            .with_meta("cross_floor", cross_floor)
            .with_meta("home_type", ctx.home_type.as_str())
            .with_meta("within_tolerance", strength > 0.0);
        if let Some(h) = hops {
            enrichment = enrichment.with_meta("hops", h);
        }
        Ok(Some(enrichment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{DeviceRegistry, EntityInfo};
    use crate::infra::config::SynergyConfig;
    use crate::synergy::candidates::CandidateSource;

    fn registry() -> DeviceRegistry {
        let mut r = DeviceRegistry::new();
        r.layout.connect("hall", "kitchen");
        r.layout.connect("kitchen", "pantry");
        r.layout.connect("hall", "landing");
        r.layout.set_floor("hall", 0);
        r.layout.set_floor("kitchen", 0);
        r.layout.set_floor("pantry", 0);
        r.layout.set_floor("landing", 1);
        r.insert(EntityInfo::new("binary_sensor.hall_motion", Some("hall")));
        r.insert(EntityInfo::new("light.hall", Some("hall")));
        r.insert(EntityInfo::new("light.kitchen", Some("kitchen")));
        r.insert(EntityInfo::new("light.pantry", Some("pantry")));
        r.insert(EntityInfo::new("light.landing", Some("landing")));
        r.insert(EntityInfo::new("light.nowhere", None));
        r
    }

    fn run(home_type: HomeType, action: &str) -> Option<Enrichment> {
        let registry = registry();
        let config = SynergyConfig::default();
        let ctx = EnrichmentContext {
            registry: &registry,
            home_type,
            patterns: &[],
            index: None,
            config: &config,
        };
        let candidate = SynergyCandidate::new("binary_sensor.hall_motion", action, CandidateSource::Spatial);
        SpatialEnricher.enrich(&candidate, &ctx).unwrap()
    }

    #[test]
    fn test_same_area_is_full_strength() {
        let e = run(HomeType::Apartment, "light.hall").unwrap();
        assert_eq!(e.strength, 1.0);
        assert_eq!(e.suggested_type, Some(SynergyType::DevicePair));
        assert_eq!(e.metadata["same_area"], true);
    }

    #[test]
    fn test_tolerance_by_home_type() {
        let apt = run(HomeType::Apartment, "light.kitchen").unwrap();
        assert!((apt.strength - 0.5).abs() < 1e-9);
        let house = run(HomeType::SingleFamily, "light.kitchen").unwrap();
        assert!((house.strength - 0.6).abs() < 1e-9);

        // Two hops: only a multi-story home reaches that far
        assert_eq!(run(HomeType::Apartment, "light.pantry").unwrap().strength, 0.0);
        let multi = run(HomeType::MultiStory, "light.pantry").unwrap();
        assert!((multi.strength - 0.49).abs() < 1e-9);
    }

    #[test]
    fn test_cross_floor_is_flagged() {
        let apt = run(HomeType::Apartment, "light.landing").unwrap();
        assert_eq!(apt.metadata["cross_floor"], true);
        assert_eq!(apt.strength, 0.0);
        assert_eq!(apt.suggested_type, None);

        let multi = run(HomeType::MultiStory, "light.landing").unwrap();
        assert!((multi.strength - 0.7 * 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_area_has_no_opinion() {
        assert!(run(HomeType::Apartment, "light.nowhere").is_none());
    }
}

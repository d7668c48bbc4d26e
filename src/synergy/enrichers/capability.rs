// src/synergy/enrichers/capability.rs — Physical plausibility checks

use super::{Enricher, Enrichment, EnrichmentContext};
use crate::core::types::{DeviceClass, DeviceRegistry};
use crate::infra::errors::HearthError;
use crate::synergy::candidates::SynergyCandidate;

/// What an entity can do.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceCapabilities {
    pub class: DeviceClass,
    pub capabilities: Vec<String>,
    pub manufacturer: Option<String>,
}

impl DeviceCapabilities {
    pub fn has(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c.eq_ignore_ascii_case(capability))
    }
}

/// Source of capability metadata. Lookups can fail (e.g. an integration
/// that has not reported yet); the enricher turns failures into errors the
/// detector logs and skips.
#[cfg_attr(test, mockall::automock)]
pub trait CapabilityProvider: Send + Sync {
    fn capabilities(&self, registry: &DeviceRegistry, entity_id: &str) -> Result<DeviceCapabilities, HearthError>;
}

/// Reads capabilities straight from the registry.
pub struct RegistryCapabilities;

impl CapabilityProvider for RegistryCapabilities {
    fn capabilities(&self, registry: &DeviceRegistry, entity_id: &str) -> Result<DeviceCapabilities, HearthError> {
        let entity = registry
            .get(entity_id)
            .ok_or_else(|| HearthError::EnrichmentUnavailable {
                enricher: "capability".into(),
                entity_id: entity_id.to_string(),
                message: "entity is not in the registry".into(),
            })?;
        Ok(DeviceCapabilities {
            class: entity.class(),
            capabilities: entity.capabilities.clone(),
            manufacturer: entity.manufacturer.clone(),
        })
    }
}

/// Capability the action must expose for this trigger/action pairing to make sense.
fn required_capability(trigger: DeviceClass, action: DeviceClass) -> Option<&'static str> {
    match (trigger, action) {
        (DeviceClass::Environment, DeviceClass::Lighting) => Some("brightness"),
        (DeviceClass::Environment, DeviceClass::Climate) => Some("target_temperature"),
        (DeviceClass::Environment, DeviceClass::Cover) => Some("position"),
        _ => None,
    }
}

const BASE_STRENGTH: f64 = 0.6;
const RICH_CAPABILITY_BONUS: f64 = 0.2;
const SAME_VENDOR_BONUS: f64 = 0.2;
const RICH_CAPABILITY_COUNT: usize = 3;

/// Vetoes relationships the action device cannot carry out.
pub struct CapabilityEnricher {
    provider: Box<dyn CapabilityProvider>,
}

impl CapabilityEnricher {
    pub fn new(provider: Box<dyn CapabilityProvider>) -> Self {
        Self { provider }
    }
}

impl Enricher for CapabilityEnricher {
    fn name(&self) -> &str {
        "capability"
    }

    fn enrich(
        &self,
        candidate: &SynergyCandidate,
        ctx: &EnrichmentContext<'_>,
    ) -> Result<Option<Enrichment>, HearthError> {
        let trigger = self.provider.capabilities(ctx.registry, &candidate.trigger)?;
        let action = self.provider.capabilities(ctx.registry, &candidate.action)?;

        if !action.class.is_actuator() {
            return Ok(Some(Enrichment::reject(
                self.name(),
                format!("{} ({}) cannot be controlled", candidate.action, action.class.as_str()),
            )));
        }

        let required = required_capability(trigger.class, action.class);
        if let Some(cap) = required {
            // An empty list means "not reported", not "incapable"
            if !action.capabilities.is_empty() && !action.has(cap) {
                return Ok(Some(
                    Enrichment::reject(
                        self.name(),
                        format!("{} lacks '{}'", candidate.action, cap),
                    )
                    .with_meta("required_capability", cap),
                ));
            }
        }

        let rich = action.capabilities.len() >= RICH_CAPABILITY_COUNT;
        let same_vendor = match (&trigger.manufacturer, &action.manufacturer) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        };
        let mut strength = BASE_STRENGTH;
        if rich {
            strength += RICH_CAPABILITY_BONUS;
        }
        if same_vendor {
            strength += SAME_VENDOR_BONUS;
        }

        let mut enrichment = Enrichment::support(self.name(), None, strength, 0.8 * strength)
            .with_meta("action_class", action.class.as_str())
            .with_meta("action_capabilities", action.capabilities.clone())
            .with_meta("same_manufacturer", same_vendor);
        if let Some(cap) = required {
            enrichment = enrichment.with_meta("required_capability", cap);
        }
        Ok(Some(enrichment))
    }
}

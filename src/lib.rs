// src/lib.rs — Library root for Hearth

pub mod core;
pub mod index;
pub mod infra;
pub mod patterns;
pub mod pipeline;
pub mod quality;
pub mod storage;
pub mod synergy;

pub use crate::core::types::{
    DeviceRegistry, EntityInfo, Event, HomeType, Pattern, PatternType, QualityFeedback,
    QualityTier, SynergyOpportunity, SynergyType,
};
pub use crate::infra::config::Config;
pub use crate::infra::errors::HearthError;
pub use crate::pipeline::{DiscoveryInput, DiscoveryPipeline, RunReport};

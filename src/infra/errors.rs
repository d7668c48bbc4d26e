// src/infra/errors.rs — Error types for Hearth

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HearthError {
    // Run-fatal errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Quality weights cannot be renormalized (sum = {sum:.6})")]
    WeightsNotNormalizable { sum: f64 },

    #[error("Storage error: {0}")]
    Storage(String),

    // Local errors (the batch continues without the offending item)
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Enricher '{enricher}' could not resolve '{entity_id}': {message}")]
    EnrichmentUnavailable {
        enricher: String,
        entity_id: String,
        message: String,
    },

    #[error("Invalid feedback: {0}")]
    InvalidFeedback(String),

    // Infra
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HearthError {
    /// Errors that abort the whole run instead of dropping a single item.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HearthError::Config(_)
                | HearthError::WeightsNotNormalizable { .. }
                | HearthError::Storage(_)
                | HearthError::Io(_)
                | HearthError::Toml(_)
                | HearthError::Other(_)
        )
    }
}

// src/infra/mod.rs

pub mod config;
pub mod errors;
pub mod logger;

pub use errors::HearthError;

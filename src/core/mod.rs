// src/core/mod.rs

pub mod types;

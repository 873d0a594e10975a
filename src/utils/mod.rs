//! Utility helpers: input discovery and folder checks.
pub mod files;

pub use files::{discover_inputs, has_allowed_extension};

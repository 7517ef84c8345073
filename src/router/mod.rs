//! Router module for provider and model resolution.
//!
//! This module maps a loose model selection string onto:
//! - A supported provider
//! - A canonical model identifier from that provider's catalog
//! - The next model to fall back to when a call fails

pub mod catalog;
mod resolver;

pub use catalog::{catalog_index, next_model, Provider, GEMINI_MODELS, MISTRAL_MODELS};
pub use resolver::{resolve, resolve_model, resolve_model_strict, resolve_provider};

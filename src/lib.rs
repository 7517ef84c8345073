//! modelfall - provider request routing with same-provider model fallback
//!
//! This library normalizes the Gemini and Mistral generation APIs behind one
//! call shape, retries failed calls down a provider's model catalog, and
//! recovers JSON arrays from verbose model output.

pub mod config;
pub mod error;
pub mod extract;
pub mod fallback;
pub mod provider;
pub mod router;
pub mod server;

pub use config::{ApiKey, Config};
pub use error::{EmptyReason, Error, Result};
pub use extract::{extract_array, extract_records};
pub use fallback::{Generation, Generator};
pub use provider::{GenerationRequest, ProviderConfig};
pub use router::Provider;

//! Supported providers and their fixed model catalogs.

use serde::{Deserialize, Serialize};

/// Gemini models, most capable first.
pub const GEMINI_MODELS: &[&str] = &[
    "gemini-2.5-flash",
    "gemini-2.0-flash",
    "gemini-2.0-flash-lite",
];

/// Mistral models, most capable first.
pub const MISTRAL_MODELS: &[&str] = &[
    "mistral-large-latest",
    "mistral-medium-latest",
    "mistral-small-latest",
];

/// A hosted generative-text API vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    Mistral,
}

impl Provider {
    /// All supported providers, in resolution order.
    pub const ALL: [Provider; 2] = [Provider::Gemini, Provider::Mistral];

    /// Canonical lowercase name, also used for substring matching.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::Mistral => "mistral",
        }
    }

    /// The provider's fallback sequence. Ordering encodes precedence.
    pub fn catalog(&self) -> &'static [&'static str] {
        match self {
            Provider::Gemini => GEMINI_MODELS,
            Provider::Mistral => MISTRAL_MODELS,
        }
    }

    /// Preferred model when a selection names only the provider.
    pub fn default_model(&self) -> &'static str {
        self.catalog()[0]
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of `model` in the provider's catalog.
pub fn catalog_index(provider: Provider, model: &str) -> Option<usize> {
    provider.catalog().iter().position(|m| *m == model)
}

/// The catalog entry after `model`, or `None` if `model` is last or unknown.
pub fn next_model(provider: Provider, model: &str) -> Option<&'static str> {
    let index = catalog_index(provider, model)?;
    provider.catalog().get(index + 1).copied()
}

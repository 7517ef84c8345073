//! Resolution of loose model selection strings to a provider and model.

use super::catalog::{catalog_index, Provider};
use crate::config::ApiKey;
use crate::error::{Error, Result};
use crate::provider::ProviderConfig;

/// Ordered substring rules mapping free-text selections to canonical models.
///
/// Checked top to bottom against the lowercased selection; the first hit wins,
/// so more specific needles must come before the bare provider names.
const MODEL_RULES: &[(&str, &str)] = &[
    ("flash-lite", "gemini-2.0-flash-lite"),
    ("2.0-flash", "gemini-2.0-flash"),
    ("gemini", "gemini-2.5-flash"),
    ("mistral-medium", "mistral-medium-latest"),
    ("mistral-small", "mistral-small-latest"),
    ("mistral", "mistral-large-latest"),
];

/// Find the provider whose canonical name appears in `selection`, ignoring case.
pub fn resolve_provider(selection: &str) -> Option<Provider> {
    let lower = selection.to_lowercase();
    Provider::ALL
        .into_iter()
        .find(|provider| lower.contains(provider.as_str()))
}

/// Map a loose selection to a canonical model identifier.
///
/// Selections that match no rule are returned unchanged and reach the
/// provider API as-is. Use [`resolve_model_strict`] to reject them instead.
///
/// Every provider name is itself a rule, so a selection that resolves to a
/// provider always maps to some catalog model. The result can still belong
/// to the other provider when the selection names both (`"mistral-2.0-flash"`
/// gives `gemini-2.0-flash`); that cross-provider case is what strict
/// resolution catches.
pub fn resolve_model(selection: &str) -> String {
    let lower = selection.to_lowercase();
    MODEL_RULES
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, model)| model.to_string())
        .unwrap_or_else(|| selection.to_string())
}

/// Like [`resolve_model`], but the result must be in `provider`'s catalog.
pub fn resolve_model_strict(provider: Provider, selection: &str) -> Result<String> {
    let model = resolve_model(selection);
    if catalog_index(provider, &model).is_none() {
        return Err(Error::UnknownModel { provider, model });
    }
    Ok(model)
}

/// Resolve a selection and key into a per-call provider configuration.
pub fn resolve(selection: &str, api_key: ApiKey, strict: bool) -> Result<ProviderConfig> {
    let provider = resolve_provider(selection).ok_or_else(|| Error::UnsupportedProvider {
        selection: selection.to_string(),
    })?;

    let model = if strict {
        resolve_model_strict(provider, selection)?
    } else {
        resolve_model(selection)
    };

    tracing::debug!(
        selection = %selection,
        provider = %provider,
        model = %model,
        "Resolved model selection"
    );

    Ok(ProviderConfig::new(api_key, provider, model))
}

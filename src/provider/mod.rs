//! Provider adapters.
//!
//! Both vendor APIs are reached through one capability, [`ProviderAdapter::call`],
//! which takes a per-call [`ProviderConfig`] and a [`GenerationRequest`] and
//! returns raw text. [`Adapters`] selects the concrete adapter by [`Provider`] tag.

mod gemini;
mod mistral;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::config::{ApiKey, Config};
use crate::error::{Error, Result};
use crate::router::Provider;

pub use gemini::GeminiAdapter;
pub use mistral::MistralAdapter;

/// Upper bound on how much of an upstream error body is kept in error messages.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Per-call provider selection. Immutable; fallback produces a new value.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    api_key: ApiKey,
    provider: Provider,
    model: String,
}

impl ProviderConfig {
    pub fn new(api_key: ApiKey, provider: Provider, model: impl Into<String>) -> Self {
        Self {
            api_key,
            provider,
            model: model.into(),
        }
    }

    pub fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Same key and provider, different model.
    pub fn with_model(&self, model: impl Into<String>) -> Self {
        Self {
            api_key: self.api_key.clone(),
            provider: self.provider,
            model: model.into(),
        }
    }
}

/// A single-turn generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// System prompt, treating blank strings as absent.
    pub(crate) fn system(&self) -> Option<&str> {
        self.system_prompt
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// The single capability both vendor surfaces are normalized to.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Issue one generation request against `config.model()`.
    async fn call(&self, config: &ProviderConfig, request: &GenerationRequest) -> Result<String>;
}

/// One adapter per supported provider, selected by tag.
#[derive(Clone)]
pub struct Adapters {
    gemini: Arc<dyn ProviderAdapter>,
    mistral: Arc<dyn ProviderAdapter>,
}

impl Adapters {
    /// Build the HTTP adapters from configuration, sharing one client.
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            gemini: Arc::new(GeminiAdapter::new(
                client.clone(),
                config.providers.base_url(Provider::Gemini),
                config.generation.clone(),
            )),
            mistral: Arc::new(MistralAdapter::new(
                client,
                config.providers.base_url(Provider::Mistral),
                config.generation.clone(),
            )),
        }
    }

    /// Assemble from arbitrary implementations.
    pub fn from_parts(gemini: Arc<dyn ProviderAdapter>, mistral: Arc<dyn ProviderAdapter>) -> Self {
        Self { gemini, mistral }
    }

    pub fn get(&self, provider: Provider) -> &dyn ProviderAdapter {
        match provider {
            Provider::Gemini => self.gemini.as_ref(),
            Provider::Mistral => self.mistral.as_ref(),
        }
    }
}

/// Send a JSON request and decode a JSON response, mapping every failure to
/// [`Error::Transport`] tagged with the provider and model.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    config: &ProviderConfig,
) -> Result<T> {
    let transport = |status: Option<u16>, message: String| Error::Transport {
        provider: config.provider(),
        model: config.model().to_string(),
        status,
        message: redact(&message, config.api_key()),
    };

    let response = request
        .send()
        .await
        .map_err(|e| transport(None, e.without_url().to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| transport(Some(status.as_u16()), e.without_url().to_string()))?;

    if !status.is_success() {
        return Err(transport(Some(status.as_u16()), truncate(&body)));
    }

    serde_json::from_str(&body).map_err(|e| {
        transport(
            Some(status.as_u16()),
            format!("invalid response body: {}", e),
        )
    })
}

/// Remove any occurrence of the key from text bound for errors or logs.
fn redact(message: &str, api_key: &ApiKey) -> String {
    let secret = api_key.expose_secret();
    if secret.is_empty() {
        return message.to_string();
    }
    message.replace(secret, "[REDACTED]")
}

fn truncate(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

//! Fallback-retry executor.
//!
//! [`Generator`] is the request router callers use: it resolves a selection,
//! calls the provider's adapter, and walks the provider's model catalog on
//! failure without ever switching providers.

pub mod retry;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::Instrument;

use crate::config::{ApiKey, FallbackConfig};
use crate::error::{Error, Result};
use crate::provider::{Adapters, GenerationRequest, ProviderConfig};
use crate::router::{self, Provider};

pub use retry::{format_fallbacks_header, retry_through_catalog, AttemptRecord, Retryable};

/// Successful outcome of a fallback sequence.
#[derive(Debug, Clone)]
pub struct Generation {
    /// Raw model output.
    pub text: String,
    pub provider: Provider,
    /// The model that produced `text`.
    pub model: String,
    /// Failed attempts that preceded the success, in order.
    pub attempts: Vec<AttemptRecord>,
}

impl Generation {
    pub fn fell_back(&self) -> bool {
        !self.attempts.is_empty()
    }
}

/// Provider request router with same-provider model fallback.
#[derive(Clone)]
pub struct Generator {
    adapters: Adapters,
    backoff: Duration,
    deadline: Option<Duration>,
    strict_models: bool,
}

impl Generator {
    pub fn new(adapters: Adapters, fallback: &FallbackConfig) -> Self {
        Self {
            adapters,
            backoff: fallback.backoff(),
            deadline: fallback.deadline(),
            strict_models: fallback.strict_models,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Resolve `selection` and generate with fallback.
    ///
    /// An unrecognized provider fails with [`Error::UnsupportedProvider`]
    /// before any request is sent.
    pub async fn generate(
        &self,
        selection: &str,
        api_key: ApiKey,
        request: &GenerationRequest,
    ) -> Result<Generation> {
        if api_key.is_empty() {
            return Err(Error::BadRequest("API key must not be empty".to_string()));
        }
        let config = router::resolve(selection, api_key, self.strict_models)?;
        self.generate_with_fallback(&config, request).await
    }

    /// Call `config.model()`, then each later model of the same provider on failure.
    ///
    /// Makes at most `catalog.len()` attempts and returns the last error once
    /// the catalog is exhausted. The first success returns immediately.
    pub async fn generate_with_fallback(
        &self,
        config: &ProviderConfig,
        request: &GenerationRequest,
    ) -> Result<Generation> {
        if request.prompt.trim().is_empty() {
            return Err(Error::BadRequest("prompt must not be empty".to_string()));
        }

        let provider = config.provider();
        let adapter = self.adapters.get(provider);
        let attempts: Arc<Mutex<Vec<AttemptRecord>>> = Arc::new(Mutex::new(Vec::new()));
        let in_flight = Arc::new(Mutex::new(InFlight {
            model: config.model().to_string(),
            last_error: None,
        }));

        let run = retry_through_catalog(
            provider.catalog(),
            config.model(),
            self.backoff,
            attempts.clone(),
            |model: &str| {
                let attempt_config = config.with_model(model);
                let in_flight = in_flight.clone();
                lock(&in_flight).model = model.to_string();
                async move {
                    match adapter.call(&attempt_config, request).await {
                        Ok(text) => Ok((attempt_config.model().to_string(), text)),
                        Err(e) => {
                            lock(&in_flight).last_error = Some(e.to_string());
                            Err(e)
                        }
                    }
                }
            },
        )
        .instrument(tracing::info_span!("generate", provider = %provider));

        let result = match self.deadline {
            Some(deadline) => match tokio::time::timeout(deadline, run).await {
                Ok(result) => result,
                Err(_) => {
                    let failed = take_attempts(&attempts).len();
                    let InFlight { model, last_error } = std::mem::take(&mut *lock(&in_flight));
                    let deadline_ms = deadline.as_millis() as u64;
                    tracing::error!(
                        provider = %provider,
                        model = %model,
                        deadline_ms,
                        failed_attempts = failed,
                        "Generation deadline exceeded"
                    );
                    return Err(Error::DeadlineExceeded {
                        provider,
                        model,
                        deadline_ms,
                        attempts: failed,
                        last_error,
                    });
                }
            },
            None => run.await,
        };

        let (model, text) = result?;
        Ok(Generation {
            text,
            provider,
            model,
            attempts: take_attempts(&attempts),
        })
    }
}

/// The attempt currently running and the last failure seen, read back on deadline expiry.
#[derive(Default)]
struct InFlight {
    model: String,
    last_error: Option<String>,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

fn take_attempts(attempts: &Mutex<Vec<AttemptRecord>>) -> Vec<AttemptRecord> {
    std::mem::take(&mut *lock(attempts))
}

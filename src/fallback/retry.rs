//! Same-provider model fallback.
//!
//! This module encapsulates the retry-through-catalog algorithm:
//! - One attempt per model, starting at the requested model
//! - On a retryable failure, a fixed backoff and then the next catalog model
//! - At most `catalog.len()` attempts, never revisiting a model
//! - Attempt tracking via shared `Arc<Mutex<Vec<AttemptRecord>>>` that survives deadline cancellation
//! - Header formatting for `x-modelfall-fallbacks`

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;

use crate::error::Error;

/// Delay between attempts when none is configured.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Record of a single failed attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    pub model: String,
    /// Short outcome tag: an HTTP status, "network", or an empty-response reason.
    pub outcome: String,
}

/// Classification the executor needs from an error type.
///
/// Keeps the executor independent of [`Error`] so it can be tested with mocks.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
    fn outcome_tag(&self) -> String;
}

impl Retryable for Error {
    fn is_retryable(&self) -> bool {
        Error::is_retryable(self)
    }

    fn outcome_tag(&self) -> String {
        Error::outcome_tag(self)
    }
}

/// Format attempt records into the `x-modelfall-fallbacks` header value.
///
/// Format: `"gemini-2.5-flash:503, gemini-2.0-flash:no_content"` in attempt order.
///
/// Returns `None` if the attempts slice is empty (first attempt succeeded).
pub fn format_fallbacks_header(attempts: &[AttemptRecord]) -> Option<String> {
    if attempts.is_empty() {
        return None;
    }
    Some(
        attempts
            .iter()
            .map(|a| format!("{}:{}", a.model, a.outcome))
            .collect::<Vec<_>>()
            .join(", "),
    )
}

/// The catalog entry following `model`, if `model` is in the catalog.
fn next_in_catalog<'a>(catalog: &[&'a str], model: &str) -> Option<&'a str> {
    let index = catalog.iter().position(|m| *m == model)?;
    catalog.get(index + 1).copied()
}

/// Execute `send_request` against `start_model`, falling back through `catalog`.
///
/// Algorithm:
/// 1. Attempt `start_model`
/// 2. On success: return immediately, no backoff
/// 3. On error: record attempt in shared vec, check retryability
/// 4. On non-retryable error: return it immediately
/// 5. If another attempt is allowed and a next model exists: sleep `backoff`, advance
/// 6. Otherwise: return the last error
///
/// A `start_model` missing from the catalog has no successor and gets exactly
/// one attempt.
pub async fn retry_through_catalog<T, E, F, Fut>(
    catalog: &[&str],
    start_model: &str,
    backoff: Duration,
    attempts: Arc<Mutex<Vec<AttemptRecord>>>,
    send_request: F,
) -> std::result::Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: Fn(&str) -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, E>>,
{
    let max_attempts = catalog.len().max(1);
    let mut model = start_model.to_string();
    let mut attempt = 1;

    loop {
        tracing::info!(model = %model, attempt, max_attempts, "Generation attempt");

        let err = match send_request(&model).await {
            Ok(value) => {
                tracing::info!(model = %model, attempt, "Generation attempt succeeded");
                return Ok(value);
            }
            Err(err) => err,
        };

        let retryable = err.is_retryable();
        tracing::warn!(
            model = %model,
            attempt,
            retryable,
            error = %err,
            "Generation attempt failed"
        );

        attempts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(AttemptRecord {
                model: model.clone(),
                outcome: err.outcome_tag(),
            });

        if !retryable || attempt >= max_attempts {
            return Err(err);
        }

        let Some(next) = next_in_catalog(catalog, &model) else {
            tracing::warn!(model = %model, "No further model to fall back to");
            return Err(err);
        };

        tokio::time::sleep(backoff).await;
        tracing::info!(from = %model, to = %next, "Falling back to next model");
        model = next.to_string();
        attempt += 1;
    }
}

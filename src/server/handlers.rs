//! HTTP request handlers.

use axum::{
    extract::State,
    http::{HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use super::app::AppState;
use crate::config::ApiKey;
use crate::error::Error;
use crate::extract::extract_array;
use crate::fallback::{format_fallbacks_header, AttemptRecord, Generation};
use crate::provider::GenerationRequest;
use crate::router::{self, Provider};

/// Response header: correlation ID (UUID v4).
pub const REQUEST_ID_HEADER: &str = "x-modelfall-request-id";
/// Response header: provider that handled the request.
pub const PROVIDER_HEADER: &str = "x-modelfall-provider";
/// Response header: model that produced the output.
pub const MODEL_HEADER: &str = "x-modelfall-model";
/// Response header: failed attempts before success, present only after fallback.
pub const FALLBACKS_HEADER: &str = "x-modelfall-fallbacks";
/// Response header: wall-clock latency in milliseconds (integer).
pub const LATENCY_MS_HEADER: &str = "x-modelfall-latency-ms";

/// Body of POST /v1/generate.
#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    /// Loose model selection, e.g. "gemini" or "mistral-small"
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Overrides the configured key for the resolved provider
    #[serde(default)]
    pub api_key: Option<ApiKey>,
    /// Also run the JSON-array extractor on the output
    #[serde(default)]
    pub extract: bool,
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    provider: Provider,
    model: String,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    items: Option<Vec<serde_json::Value>>,
    attempts: Vec<AttemptRecord>,
}

/// Attach modelfall metadata headers to a response.
fn attach_headers(
    response: &mut Response,
    request_id: &str,
    latency_ms: u64,
    generation: Option<&Generation>,
) {
    let headers = response.headers_mut();

    if let Ok(value) = HeaderValue::from_str(request_id) {
        headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    headers.insert(
        HeaderName::from_static(LATENCY_MS_HEADER),
        HeaderValue::from(latency_ms),
    );

    let Some(generation) = generation else {
        return;
    };

    headers.insert(
        HeaderName::from_static(PROVIDER_HEADER),
        HeaderValue::from_static(generation.provider.as_str()),
    );
    if let Ok(value) = HeaderValue::from_str(&generation.model) {
        headers.insert(HeaderName::from_static(MODEL_HEADER), value);
    }
    if let Some(value) = format_fallbacks_header(&generation.attempts)
        .and_then(|v| HeaderValue::from_str(&v).ok())
    {
        headers.insert(HeaderName::from_static(FALLBACKS_HEADER), value);
    }
}

/// Handle POST /v1/generate
pub async fn generate(State(state): State<AppState>, Json(body): Json<GenerateBody>) -> Response {
    let start = std::time::Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();

    tracing::info!(
        request_id = %request_id,
        model = %body.model,
        extract = body.extract,
        has_system_prompt = body.system_prompt.is_some(),
        "Received generate request"
    );

    let result = execute_generate(&state, body).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok((generation, items)) => {
            tracing::info!(
                request_id = %request_id,
                provider = %generation.provider,
                model = %generation.model,
                fallbacks = generation.attempts.len(),
                latency_ms,
                "Generate request completed"
            );
            let payload = GenerateResponse {
                provider: generation.provider,
                model: generation.model.clone(),
                text: generation.text.clone(),
                items,
                attempts: generation.attempts.clone(),
            };
            let mut response = Json(payload).into_response();
            attach_headers(&mut response, &request_id, latency_ms, Some(&generation));
            response
        }
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                error = %e,
                latency_ms,
                "Generate request failed"
            );
            let mut response = e.into_response();
            attach_headers(&mut response, &request_id, latency_ms, None);
            response
        }
    }
}

/// Resolve the key, run the fallback sequence, and optionally extract records.
async fn execute_generate(
    state: &AppState,
    body: GenerateBody,
) -> Result<(Generation, Option<Vec<serde_json::Value>>), Error> {
    let provider =
        router::resolve_provider(&body.model).ok_or_else(|| Error::UnsupportedProvider {
            selection: body.model.clone(),
        })?;

    let api_key = body
        .api_key
        .filter(|k| !k.is_empty())
        .or_else(|| state.config.providers.api_key(provider).cloned())
        .ok_or_else(|| {
            Error::BadRequest(format!(
                "No API key supplied and none configured for {}",
                provider
            ))
        })?;

    let mut request = GenerationRequest::new(body.prompt);
    request.system_prompt = body.system_prompt;

    let generation = state
        .generator
        .generate(&body.model, api_key, &request)
        .await?;

    let items = if body.extract {
        Some(extract_array(&generation.text)?)
    } else {
        None
    };

    Ok((generation, items))
}

/// Handle GET /v1/models
pub async fn list_models(State(state): State<AppState>) -> impl IntoResponse {
    let providers: Vec<serde_json::Value> = Provider::ALL
        .iter()
        .map(|p| {
            serde_json::json!({
                "name": p.as_str(),
                "models": p.catalog(),
                "default_model": p.default_model(),
                "key_configured": state.config.providers.api_key(*p).is_some(),
            })
        })
        .collect();

    Json(serde_json::json!({
        "providers": providers
    }))
}

/// Handle GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "modelfall"
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn generation(attempts: Vec<AttemptRecord>) -> Generation {
        Generation {
            text: "[]".to_string(),
            provider: Provider::Gemini,
            model: "gemini-2.0-flash".to_string(),
            attempts,
        }
    }

    #[test]
    fn test_attach_headers_success_without_fallback() {
        let mut response = StatusCode::OK.into_response();
        attach_headers(&mut response, "req-1", 42, Some(&generation(vec![])));

        let headers = response.headers();
        assert_eq!(headers.get(REQUEST_ID_HEADER).unwrap(), "req-1");
        assert_eq!(headers.get(LATENCY_MS_HEADER).unwrap(), "42");
        assert_eq!(headers.get(PROVIDER_HEADER).unwrap(), "gemini");
        assert_eq!(headers.get(MODEL_HEADER).unwrap(), "gemini-2.0-flash");
        assert!(headers.get(FALLBACKS_HEADER).is_none());
    }

    #[test]
    fn test_attach_headers_success_with_fallback() {
        let mut response = StatusCode::OK.into_response();
        let fell_back = generation(vec![AttemptRecord {
            model: "gemini-2.5-flash".to_string(),
            outcome: "503".to_string(),
        }]);
        attach_headers(&mut response, "req-2", 7, Some(&fell_back));

        assert_eq!(
            response.headers().get(FALLBACKS_HEADER).unwrap(),
            "gemini-2.5-flash:503"
        );
    }

    #[test]
    fn test_attach_headers_error_has_no_provider() {
        let mut response = StatusCode::BAD_GATEWAY.into_response();
        attach_headers(&mut response, "req-3", 1, None);

        let headers = response.headers();
        assert!(headers.get(REQUEST_ID_HEADER).is_some());
        assert!(headers.get(PROVIDER_HEADER).is_none());
        assert!(headers.get(MODEL_HEADER).is_none());
    }

    #[test]
    fn test_generate_body_defaults() {
        let body: GenerateBody =
            serde_json::from_str(r#"{"model":"gemini","prompt":"q"}"#).unwrap();
        assert!(!body.extract);
        assert!(body.api_key.is_none());
        assert!(body.system_prompt.is_none());
    }

    #[test]
    fn test_generate_body_key_not_in_debug() {
        let body: GenerateBody = serde_json::from_str(
            r#"{"model":"gemini","prompt":"q","api_key":"AIzaHiddenKey"}"#,
        )
        .unwrap();
        assert!(!format!("{:?}", body).contains("AIzaHiddenKey"));
    }
}

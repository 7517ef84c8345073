//! Gemini `generateContent` adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{send_json, GenerationRequest, ProviderAdapter, ProviderConfig};
use crate::config::GenerationConfig;
use crate::error::{EmptyReason, Error, Result};
use crate::router::Provider;

/// Header carrying the API key, which keeps it out of request URLs.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Finish reasons that mean the candidate was withheld by a content filter.
const FILTERED_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
    "IMAGE_SAFETY",
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<RequestContent<'a>>,
    generation_config: RequestGenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestGenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
    top_p: f32,
    top_k: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
    /// Thinking-model reasoning parts, excluded from the answer.
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Adapter for the Gemini REST API.
pub struct GeminiAdapter {
    client: reqwest::Client,
    base_url: String,
    generation: GenerationConfig,
}

impl GeminiAdapter {
    pub fn new(client: reqwest::Client, base_url: String, generation: GenerationConfig) -> Self {
        Self {
            client,
            base_url,
            generation,
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        )
    }

    fn build_body<'a>(&self, request: &'a GenerationRequest) -> GenerateContentRequest<'a> {
        GenerateContentRequest {
            contents: vec![RequestContent {
                role: Some("user"),
                parts: vec![RequestPart {
                    text: &request.prompt,
                }],
            }],
            system_instruction: request.system().map(|text| RequestContent {
                role: None,
                parts: vec![RequestPart { text }],
            }),
            generation_config: RequestGenerationConfig {
                max_output_tokens: self.generation.max_output_tokens,
                temperature: self.generation.temperature,
                top_p: self.generation.top_p,
                top_k: self.generation.top_k,
            },
        }
    }
}

/// Pull the answer text out of a response, or say why there is none.
fn response_text(response: &GenerateContentResponse) -> std::result::Result<String, EmptyReason> {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        tracing::debug!(block_reason = %reason, "Gemini blocked the prompt");
        return Err(EmptyReason::ContentFiltered);
    }

    let candidate = response.candidates.first().ok_or(EmptyReason::NoContent)?;

    let text: String = candidate
        .content
        .iter()
        .flat_map(|c| c.parts.iter())
        .filter(|p| !p.thought)
        .filter_map(|p| p.text.as_deref())
        .collect();

    if !text.trim().is_empty() {
        return Ok(text);
    }

    match candidate.finish_reason.as_deref() {
        Some("MAX_TOKENS") => Err(EmptyReason::Truncated),
        Some(reason) if FILTERED_FINISH_REASONS.contains(&reason) => {
            Err(EmptyReason::ContentFiltered)
        }
        _ => Err(EmptyReason::NoContent),
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    async fn call(&self, config: &ProviderConfig, request: &GenerationRequest) -> Result<String> {
        let http_request = self
            .client
            .post(self.endpoint(config.model()))
            .header(API_KEY_HEADER, config.api_key().expose_secret())
            .json(&self.build_body(request));

        let response: GenerateContentResponse = send_json(http_request, config).await?;

        let finish_reason = response
            .candidates
            .first()
            .and_then(|c| c.finish_reason.clone());

        match response_text(&response) {
            Ok(text) => {
                if finish_reason.as_deref() == Some("MAX_TOKENS") {
                    tracing::warn!(
                        model = %config.model(),
                        "Gemini output hit the token limit; returning partial text"
                    );
                }
                Ok(text)
            }
            Err(reason) => Err(Error::EmptyResponse {
                provider: Provider::Gemini,
                model: config.model().to_string(),
                reason,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn text_parts_are_concatenated() {
        let response = parse(serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "[{\"a\":"}, {"text": "1}]"}]},
                "finishReason": "STOP"
            }]
        }));
        assert_eq!(response_text(&response).unwrap(), "[{\"a\":1}]");
    }

    #[test]
    fn thought_parts_are_skipped() {
        let response = parse(serde_json::json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "let me think", "thought": true},
                    {"text": "answer"}
                ]},
                "finishReason": "STOP"
            }]
        }));
        assert_eq!(response_text(&response).unwrap(), "answer");
    }

    #[test]
    fn max_tokens_without_text_is_truncated() {
        let response = parse(serde_json::json!({
            "candidates": [{"content": {"parts": []}, "finishReason": "MAX_TOKENS"}]
        }));
        assert_eq!(response_text(&response), Err(EmptyReason::Truncated));
    }

    #[test]
    fn safety_finish_is_content_filtered() {
        let response = parse(serde_json::json!({
            "candidates": [{"finishReason": "SAFETY"}]
        }));
        assert_eq!(response_text(&response), Err(EmptyReason::ContentFiltered));
    }

    #[test]
    fn prompt_block_is_content_filtered() {
        let response = parse(serde_json::json!({
            "promptFeedback": {"blockReason": "OTHER"}
        }));
        assert_eq!(response_text(&response), Err(EmptyReason::ContentFiltered));
    }

    #[test]
    fn no_candidates_is_no_content() {
        let response = parse(serde_json::json!({}));
        assert_eq!(response_text(&response), Err(EmptyReason::NoContent));
    }

    #[test]
    fn whitespace_only_stop_is_no_content() {
        let response = parse(serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "  \n"}]}, "finishReason": "STOP"}]
        }));
        assert_eq!(response_text(&response), Err(EmptyReason::NoContent));
    }

    #[test]
    fn body_includes_system_instruction_only_when_present() {
        let adapter = GeminiAdapter::new(
            reqwest::Client::new(),
            "http://localhost".to_string(),
            GenerationConfig::default(),
        );

        let plain = GenerationRequest::new("hi");
        let json = serde_json::to_value(adapter.build_body(&plain)).unwrap();
        assert!(json.get("systemInstruction").is_none());
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 8192);

        let with_system = GenerationRequest::new("hi").with_system_prompt("sys");
        let json = serde_json::to_value(adapter.build_body(&with_system)).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "sys");
    }

    #[test]
    fn endpoint_embeds_model() {
        let adapter = GeminiAdapter::new(
            reqwest::Client::new(),
            "http://localhost:1234/".to_string(),
            GenerationConfig::default(),
        );
        assert_eq!(
            adapter.endpoint("gemini-2.0-flash"),
            "http://localhost:1234/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }
}

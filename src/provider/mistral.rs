//! Mistral chat completions adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{send_json, GenerationRequest, ProviderAdapter, ProviderConfig};
use crate::config::GenerationConfig;
use crate::error::{EmptyReason, Error, Result};
use crate::router::Provider;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<AssistantMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<MessageContent>,
}

/// Message content is either a plain string or a list of typed segments.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Segments(Vec<ContentSegment>),
}

#[derive(Debug, Deserialize)]
struct ContentSegment {
    #[serde(rename = "type")]
    kind: Option<String>,
    text: Option<String>,
}

impl MessageContent {
    fn into_text(self) -> String {
        match self {
            MessageContent::Text(text) => text,
            MessageContent::Segments(segments) => segments
                .into_iter()
                .filter(|s| s.kind.as_deref().map_or(true, |k| k == "text"))
                .filter_map(|s| s.text)
                .collect(),
        }
    }
}

/// Adapter for the Mistral chat completions API.
pub struct MistralAdapter {
    client: reqwest::Client,
    base_url: String,
    generation: GenerationConfig,
}

impl MistralAdapter {
    pub fn new(client: reqwest::Client, base_url: String, generation: GenerationConfig) -> Self {
        Self {
            client,
            base_url,
            generation,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn build_body<'a>(&self, model: &'a str, request: &'a GenerationRequest) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        ChatRequest {
            model,
            messages,
            max_tokens: self.generation.max_output_tokens,
            temperature: self.generation.temperature,
            top_p: self.generation.top_p,
        }
    }
}

fn response_text(response: ChatResponse) -> std::result::Result<String, EmptyReason> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or(EmptyReason::NoContent)?;

    let text = choice
        .message
        .and_then(|m| m.content)
        .map(MessageContent::into_text)
        .unwrap_or_default();

    if !text.trim().is_empty() {
        return Ok(text);
    }

    match choice.finish_reason.as_deref() {
        Some("length") | Some("model_length") => Err(EmptyReason::Truncated),
        _ => Err(EmptyReason::NoContent),
    }
}

#[async_trait]
impl ProviderAdapter for MistralAdapter {
    async fn call(&self, config: &ProviderConfig, request: &GenerationRequest) -> Result<String> {
        let http_request = self
            .client
            .post(self.endpoint())
            .bearer_auth(config.api_key().expose_secret())
            .json(&self.build_body(config.model(), request));

        let response: ChatResponse = send_json(http_request, config).await?;

        response_text(response).map_err(|reason| Error::EmptyResponse {
            provider: Provider::Mistral,
            model: config.model().to_string(),
            reason,
        })
    }
}

//! Minimal client for OpenAI-compatible chat completions (the default base URL
//! points at Gemini's compatibility endpoint).
//!
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the credential; it is supplied per call from the progress store.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::error::GatewayError;
use crate::tutor::{CompletionProvider, CompletionRequest, ProviderFuture, Role};
use crate::util::trunc_for_log;

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub base_url: String,
  pub model: String,
}

impl OpenAI {
  pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self { client, base_url: base_url.to_string(), model: model.to_string() })
  }

  /// Plain-text chat completion.
  #[instrument(level = "info", skip(self, credential, request), fields(model = %self.model, turns = request.turns.len()))]
  async fn chat_plain(&self, credential: &str, request: CompletionRequest) -> Result<String, GatewayError> {
    let url = format!("{}/chat/completions", self.base_url);
    let mut messages = Vec::with_capacity(request.turns.len() + 1);
    if let Some(system) = request.system {
      messages.push(ChatMessageReq { role: "system".into(), content: system });
    }
    messages.extend(request.turns.into_iter().map(|t| ChatMessageReq {
      role: match t.role {
        Role::Learner => "user".into(),
        Role::Assistant => "assistant".into(),
      },
      content: t.text,
    }));
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages,
      temperature: request.temperature,
      max_tokens: Some(request.max_output_tokens),
    };

    let start = std::time::Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "moet-study/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", credential))
      .json(&req).send().await
      .map_err(|e| {
        error!(target: "tutor", error = %e, "Provider request failed");
        GatewayError::Provider(format!("Could not reach the AI provider: {e}"))
      })?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_provider_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      error!(target: "tutor", %status, elapsed = ?start.elapsed(), "Provider returned an error");
      return Err(GatewayError::Provider(format!("AI provider error (HTTP {}): {}", status, msg)));
    }

    let body: ChatCompletionResponse = res.json().await
      .map_err(|e| GatewayError::Provider(format!("Malformed AI provider response: {e}")))?;
    if let Some(usage) = &body.usage {
      info!(target: "tutor", prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "Provider usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default().trim().to_string();
    if text.is_empty() {
      return Err(GatewayError::Provider("The AI provider returned an empty response.".into()));
    }

    info!(target: "tutor", elapsed = ?start.elapsed(), reply_len = text.len(), "Provider reply received");
    Ok(text)
  }
}

impl CompletionProvider for OpenAI {
  fn complete<'a>(&'a self, credential: &'a str, request: CompletionRequest) -> ProviderFuture<'a> {
    Box::pin(self.chat_plain(credential, request))
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from a provider error body.
/// Gemini's compatibility layer wraps errors either as an object or a one-element list.
fn extract_provider_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  if let Ok(w) = serde_json::from_str::<EWrap>(body) {
    return Some(w.error.message);
  }
  serde_json::from_str::<Vec<EWrap>>(body)
    .ok()
    .and_then(|v| v.into_iter().next())
    .map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn error_message_is_extracted_from_both_shapes() {
    let obj = r#"{"error":{"message":"API key not valid","code":400}}"#;
    let list = r#"[{"error":{"message":"quota exceeded"}}]"#;
    assert_eq!(extract_provider_error(obj).as_deref(), Some("API key not valid"));
    assert_eq!(extract_provider_error(list).as_deref(), Some("quota exceeded"));
    assert_eq!(extract_provider_error("<html>"), None);
  }
}

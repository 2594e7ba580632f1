//! Client for OpenAI-compatible chat-completion endpoints.
//!
//! Both the text and vision roles speak this protocol; the client only
//! differs by base URL, model, and the label used to tag transport
//! errors. Structured responses are coerced leniently: local models
//! love to wrap JSON in markdown fences or prose, so the parser strips
//! fences and falls back to scanning for the first embedded JSON value.

use std::time::Duration;

use base64::Engine as _;
use serde_json::Value;

use flyerforge_core::error::EngineError;

/// Client for one OpenAI-compatible endpoint.
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    /// Backend tag used in [`EngineError::Generation`] errors.
    label: String,
}

impl ChatClient {
    /// * `base_url` - e.g. `http://localhost:11434/v1`.
    /// * `label`    - backend tag for errors, e.g. `"text-llm"`.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        label: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            label: label.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a chat completion and return the assistant message content.
    pub async fn chat(&self, model: &str, messages: Value) -> Result<String, EngineError> {
        let body = serde_json::json!({
            "model": model,
            "messages": messages,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::generation(&self.label, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(EngineError::generation(
                &self.label,
                format!("HTTP {status}: {body}"),
            ));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| EngineError::generation(&self.label, e.to_string()))?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        Ok(content)
    }

    /// Send a chat completion and coerce the content into a JSON value.
    pub async fn chat_json(&self, model: &str, messages: Value) -> Result<Value, EngineError> {
        let content = self.chat(model, messages).await?;
        coerce_json(&content)
    }

    /// Probe `GET /models`, the cheapest liveness signal an
    /// OpenAI-compatible server offers.
    pub async fn list_models(&self) -> Result<(), EngineError> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| EngineError::generation(&self.label, e.to_string()))?;
        if !response.status().is_success() {
            return Err(EngineError::generation(
                &self.label,
                format!("HTTP {}", response.status()),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Message helpers
// ---------------------------------------------------------------------------

/// A single user message with plain text content.
pub fn user_text(text: &str) -> Value {
    serde_json::json!([{ "role": "user", "content": text }])
}

/// A single user message carrying text plus one image URL (data URLs
/// included) for vision models.
pub fn user_text_with_image(text: &str, image_url: &str) -> Value {
    serde_json::json!([{
        "role": "user",
        "content": [
            { "type": "text", "text": text },
            { "type": "image_url", "image_url": { "url": image_url } },
        ],
    }])
}

/// Encode raw image bytes as a `data:` URL for vision payloads.
pub fn data_url(bytes: &[u8], mime: &str) -> String {
    format!(
        "data:{mime};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

// ---------------------------------------------------------------------------
// Lenient JSON coercion
// ---------------------------------------------------------------------------

/// Coerce model output into a JSON value.
///
/// Strips markdown fences, tries a direct parse, then scans for the
/// first embedded object or array. Fails with [`EngineError::Parse`]
/// when nothing in the content parses.
pub fn coerce_json(content: &str) -> Result<Value, EngineError> {
    let cleaned = content
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string();

    if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
        return Ok(value);
    }

    for (idx, ch) in cleaned.char_indices() {
        if ch != '{' && ch != '[' {
            continue;
        }
        let mut stream = serde_json::Deserializer::from_str(&cleaned[idx..]).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            return Ok(value);
        }
    }

    Err(EngineError::Parse(format!(
        "No JSON value found in model response: {}",
        truncate_for_log(content)
    )))
}

fn truncate_for_log(content: &str) -> String {
    const MAX: usize = 200;
    if content.len() <= MAX {
        content.to_string()
    } else {
        let cut = content
            .char_indices()
            .take_while(|(i, _)| *i < MAX)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}...", &content[..cut])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    // -- coerce_json ----------------------------------------------------------

    #[test]
    fn plain_json_parses() {
        let value = coerce_json(r#"{"headline": "Sale!"}"#).unwrap();
        assert_eq!(value["headline"], "Sale!");
    }

    #[test]
    fn fenced_json_parses() {
        let value = coerce_json("```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn embedded_json_is_found() {
        let value = coerce_json("Sure! Here is your copy:\n{\"a\": 1} hope that helps").unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn embedded_array_is_found() {
        let value = coerce_json("the variants are [1, 2, 3] as requested").unwrap();
        assert_eq!(value, serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn prose_without_json_is_a_parse_error() {
        assert_matches!(
            coerce_json("I could not produce the copy, sorry."),
            Err(EngineError::Parse(_))
        );
    }

    #[test]
    fn braces_in_prose_do_not_confuse_the_scan() {
        let value = coerce_json("note {not json} but {\"ok\": true} works").unwrap();
        assert_eq!(value["ok"], true);
    }

    // -- message helpers ------------------------------------------------------

    #[test]
    fn data_url_has_mime_and_payload() {
        let url = data_url(b"abc", "image/png");
        assert!(url.starts_with("data:image/png;base64,"));
        assert!(url.ends_with("YWJj"));
    }

    #[test]
    fn vision_message_carries_both_parts() {
        let msg = user_text_with_image("look", "data:image/png;base64,AAAA");
        let content = &msg[0]["content"];
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[1]["type"], "image_url");
    }
}

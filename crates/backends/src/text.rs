//! Copy generation and brand-style derivation over chat backends.

use async_trait::async_trait;
use serde_json::Value;

use flyerforge_core::brand::BrandStyle;
use flyerforge_core::brief::Brief;
use flyerforge_core::copy::AdCopy;
use flyerforge_core::error::EngineError;
use flyerforge_core::prompt;

use crate::chat::{data_url, user_text, ChatClient};

/// Text-capable model backend.
///
/// Implementations select the model identifier and endpoint for their
/// provider and parse structured responses into the copy schema. A
/// [`EngineError::Parse`] from [`generate_copy`](Self::generate_copy)
/// is retryable by the caller with a corrective re-prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Model identifier recorded on the run.
    fn model_id(&self) -> String;

    async fn generate_copy(&self, instruction: &str, brief: &Brief)
        -> Result<AdCopy, EngineError>;

    /// Derive the run's brand style from the brief (and reference
    /// images when the implementation supports them).
    async fn derive_style(&self, brief: &Brief) -> Result<BrandStyle, EngineError>;
}

/// Chat-backed copywriter over any OpenAI-compatible endpoint.
pub struct LlmCopywriter {
    chat: ChatClient,
    model: String,
    /// Vision endpoint for reference-image style derivation.
    vision: Option<(ChatClient, String)>,
}

impl LlmCopywriter {
    pub fn new(chat: ChatClient, model: impl Into<String>) -> Self {
        Self {
            chat,
            model: model.into(),
            vision: None,
        }
    }

    /// Attach a vision endpoint so briefs with reference images derive
    /// their style from the actual brand visuals.
    pub fn with_vision(mut self, chat: ChatClient, model: impl Into<String>) -> Self {
        self.vision = Some((chat, model.into()));
        self
    }

    async fn style_from_images(
        &self,
        brief: &Brief,
        chat: &ChatClient,
        model: &str,
    ) -> Result<Option<BrandStyle>, EngineError> {
        let mut parts = vec![serde_json::json!({
            "type": "text",
            "text": prompt::STYLE_FROM_IMAGES_INSTRUCTION,
        })];
        for path in &brief.reference_images {
            match tokio::fs::read(path).await {
                Ok(bytes) => parts.push(serde_json::json!({
                    "type": "image_url",
                    "image_url": { "url": data_url(&bytes, mime_for(path)) },
                })),
                Err(e) => {
                    tracing::warn!(path, error = %e, "Skipping unreadable reference image");
                }
            }
        }
        if parts.len() == 1 {
            // Nothing readable; let the text path handle it.
            return Ok(None);
        }
        let messages = serde_json::json!([{ "role": "user", "content": parts }]);
        let value = chat.chat_json(model, messages).await?;
        Ok(Some(coerce_style(value)?))
    }
}

#[async_trait]
impl TextGenerator for LlmCopywriter {
    fn model_id(&self) -> String {
        self.model.clone()
    }

    async fn generate_copy(
        &self,
        instruction: &str,
        _brief: &Brief,
    ) -> Result<AdCopy, EngineError> {
        let value = self
            .chat
            .chat_json(&self.model, user_text(instruction))
            .await?;
        let copy = coerce_copy(value)?;
        if !copy.within_limits() {
            tracing::warn!(
                headline = %copy.headline,
                "Generated copy exceeds word limits; QC will judge the render",
            );
        }
        Ok(copy)
    }

    async fn derive_style(&self, brief: &Brief) -> Result<BrandStyle, EngineError> {
        if !brief.reference_images.is_empty() {
            if let Some((chat, model)) = &self.vision {
                if let Some(style) = self.style_from_images(brief, chat, model).await? {
                    return Ok(style.sanitized());
                }
            }
        }
        let value = self
            .chat
            .chat_json(&self.model, user_text(&prompt::style_instruction(brief)))
            .await?;
        Ok(coerce_style(value)?.sanitized())
    }
}

/// Guess a reference image's MIME type from its extension.
fn mime_for(path: &str) -> &'static str {
    match path.rsplit('.').next().map(|ext| ext.to_lowercase()) {
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "webp" => "image/webp",
        _ => "image/png",
    }
}

/// Coerce a model response into the copy schema.
///
/// Accepts a bare object, a `variants`/`copy_variants` wrapper, or an
/// array (first element wins). Missing required fields are a parse
/// failure.
pub fn coerce_copy(value: Value) -> Result<AdCopy, EngineError> {
    let candidate = match value {
        Value::Object(mut obj) => {
            match obj.remove("variants").or_else(|| obj.remove("copy_variants")) {
                Some(inner) => first_of(inner)?,
                None => Value::Object(obj),
            }
        }
        value @ Value::Array(_) => first_of(value)?,
        other => {
            return Err(EngineError::Parse(format!(
                "Copy response is not an object: {other}"
            )))
        }
    };
    serde_json::from_value(candidate)
        .map_err(|e| EngineError::Parse(format!("Copy response missing required fields: {e}")))
}

fn first_of(value: Value) -> Result<Value, EngineError> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::Parse("Copy response array is empty".to_string())),
        other => Ok(other),
    }
}

fn coerce_style(value: Value) -> Result<BrandStyle, EngineError> {
    serde_json::from_value(value)
        .map_err(|e| EngineError::Parse(format!("Brand style response malformed: {e}")))
}

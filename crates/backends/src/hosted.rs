//! Hosted image API backend (prompt in, base64 payload or URL out).

use async_trait::async_trait;
use base64::Engine as _;
use serde::Deserialize;

use flyerforge_core::error::EngineError;

use crate::image::{ImageBackend, ImagePayload, ImageRequest, ImageResult};

/// Backend name used for error tags and run records.
pub const BACKEND_NAME: &str = "hosted";

/// Settings for a hosted image-generation API.
#[derive(Debug, Clone)]
pub struct HostedConfig {
    /// API base URL, e.g. `https://api.openai.com/v1`.
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub quality: String,
}

impl Default for HostedConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-image-1".to_string(),
            quality: "high".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerationsResponse {
    #[serde(default)]
    data: Vec<GenerationsDatum>,
}

#[derive(Debug, Deserialize)]
struct GenerationsDatum {
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

pub struct HostedImageBackend {
    client: reqwest::Client,
    config: HostedConfig,
}

impl HostedImageBackend {
    pub fn new(config: HostedConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl ImageBackend for HostedImageBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn generate(&self, request: &ImageRequest) -> Result<ImageResult, EngineError> {
        // Hosted APIs take no separate negative prompt; fold it in.
        let prompt = format!(
            "{}\n\nNegative constraints: {}",
            request.prompt, request.negative_prompt
        );
        let body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "size": request.size.as_pixel_string(),
            "quality": request.params.quality.as_deref().unwrap_or(&self.config.quality),
        });

        let response = self
            .client
            .post(format!(
                "{}/images/generations",
                self.config.api_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::generation(BACKEND_NAME, e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::generation(
                BACKEND_NAME,
                format!("HTTP {status}: {body}"),
            ));
        }
        let payload: GenerationsResponse = response
            .json()
            .await
            .map_err(|e| EngineError::generation(BACKEND_NAME, e.to_string()))?;

        let datum = payload
            .data
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::generation(BACKEND_NAME, "empty data array"))?;

        if let Some(b64) = datum.b64_json {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(b64.as_bytes())
                .map_err(|e| {
                    EngineError::generation(BACKEND_NAME, format!("invalid b64_json: {e}"))
                })?;
            return Ok(ImageResult {
                payload: ImagePayload::Bytes(bytes),
                backend: BACKEND_NAME,
            });
        }
        if let Some(url) = datum.url {
            return Ok(ImageResult {
                payload: ImagePayload::Url(url),
                backend: BACKEND_NAME,
            });
        }
        Err(EngineError::generation(
            BACKEND_NAME,
            "response carried neither b64_json nor url",
        ))
    }
}

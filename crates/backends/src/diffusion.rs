//! Diffusion-server backend (txt2img JSON in, base64 images out).

use async_trait::async_trait;
use base64::Engine as _;
use serde::Deserialize;

use flyerforge_core::error::EngineError;

use crate::image::{ImageBackend, ImagePayload, ImageRequest, ImageResult};

/// Backend name used for error tags and run records.
pub const BACKEND_NAME: &str = "diffusion";

/// Settings for a txt2img diffusion server.
#[derive(Debug, Clone)]
pub struct DiffusionConfig {
    /// Full txt2img endpoint, e.g.
    /// `http://localhost:7860/sdapi/v1/txt2img`.
    pub api_url: String,
    pub steps: u32,
    pub cfg_scale: f64,
    pub sampler: String,
}

impl Default for DiffusionConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:7860/sdapi/v1/txt2img".to_string(),
            steps: 6,
            cfg_scale: 1.5,
            sampler: "Euler a".to_string(),
        }
    }
}

/// txt2img response body; only the images matter.
#[derive(Debug, Deserialize)]
struct TxtToImgResponse {
    #[serde(default)]
    images: Vec<String>,
}

pub struct DiffusionBackend {
    client: reqwest::Client,
    config: DiffusionConfig,
}

impl DiffusionBackend {
    pub fn new(config: DiffusionConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl ImageBackend for DiffusionBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn generate(&self, request: &ImageRequest) -> Result<ImageResult, EngineError> {
        let (width, height) = request.size.dimensions();
        let params = &request.params;
        let mut payload = serde_json::json!({
            "prompt": request.prompt,
            "negative_prompt": request.negative_prompt,
            "steps": params.steps.unwrap_or(self.config.steps),
            "cfg_scale": params.guidance_scale.unwrap_or(self.config.cfg_scale),
            "width": width,
            "height": height,
            "sampler_name": params.sampler.as_deref().unwrap_or(&self.config.sampler),
        });
        if let Some(seed) = params.seed {
            payload["seed"] = serde_json::json!(seed);
        }

        let response = self
            .client
            .post(&self.config.api_url)
            .json(&payload)
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
        let body: TxtToImgResponse = response
            .json()
            .await
            .map_err(|e| EngineError::generation(BACKEND_NAME, e.to_string()))?;

        let first = body
            .images
            .first()
            .ok_or_else(|| EngineError::generation(BACKEND_NAME, "no images in response"))?;
        let bytes = decode_image_b64(first)
            .map_err(|e| EngineError::generation(BACKEND_NAME, e))?;

        Ok(ImageResult {
            payload: ImagePayload::Bytes(bytes),
            backend: BACKEND_NAME,
        })
    }
}

/// Decode a base64 image, tolerating a `data:...;base64,` prefix.
fn decode_image_b64(encoded: &str) -> Result<Vec<u8>, String> {
    let raw = match encoded.split_once(',') {
        Some((_, tail)) => tail,
        None => encoded,
    };
    base64::engine::general_purpose::STANDARD
        .decode(raw)
        .map_err(|e| format!("invalid base64 image: {e}"))
}

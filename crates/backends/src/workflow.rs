//! Workflow-compositor backend.
//!
//! The one backend that renders the complete flyer -- background
//! synthesis plus typeset copy -- in a single call, by filling a JSON
//! node-graph template and submitting it to a compositor server. Unlike
//! the other backends its request binds the full creative context, not
//! just the prompt pair.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use flyerforge_comfy::api::{select_output_image, CompositorApi, CompositorApiError};
use flyerforge_comfy::template::{self, TemplateValue};
use flyerforge_core::brand::resolve_palette_hex;
use flyerforge_core::error::EngineError;

use crate::image::{ImageBackend, ImagePayload, ImageRequest, ImageResult};

/// Backend name used for error tags and run records.
pub const BACKEND_NAME: &str = "workflow";

/// Fallback primary color when nothing in the palette resolves.
const DEFAULT_PRIMARY_HEX: &str = "#1e67b6";

/// Generation knobs the template may expose as override tokens.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub checkpoint: String,
    pub seed: i64,
    pub steps: u32,
    pub cfg: f64,
    pub sampler: String,
    pub scheduler: String,
    pub denoise: f64,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            checkpoint: "sd_xl_base_1.0.safetensors".to_string(),
            seed: 42,
            steps: 30,
            cfg: 6.5,
            sampler: "euler".to_string(),
            scheduler: "normal".to_string(),
            denoise: 1.0,
        }
    }
}

pub struct WorkflowBackend {
    api: CompositorApi,
    /// The raw template text, loaded once at configuration time.
    template: String,
    output_node: Option<String>,
    font_path: String,
    settings: WorkflowSettings,
    poll_interval: Duration,
}

impl WorkflowBackend {
    pub fn new(api_url: &str, template: String) -> Self {
        Self {
            api: CompositorApi::new(api_url),
            template,
            output_node: None,
            font_path: "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string(),
            settings: WorkflowSettings::default(),
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn with_output_node(mut self, node: Option<String>) -> Self {
        self.output_node = node;
        self
    }

    pub fn with_font_path(mut self, font_path: impl Into<String>) -> Self {
        self.font_path = font_path.into();
        self
    }

    pub fn with_settings(mut self, settings: WorkflowSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Bind every template token for one request.
    fn template_values(&self, request: &ImageRequest) -> HashMap<String, TemplateValue> {
        let brief = &request.brief;
        let style = &request.style;
        let copy = &request.copy;
        let params = &request.params;
        let (width, height) = request.size.dimensions();

        let palette_items = if style.palette.is_empty() {
            &brief.brand_colors
        } else {
            &style.palette
        };
        let keywords = if style.style_keywords.is_empty() {
            &brief.style_keywords
        } else {
            &style.style_keywords
        };
        let primary = resolve_palette_hex(palette_items, DEFAULT_PRIMARY_HEX);
        let accent = resolve_palette_hex(palette_items.get(1..).unwrap_or(&[]), &primary);
        // Per-variant seed offset keeps parallel variants visually distinct.
        let seed = params.seed.unwrap_or(self.settings.seed) + request.variant_index as i64;

        let mut values: HashMap<String, TemplateValue> = HashMap::new();
        values.insert("PROMPT".into(), request.prompt.as_str().into());
        values.insert(
            "NEGATIVE_PROMPT".into(),
            request.negative_prompt.as_str().into(),
        );
        values.insert("WIDTH".into(), width.into());
        values.insert("HEIGHT".into(), height.into());
        values.insert("FONT_PATH".into(), self.font_path.as_str().into());
        values.insert("HEADLINE".into(), copy.headline.as_str().into());
        values.insert("SUBHEAD".into(), copy.subhead.as_str().into());
        values.insert("BODY".into(), copy.body.as_str().into());
        values.insert("CTA".into(), copy.cta.as_str().into());
        values.insert(
            "DISCLAIMER".into(),
            copy.disclaimer.as_deref().unwrap_or("").into(),
        );
        values.insert("BUSINESS_BLOCK".into(), brief.business_block().into());
        values.insert(
            "AUDIENCE".into(),
            brief.audience.as_deref().unwrap_or("").into(),
        );
        values.insert("PALETTE".into(), palette_items.join(", ").into());
        values.insert("STYLE_KEYWORDS".into(), keywords.join(", ").into());
        values.insert(
            "LAYOUT_GUIDANCE".into(),
            style.layout_guidance.as_str().into(),
        );
        values.insert("BUSINESS_NAME".into(), brief.business.name.as_str().into());
        values.insert("PRODUCT".into(), brief.product.as_str().into());
        values.insert("OFFER".into(), brief.offer.as_str().into());
        values.insert("CONSTRAINTS".into(), brief.constraints.join("; ").into());
        values.insert("PRIMARY_COLOR".into(), primary.into());
        values.insert("ACCENT_COLOR".into(), accent.into());
        values.insert("TEXT_DARK".into(), "#111111".into());
        values.insert("TEXT_MUTED".into(), "#333333".into());
        values.insert("TEXT_LIGHT".into(), "#ffffff".into());

        values.insert(
            "CKPT_NAME".into(),
            params
                .checkpoint
                .as_deref()
                .unwrap_or(&self.settings.checkpoint)
                .into(),
        );
        values.insert("SEED".into(), seed.into());
        values.insert(
            "STEPS".into(),
            params.steps.unwrap_or(self.settings.steps).into(),
        );
        values.insert(
            "CFG".into(),
            params.guidance_scale.unwrap_or(self.settings.cfg).into(),
        );
        values.insert(
            "SAMPLER_NAME".into(),
            params
                .sampler
                .as_deref()
                .unwrap_or(&self.settings.sampler)
                .into(),
        );
        values.insert(
            "SCHEDULER".into(),
            params
                .scheduler
                .as_deref()
                .unwrap_or(&self.settings.scheduler)
                .into(),
        );
        values.insert(
            "DENOISE".into(),
            params.denoise.unwrap_or(self.settings.denoise).into(),
        );
        values
    }
}

fn api_error(e: CompositorApiError) -> EngineError {
    EngineError::generation(BACKEND_NAME, e.to_string())
}

#[async_trait]
impl ImageBackend for WorkflowBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn generate(&self, request: &ImageRequest) -> Result<ImageResult, EngineError> {
        // Template faults propagate as-is: they recur identically on
        // retry and must fail the run, not burn attempts.
        let workflow = template::render(&self.template, &self.template_values(request))?;

        let client_id = uuid::Uuid::new_v4().to_string();
        let submitted = self
            .api
            .submit_workflow(&workflow, &client_id)
            .await
            .map_err(api_error)?;
        tracing::debug!(
            prompt_id = %submitted.prompt_id,
            queue_position = submitted.number,
            "Workflow submitted to compositor",
        );

        // Poll until outputs appear; the ImageClient wrapper bounds the
        // overall wait.
        let outputs = loop {
            if let Some(outputs) = self
                .api
                .outputs_for(&submitted.prompt_id)
                .await
                .map_err(api_error)?
            {
                break outputs;
            }
            tokio::time::sleep(self.poll_interval).await;
        };

        let node = request
            .params
            .output_node
            .as_deref()
            .or(self.output_node.as_deref());
        let image_ref = select_output_image(&outputs, node).map_err(api_error)?;
        let bytes = self.api.fetch_image(&image_ref).await.map_err(api_error)?;

        Ok(ImageResult {
            payload: ImagePayload::Bytes(bytes),
            backend: BACKEND_NAME,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use flyerforge_core::brand::BrandStyle;
    use flyerforge_core::brief::{normalize, BusinessDetails, RawBrief};
    use flyerforge_core::copy::AdCopy;
    use flyerforge_core::size::PrintSize;
    use crate::image::StyleParams;
    use std::sync::Arc;

    fn backend(template: &str) -> WorkflowBackend {
        WorkflowBackend::new("http://localhost:8188", template.to_string())
    }

    fn request() -> ImageRequest {
        let brief = normalize(RawBrief {
            business: BusinessDetails {
                name: "Acme HVAC".into(),
                address: None,
                city: None,
                state: None,
                postal_code: None,
                phone: None,
                website: None,
                service_area: None,
                hours: None,
            },
            product: "Furnace tune-up".into(),
            offer: "$79 seasonal special".into(),
            tone: None,
            cta: None,
            audience: None,
            size: "6x9".into(),
            constraints: vec![],
            brand_colors: vec!["navy".into(), "gold".into()],
            style_keywords: vec!["clean".into()],
            reference_images: vec![],
        })
        .unwrap();
        ImageRequest {
            prompt: "cozy living room".into(),
            negative_prompt: "text".into(),
            size: PrintSize::Flyer6x9,
            params: StyleParams::default(),
            brief: Arc::new(brief),
            style: Arc::new(BrandStyle::default()),
            copy: AdCopy {
                headline: "Stay Warm".into(),
                subhead: "Tune-up season is here".into(),
                body: "Book now and save.".into(),
                cta: "Call Today".into(),
                disclaimer: None,
            },
            variant_index: 2,
        }
    }

    #[test]
    fn template_values_cover_the_recognized_set() {
        let backend = backend("{}");
        let values = backend.template_values(&request());
        for token in template::RECOGNIZED_TOKENS {
            assert!(values.contains_key(*token), "missing {token}");
        }
        for token in template::OVERRIDE_TOKENS {
            assert!(values.contains_key(*token), "missing {token}");
        }
    }

    #[test]
    fn seed_offsets_by_variant_index() {
        let backend = backend("{}");
        let values = backend.template_values(&request());
        assert_eq!(values["SEED"], TemplateValue::Int(42 + 2));
    }

    #[test]
    fn palette_colors_resolve_to_hex() {
        let backend = backend("{}");
        let values = backend.template_values(&request());
        assert_eq!(values["PRIMARY_COLOR"], TemplateValue::Text("#0a2140".into()));
        assert_eq!(values["ACCENT_COLOR"], TemplateValue::Text("#d4af37".into()));
    }

    #[test]
    fn params_override_configured_settings() {
        let backend = backend("{}");
        let mut req = request();
        req.params.steps = Some(12);
        req.params.sampler = Some("dpmpp_2m".into());
        let values = backend.template_values(&req);
        assert_eq!(values["STEPS"], TemplateValue::Int(12));
        assert_eq!(values["SAMPLER_NAME"], TemplateValue::Text("dpmpp_2m".into()));
    }

    #[tokio::test]
    async fn unfilled_recognized_token_is_a_template_error() {
        // PROMPT is supplied by template_values, but a template that
        // asks for a recognized token we somehow cannot bind is modeled
        // by rendering directly.
        let err = template::render(
            r#"{"w": {{WIDTH}}}"#,
            &HashMap::new(),
        )
        .unwrap_err();
        assert_matches!(err, EngineError::Template(_));
    }
}

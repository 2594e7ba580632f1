//! The vision-backed quality control gate.
//!
//! A vision model reads the text actually rendered on the flyer; the
//! scoring policy in [`flyerforge_core::qc`] compares it against the
//! brief's required literals.

use async_trait::async_trait;

use flyerforge_core::brief::Brief;
use flyerforge_core::copy::AdCopy;
use flyerforge_core::error::EngineError;
use flyerforge_core::qc::{self, QcOutcome};

use crate::chat::{data_url, user_text_with_image, ChatClient};
use crate::image::ImagePayload;

/// Vision-capable model backend scoring a generated image against the
/// brief.
#[async_trait]
pub trait QualityInspector: Send + Sync {
    /// Model identifier recorded on the run.
    fn model_id(&self) -> String;

    async fn evaluate(
        &self,
        image: &ImagePayload,
        brief: &Brief,
        copy: &AdCopy,
    ) -> Result<QcOutcome, EngineError>;
}

/// Instruction sent alongside the flyer image.
pub const EXTRACT_TEXT_INSTRUCTION: &str = "Extract all visible text from this flyer image. \
    Return only the text, preserve line breaks when possible.";

/// Inspector backed by an OpenAI-compatible vision endpoint.
pub struct VisionInspector {
    chat: ChatClient,
    model: String,
    cutoff: f64,
}

impl VisionInspector {
    pub fn new(chat: ChatClient, model: impl Into<String>, cutoff: f64) -> Self {
        Self {
            chat,
            model: model.into(),
            cutoff,
        }
    }
}

#[async_trait]
impl QualityInspector for VisionInspector {
    fn model_id(&self) -> String {
        self.model.clone()
    }

    async fn evaluate(
        &self,
        image: &ImagePayload,
        brief: &Brief,
        copy: &AdCopy,
    ) -> Result<QcOutcome, EngineError> {
        let image_url = match image {
            ImagePayload::Bytes(bytes) => data_url(bytes, "image/png"),
            ImagePayload::Url(url) => url.clone(),
        };
        let extracted = self
            .chat
            .chat(
                &self.model,
                user_text_with_image(EXTRACT_TEXT_INSTRUCTION, &image_url),
            )
            .await?;

        let mut required = copy.required_strings();
        required.extend(brief.required_literals());
        let scan = qc::scan_required(&required, &extracted);
        let outcome = qc::evaluate(&scan, self.cutoff);
        tracing::debug!(
            score = outcome.score,
            passed = outcome.passed,
            rationale = %outcome.rationale,
            "QC evaluation complete",
        );
        Ok(outcome)
    }
}

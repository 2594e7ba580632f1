//! The variant orchestrator.
//!
//! Drives one variant through compose -> copy -> image -> QC with the
//! retry policy of the engine: transport and parse failures retry up to
//! the attempt cap, a parse failure gets one corrective re-prompt
//! first, QC fails retry from the image stage with the validated copy
//! reused, and template faults abort the whole run.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use flyerforge_backends::image::{ImageClient, ImagePayload, ImageRequest, StyleParams};
use flyerforge_backends::text::TextGenerator;
use flyerforge_backends::vision::QualityInspector;
use flyerforge_core::brand::BrandStyle;
use flyerforge_core::brief::Brief;
use flyerforge_core::copy::AdCopy;
use flyerforge_core::error::EngineError;
use flyerforge_core::prompt;
use flyerforge_core::qc::QcOutcome;
use flyerforge_core::state::VariantState;
use flyerforge_core::types::{DbId, Timestamp};

use crate::store::{image_key, ImageStore};

/// Everything one variant orchestrator needs. Each variant gets its own
/// context; nothing here is shared mutable state.
pub(crate) struct VariantContext {
    pub run_id: DbId,
    pub index: u32,
    pub brief: Arc<Brief>,
    pub style: Arc<BrandStyle>,
    pub text: Arc<dyn TextGenerator>,
    pub inspector: Arc<dyn QualityInspector>,
    pub images: Arc<ImageClient>,
    pub image_store: Arc<dyn ImageStore>,
    pub max_attempts: u32,
    pub qc_enabled: bool,
    pub prompt_budget: usize,
    pub cancel: CancellationToken,
}

/// Terminal record of one variant. Mutated only by its own
/// orchestrator instance.
#[derive(Debug, Clone, serde::Serialize)]
pub struct VariantOutcome {
    pub index: u32,
    pub state: VariantState,
    pub attempts: u32,
    pub copy: Option<AdCopy>,
    pub prompt: Option<String>,
    pub negative_prompt: Option<String>,
    pub image_ref: Option<String>,
    pub qc: Option<QcOutcome>,
    /// Last error when the variant failed.
    pub error: Option<String>,
    /// Set when the failure is a configuration or internal fault that
    /// must fail the whole run, not just this variant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_fatal: Option<String>,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
}

impl VariantOutcome {
    fn new(index: u32) -> Self {
        let now = chrono::Utc::now();
        Self {
            index,
            state: VariantState::Pending,
            attempts: 0,
            copy: None,
            prompt: None,
            negative_prompt: None,
            image_ref: None,
            qc: None,
            error: None,
            run_fatal: None,
            started_at: now,
            finished_at: now,
        }
    }

    /// Whether the variant ended accepted.
    pub fn accepted(&self) -> bool {
        self.state == VariantState::Accepted
    }

    /// Whether the variant failed purely on QC judgment, with no
    /// backend error involved in its last attempt.
    pub fn qc_rejected(&self) -> bool {
        self.state == VariantState::Failed
            && self.qc.as_ref().is_some_and(|qc| !qc.passed)
            && self.run_fatal.is_none()
    }
}

/// Apply a validated transition; an illegal move is an internal fault
/// that fails the variant and the run.
fn advance(out: &mut VariantOutcome, next: VariantState) {
    match out.state.transition(next) {
        Ok(state) => out.state = state,
        Err(e) => {
            let msg = e.to_string();
            out.error = Some(msg.clone());
            out.run_fatal = Some(msg);
            out.state = VariantState::Failed;
        }
    }
}

/// Route a stage failure: retryable errors go to `Retrying` until the
/// attempt cap, template and internal faults fail the run.
pub(crate) fn handle_failure(out: &mut VariantOutcome, max_attempts: u32, error: EngineError) {
    out.error = Some(error.to_string());
    if error.is_retryable() {
        if out.attempts >= max_attempts {
            advance(out, VariantState::Failed);
        } else if out.state != VariantState::Retrying {
            // A stage entered directly from Retrying failed again; the
            // state is already correct for another attempt.
            advance(out, VariantState::Retrying);
        }
    } else {
        out.run_fatal = Some(error.to_string());
        advance(out, VariantState::Failed);
    }
}

/// One corrective re-prompt after a parse failure, then surface
/// whatever happens.
async fn generate_copy_with_reprompt(
    ctx: &VariantContext,
    instruction: &str,
) -> Result<AdCopy, EngineError> {
    match ctx.text.generate_copy(instruction, &ctx.brief).await {
        Ok(copy) => Ok(copy),
        Err(EngineError::Parse(msg)) => {
            tracing::warn!(
                run_id = ctx.run_id,
                variant = ctx.index,
                error = %msg,
                "Copy response unparseable, sending corrective re-prompt",
            );
            ctx.text
                .generate_copy(&prompt::corrective_instruction(instruction), &ctx.brief)
                .await
        }
        Err(e) => Err(e),
    }
}

/// Drive one variant to a terminal state.
pub(crate) async fn run_variant(ctx: VariantContext) -> VariantOutcome {
    let mut out = VariantOutcome::new(ctx.index);
    let instruction = prompt::copy_instruction(&ctx.brief, &ctx.style, ctx.index);

    loop {
        if ctx.cancel.is_cancelled() {
            out.error = Some("run cancelled".to_string());
            advance(&mut out, VariantState::Failed);
            break;
        }
        out.attempts += 1;
        tracing::info!(
            run_id = ctx.run_id,
            variant = ctx.index,
            attempt = out.attempts,
            "Variant attempt starting",
        );

        // ---- copy ----
        // Validated copy survives image/QC retries; only a text-stage
        // failure regenerates it.
        if out.copy.is_none() {
            match generate_copy_with_reprompt(&ctx, &instruction).await {
                Ok(copy) => {
                    advance(&mut out, VariantState::CopyGenerated);
                    out.copy = Some(copy);
                }
                Err(e) => {
                    handle_failure(&mut out, ctx.max_attempts, e);
                    if out.state.is_terminal() {
                        break;
                    }
                    continue;
                }
            }
        }
        if out.state.is_terminal() {
            break;
        }
        let Some(copy) = out.copy.clone() else {
            handle_failure(
                &mut out,
                ctx.max_attempts,
                EngineError::Internal("copy slot empty after generation stage".to_string()),
            );
            break;
        };

        // ---- image ----
        let image_prompt = prompt::image_prompt(&ctx.brief, &ctx.style, &copy, ctx.prompt_budget);
        out.prompt = Some(image_prompt.clone());
        out.negative_prompt = Some(prompt::NEGATIVE_PROMPT.to_string());
        let request = ImageRequest {
            prompt: image_prompt,
            negative_prompt: prompt::NEGATIVE_PROMPT.to_string(),
            size: ctx.brief.size,
            params: StyleParams::default(),
            brief: Arc::clone(&ctx.brief),
            style: Arc::clone(&ctx.style),
            copy: copy.clone(),
            variant_index: ctx.index,
        };
        let payload = match ctx.images.generate_image(&request).await {
            Ok(result) => result.payload,
            Err(e) => {
                handle_failure(&mut out, ctx.max_attempts, e);
                if out.state.is_terminal() {
                    break;
                }
                continue;
            }
        };
        match &payload {
            ImagePayload::Bytes(bytes) => {
                match ctx
                    .image_store
                    .put_image(&image_key(ctx.run_id, ctx.index), bytes)
                    .await
                {
                    Ok(reference) => out.image_ref = Some(reference),
                    Err(e) => {
                        handle_failure(&mut out, ctx.max_attempts, e);
                        break;
                    }
                }
            }
            ImagePayload::Url(url) => out.image_ref = Some(url.clone()),
        }
        advance(&mut out, VariantState::ImageGenerated);
        if out.state.is_terminal() {
            break;
        }

        // ---- QC ----
        let qc = if !ctx.qc_enabled {
            QcOutcome::disabled()
        } else {
            match ctx.inspector.evaluate(&payload, &ctx.brief, &copy).await {
                Ok(qc) => qc,
                Err(e) => {
                    handle_failure(&mut out, ctx.max_attempts, e);
                    if out.state.is_terminal() {
                        break;
                    }
                    continue;
                }
            }
        };
        advance(&mut out, VariantState::QcEvaluated);
        out.qc = Some(qc.clone());
        if out.state.is_terminal() {
            break;
        }

        if qc.passed {
            advance(&mut out, VariantState::Accepted);
            tracing::info!(
                run_id = ctx.run_id,
                variant = ctx.index,
                attempts = out.attempts,
                score = qc.score,
                "Variant accepted",
            );
            break;
        }
        tracing::info!(
            run_id = ctx.run_id,
            variant = ctx.index,
            attempt = out.attempts,
            score = qc.score,
            rationale = %qc.rationale,
            "Variant failed QC",
        );
        if out.attempts >= ctx.max_attempts {
            out.error = Some(format!("retry cap exhausted: {}", qc.rationale));
            advance(&mut out, VariantState::Failed);
            break;
        }
        advance(&mut out, VariantState::Retrying);
        if out.state.is_terminal() {
            break;
        }
    }

    out.finished_at = chrono::Utc::now();
    out
}

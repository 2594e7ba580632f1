//! The run controller.
//!
//! Owns a run's lifecycle: normalize the brief, create the run record,
//! derive the brand style, fan out variant orchestrators under bounded
//! parallelism, aggregate terminal outcomes, select the winner, and
//! persist everything exactly once. No variant failure aborts its
//! siblings; a template or internal fault fails the run but every
//! completed variant stays visible.

use std::cmp::Ordering;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use flyerforge_backends::image::ImageClient;
use flyerforge_backends::text::TextGenerator;
use flyerforge_backends::vision::QualityInspector;
use flyerforge_core::brand::BrandStyle;
use flyerforge_core::brief::{normalize, Brief, RawBrief};
use flyerforge_core::error::EngineError;
use flyerforge_core::state::RunStatus;
use flyerforge_core::types::DbId;

use crate::config::EngineConfig;
use crate::store::{ImageStore, RunStore};
use crate::variant::{run_variant, VariantContext, VariantOutcome};

/// Aggregated result of one run, mirrored into persistence.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunOutcome {
    pub run_id: DbId,
    pub status: RunStatus,
    pub style: BrandStyle,
    pub variants: Vec<VariantOutcome>,
    /// Winning variant: highest QC score among accepted, lowest index
    /// on ties.
    pub best_index: Option<u32>,
    pub error: Option<String>,
}

pub struct RunController {
    config: EngineConfig,
    text: Arc<dyn TextGenerator>,
    inspector: Arc<dyn QualityInspector>,
    images: Arc<ImageClient>,
    store: Arc<dyn RunStore>,
    image_store: Arc<dyn ImageStore>,
}

impl RunController {
    pub fn new(
        config: EngineConfig,
        text: Arc<dyn TextGenerator>,
        inspector: Arc<dyn QualityInspector>,
        images: Arc<ImageClient>,
        store: Arc<dyn RunStore>,
        image_store: Arc<dyn ImageStore>,
    ) -> Self {
        Self {
            config,
            text,
            inspector,
            images,
            store,
            image_store,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute a run to completion.
    pub async fn execute(
        &self,
        raw: RawBrief,
        variant_count: Option<u32>,
    ) -> Result<RunOutcome, EngineError> {
        self.execute_cancellable(raw, variant_count, CancellationToken::new())
            .await
    }

    /// Execute a run with caller-driven cancellation. Cancelling stops
    /// new backend calls; already-accepted variants are preserved.
    pub async fn execute_cancellable(
        &self,
        raw: RawBrief,
        variant_count: Option<u32>,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, EngineError> {
        // A bad brief is rejected before any run record exists.
        let brief = Arc::new(normalize(raw)?);
        let count = variant_count.unwrap_or(self.config.variant_count).max(1);

        let model_versions = serde_json::json!({
            "text_model": self.text.model_id(),
            "qc_model": self.inspector.model_id(),
            "image_backend": self.images.backend_name(),
        });
        let run_id = self.store.create_run(&brief, &model_versions).await?;
        tracing::info!(run_id, variants = count, "Run created");

        let (style, variants, fatal) = self.drive(run_id, &brief, count, &cancel).await;

        // A configuration or internal fault fails the run outright;
        // otherwise one accepted variant is enough to succeed.
        let status = if fatal.is_none() && variants.iter().any(VariantOutcome::accepted) {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        };
        let error = match status {
            RunStatus::Succeeded => None,
            _ => Some(fatal.unwrap_or_else(|| {
                if !variants.is_empty() && variants.iter().all(VariantOutcome::qc_rejected) {
                    "no variant passed quality control".to_string()
                } else {
                    format!("all {count} variants failed")
                }
            })),
        };

        // The single persistence write for variants and terminal state.
        self.store
            .complete_run(run_id, status, error.as_deref(), &variants)
            .await?;

        let best_index = select_best(&variants);
        tracing::info!(
            run_id,
            status = status.as_str(),
            accepted = variants.iter().filter(|v| v.accepted()).count(),
            best = best_index,
            "Run complete",
        );
        Ok(RunOutcome {
            run_id,
            status,
            style,
            variants,
            best_index,
            error,
        })
    }

    /// Promote a variant (the caller's pick, else the best) to a
    /// durable campaign asset.
    pub async fn promote(
        &self,
        outcome: &RunOutcome,
        campaign_id: DbId,
        variant_index: Option<u32>,
    ) -> Result<DbId, EngineError> {
        let index = variant_index.or(outcome.best_index).ok_or_else(|| {
            EngineError::Validation("no accepted variant to promote".to_string())
        })?;
        let variant = outcome
            .variants
            .iter()
            .find(|v| v.index == index)
            .ok_or(EngineError::NotFound {
                entity: "variant",
                id: index as DbId,
            })?;

        // An asset must reference a QC-passed variant; the disabled-QC
        // marker outcome also counts as passed.
        if !variant.qc.as_ref().is_some_and(|qc| qc.passed) {
            return Err(EngineError::Validation(format!(
                "variant {index} did not pass quality control"
            )));
        }
        let image_ref = variant.image_ref.as_deref().ok_or_else(|| {
            EngineError::Validation(format!("variant {index} has no image reference"))
        })?;
        let copy_text = match &variant.copy {
            Some(copy) => serde_json::to_string(copy)
                .map_err(|e| EngineError::Persistence(e.to_string()))?,
            None => String::new(),
        };

        let asset_id = self
            .store
            .create_asset(campaign_id, outcome.run_id, index, image_ref, &copy_text)
            .await?;
        tracing::info!(
            run_id = outcome.run_id,
            variant = index,
            asset_id,
            campaign_id,
            "Variant promoted to asset",
        );
        Ok(asset_id)
    }

    /// Derive style and run every variant to a terminal state. Returns
    /// the style, all outcomes sorted by index, and the first run-fatal
    /// message if any.
    async fn drive(
        &self,
        run_id: DbId,
        brief: &Arc<Brief>,
        count: u32,
        cancel: &CancellationToken,
    ) -> (BrandStyle, Vec<VariantOutcome>, Option<String>) {
        let style = match self.text.derive_style(brief).await {
            Ok(style) => style,
            Err(e) => {
                tracing::error!(run_id, error = %e, "Brand style derivation failed");
                return (BrandStyle::default(), Vec::new(), Some(e.to_string()));
            }
        };
        // Incremental observability write; a failure here never fails
        // the run.
        if let Err(e) = self.store.record_style(run_id, &style).await {
            tracing::warn!(run_id, error = %e, "Failed to record brand style");
        }
        let style = Arc::new(style);

        let limiter = Arc::new(Semaphore::new(self.config.variant_parallelism));
        let mut set: JoinSet<VariantOutcome> = JoinSet::new();
        for index in 0..count {
            let ctx = VariantContext {
                run_id,
                index,
                brief: Arc::clone(brief),
                style: Arc::clone(&style),
                text: Arc::clone(&self.text),
                inspector: Arc::clone(&self.inspector),
                images: Arc::clone(&self.images),
                image_store: Arc::clone(&self.image_store),
                max_attempts: self.config.max_attempts,
                qc_enabled: self.config.qc_enabled,
                prompt_budget: self.config.prompt_budget,
                cancel: cancel.child_token(),
            };
            let limiter = Arc::clone(&limiter);
            set.spawn(async move {
                let _permit = limiter.acquire_owned().await.ok();
                run_variant(ctx).await
            });
        }

        let mut variants = Vec::with_capacity(count as usize);
        let mut fatal: Option<String> = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) => {
                    if let Some(msg) = &outcome.run_fatal {
                        if fatal.is_none() {
                            fatal = Some(msg.clone());
                            // Configuration faults recur identically;
                            // stop issuing new backend calls.
                            cancel.cancel();
                        }
                    }
                    variants.push(outcome);
                }
                Err(join_err) => {
                    // A panicked orchestrator is an unhandled fault:
                    // recorded verbatim, siblings still collected.
                    tracing::error!(run_id, error = %join_err, "Variant task failed");
                    if fatal.is_none() {
                        fatal = Some(join_err.to_string());
                        cancel.cancel();
                    }
                }
            }
        }
        variants.sort_by_key(|v| v.index);
        (Arc::unwrap_or_clone(style), variants, fatal)
    }
}

/// Pick the accepted variant with the highest QC score; the lowest
/// index wins a tie.
pub fn select_best(variants: &[VariantOutcome]) -> Option<u32> {
    variants
        .iter()
        .filter(|v| v.accepted())
        .max_by(|a, b| {
            let score_a = a.qc.as_ref().map(|qc| qc.score).unwrap_or(0.0);
            let score_b = b.qc.as_ref().map(|qc| qc.score).unwrap_or(0.0);
            score_a
                .partial_cmp(&score_b)
                .unwrap_or(Ordering::Equal)
                .then(b.index.cmp(&a.index))
        })
        .map(|v| v.index)
}

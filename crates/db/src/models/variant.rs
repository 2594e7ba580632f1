//! Creative variant models.

use serde::Serialize;
use sqlx::FromRow;

use flyerforge_core::types::{DbId, Timestamp};
use flyerforge_engine::variant::VariantOutcome;

/// A row from the `creative_variants` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CreativeVariant {
    pub id: DbId,
    pub run_id: DbId,
    /// Unique within the run; lower index means generated first.
    pub variant_index: i32,
    /// Terminal variant state string.
    pub state: String,
    pub attempts: i32,
    pub copy_json: Option<serde_json::Value>,
    pub prompt_text: Option<String>,
    pub negative_prompt: Option<String>,
    pub image_url: Option<String>,
    pub qc_passed: bool,
    pub qc_score: Option<f64>,
    pub qc_text: Option<String>,
    pub error: Option<String>,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
    pub created_at: Timestamp,
}

/// Fields for inserting a variant row.
#[derive(Debug, Clone)]
pub struct CreateVariant {
    pub run_id: DbId,
    pub variant_index: i32,
    pub state: String,
    pub attempts: i32,
    pub copy_json: Option<serde_json::Value>,
    pub prompt_text: Option<String>,
    pub negative_prompt: Option<String>,
    pub image_url: Option<String>,
    pub qc_passed: bool,
    pub qc_score: Option<f64>,
    pub qc_text: Option<String>,
    pub error: Option<String>,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
}

impl CreateVariant {
    /// Map a terminal engine outcome onto row fields.
    pub fn from_outcome(run_id: DbId, outcome: &VariantOutcome) -> Self {
        Self {
            run_id,
            variant_index: outcome.index as i32,
            state: outcome.state.as_str().to_string(),
            attempts: outcome.attempts as i32,
            copy_json: outcome
                .copy
                .as_ref()
                .and_then(|copy| serde_json::to_value(copy).ok()),
            prompt_text: outcome.prompt.clone(),
            negative_prompt: outcome.negative_prompt.clone(),
            image_url: outcome.image_ref.clone(),
            qc_passed: outcome.qc.as_ref().is_some_and(|qc| qc.passed),
            qc_score: outcome.qc.as_ref().map(|qc| qc.score),
            qc_text: outcome.qc.as_ref().map(|qc| qc.rationale.clone()),
            error: outcome.error.clone(),
            started_at: outcome.started_at,
            finished_at: outcome.finished_at,
        }
    }
}

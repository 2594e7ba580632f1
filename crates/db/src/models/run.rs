//! Creative run models.

use serde::Serialize;
use sqlx::FromRow;

use flyerforge_core::types::{DbId, Timestamp};

/// A row from the `creative_runs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CreativeRun {
    pub id: DbId,
    pub campaign_id: Option<DbId>,
    /// One of `RUNNING`, `SUCCEEDED`, `FAILED`.
    pub status: String,
    /// Snapshot of the normalized brief.
    pub brief_json: serde_json::Value,
    /// Model and backend identifiers used by this run.
    pub model_versions_json: serde_json::Value,
    /// Derived brand style, written incrementally when available.
    pub brand_style_json: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Fields for inserting a new run row.
#[derive(Debug, Clone)]
pub struct CreateRun {
    pub campaign_id: Option<DbId>,
    pub brief_json: serde_json::Value,
    pub model_versions_json: serde_json::Value,
}

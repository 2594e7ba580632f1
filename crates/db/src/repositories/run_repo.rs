//! Repository for the `creative_runs` table.

use sqlx::PgPool;

use flyerforge_core::types::DbId;

use crate::models::run::{CreateRun, CreativeRun};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, campaign_id, status, brief_json, model_versions_json, \
    brand_style_json, error, created_at, updated_at";

/// Provides CRUD operations for creative runs.
pub struct RunRepo;

impl RunRepo {
    /// Insert a new run in `RUNNING` status, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateRun) -> Result<CreativeRun, sqlx::Error> {
        let query = format!(
            "INSERT INTO creative_runs (campaign_id, status, brief_json, model_versions_json)
             VALUES ($1, 'RUNNING', $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CreativeRun>(&query)
            .bind(input.campaign_id)
            .bind(&input.brief_json)
            .bind(&input.model_versions_json)
            .fetch_one(pool)
            .await
    }

    /// Find a run by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<CreativeRun>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM creative_runs WHERE id = $1");
        sqlx::query_as::<_, CreativeRun>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Record the derived brand style on a running run.
    pub async fn update_style(
        pool: &PgPool,
        id: DbId,
        style_json: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE creative_runs SET brand_style_json = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(style_json)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Move a run to its terminal status. Guarded so a terminal run is
    /// never reopened or rewritten.
    pub async fn finish(
        pool: &PgPool,
        id: DbId,
        status: &str,
        error: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE creative_runs SET status = $2, error = $3, updated_at = NOW()
             WHERE id = $1 AND status = 'RUNNING'",
        )
        .bind(id)
        .bind(status)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

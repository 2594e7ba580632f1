//! Repository for the `creative_variants` table.

use sqlx::PgPool;

use flyerforge_core::types::DbId;

use crate::models::variant::{CreateVariant, CreativeVariant};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, run_id, variant_index, state, attempts, copy_json, prompt_text, \
    negative_prompt, image_url, qc_passed, qc_score, qc_text, error, started_at, finished_at, \
    created_at";

/// Provides CRUD operations for creative variants.
pub struct VariantRepo;

impl VariantRepo {
    /// Insert a variant row, returning it. `(run_id, variant_index)` is
    /// unique, so a duplicate insert surfaces as a database error.
    pub async fn insert(
        pool: &PgPool,
        input: &CreateVariant,
    ) -> Result<CreativeVariant, sqlx::Error> {
        let query = format!(
            "INSERT INTO creative_variants
                (run_id, variant_index, state, attempts, copy_json, prompt_text,
                 negative_prompt, image_url, qc_passed, qc_score, qc_text, error,
                 started_at, finished_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CreativeVariant>(&query)
            .bind(input.run_id)
            .bind(input.variant_index)
            .bind(&input.state)
            .bind(input.attempts)
            .bind(&input.copy_json)
            .bind(&input.prompt_text)
            .bind(&input.negative_prompt)
            .bind(&input.image_url)
            .bind(input.qc_passed)
            .bind(input.qc_score)
            .bind(&input.qc_text)
            .bind(&input.error)
            .bind(input.started_at)
            .bind(input.finished_at)
            .fetch_one(pool)
            .await
    }

    /// List a run's variants ordered by index.
    pub async fn list_by_run(
        pool: &PgPool,
        run_id: DbId,
    ) -> Result<Vec<CreativeVariant>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM creative_variants
             WHERE run_id = $1
             ORDER BY variant_index"
        );
        sqlx::query_as::<_, CreativeVariant>(&query)
            .bind(run_id)
            .fetch_all(pool)
            .await
    }

    /// Find one variant by its run and index.
    pub async fn find_by_run_and_index(
        pool: &PgPool,
        run_id: DbId,
        variant_index: i32,
    ) -> Result<Option<CreativeVariant>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM creative_variants
             WHERE run_id = $1 AND variant_index = $2"
        );
        sqlx::query_as::<_, CreativeVariant>(&query)
            .bind(run_id)
            .bind(variant_index)
            .fetch_optional(pool)
            .await
    }
}

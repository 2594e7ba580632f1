//! Repository for the `creative_assets` table.

use sqlx::PgPool;

use flyerforge_core::types::DbId;

use crate::models::asset::{CreateAsset, CreativeAsset};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str =
    "id, campaign_id, run_id, variant_id, image_path, copy_text, created_at, updated_at";

/// Provides CRUD operations for promoted assets.
pub struct AssetRepo;

impl AssetRepo {
    /// Insert a promoted asset, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateAsset) -> Result<CreativeAsset, sqlx::Error> {
        let query = format!(
            "INSERT INTO creative_assets (campaign_id, run_id, variant_id, image_path, copy_text)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CreativeAsset>(&query)
            .bind(input.campaign_id)
            .bind(input.run_id)
            .bind(input.variant_id)
            .bind(&input.image_path)
            .bind(&input.copy_text)
            .fetch_one(pool)
            .await
    }

    /// List a campaign's assets, newest first.
    pub async fn list_by_campaign(
        pool: &PgPool,
        campaign_id: DbId,
    ) -> Result<Vec<CreativeAsset>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM creative_assets
             WHERE campaign_id = $1
             ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, CreativeAsset>(&query)
            .bind(campaign_id)
            .fetch_all(pool)
            .await
    }

    /// Re-point an asset at a different variant after operator
    /// re-selection. The only mutation assets ever receive.
    pub async fn reselect(
        pool: &PgPool,
        id: DbId,
        variant_id: DbId,
        image_path: &str,
        copy_text: Option<&str>,
    ) -> Result<Option<CreativeAsset>, sqlx::Error> {
        let query = format!(
            "UPDATE creative_assets
             SET variant_id = $2, image_path = $3, copy_text = $4, updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CreativeAsset>(&query)
            .bind(id)
            .bind(variant_id)
            .bind(image_path)
            .bind(copy_text)
            .fetch_optional(pool)
            .await
    }
}

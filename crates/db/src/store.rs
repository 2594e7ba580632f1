//! Postgres implementation of the engine's store contract.

use async_trait::async_trait;
use sqlx::PgPool;

use flyerforge_core::brand::BrandStyle;
use flyerforge_core::brief::Brief;
use flyerforge_core::error::EngineError;
use flyerforge_core::state::RunStatus;
use flyerforge_core::types::DbId;
use flyerforge_engine::store::RunStore;
use flyerforge_engine::variant::VariantOutcome;

use crate::models::asset::CreateAsset;
use crate::models::run::CreateRun;
use crate::models::variant::CreateVariant;
use crate::repositories::{AssetRepo, RunRepo, VariantRepo};

/// [`RunStore`] backed by the relational schema.
pub struct PgRunStore {
    pool: PgPool,
    campaign_id: Option<DbId>,
}

impl PgRunStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            campaign_id: None,
        }
    }

    /// Associate created runs with a campaign.
    pub fn with_campaign(mut self, campaign_id: DbId) -> Self {
        self.campaign_id = Some(campaign_id);
        self
    }
}

fn db_err(e: sqlx::Error) -> EngineError {
    EngineError::Persistence(e.to_string())
}

fn json_err(e: serde_json::Error) -> EngineError {
    EngineError::Persistence(e.to_string())
}

#[async_trait]
impl RunStore for PgRunStore {
    async fn create_run(
        &self,
        brief: &Brief,
        model_versions: &serde_json::Value,
    ) -> Result<DbId, EngineError> {
        let input = CreateRun {
            campaign_id: self.campaign_id,
            brief_json: serde_json::to_value(brief).map_err(json_err)?,
            model_versions_json: model_versions.clone(),
        };
        let run = RunRepo::create(&self.pool, &input).await.map_err(db_err)?;
        Ok(run.id)
    }

    async fn record_style(&self, run_id: DbId, style: &BrandStyle) -> Result<(), EngineError> {
        let style_json = serde_json::to_value(style).map_err(json_err)?;
        RunRepo::update_style(&self.pool, run_id, &style_json)
            .await
            .map_err(db_err)
    }

    async fn complete_run(
        &self,
        run_id: DbId,
        status: RunStatus,
        error: Option<&str>,
        variants: &[VariantOutcome],
    ) -> Result<(), EngineError> {
        for outcome in variants {
            let input = CreateVariant::from_outcome(run_id, outcome);
            VariantRepo::insert(&self.pool, &input)
                .await
                .map_err(db_err)?;
        }
        let finished = RunRepo::finish(&self.pool, run_id, status.as_str(), error)
            .await
            .map_err(db_err)?;
        if !finished {
            return Err(EngineError::Internal(format!(
                "run {run_id} was already in a terminal status"
            )));
        }
        tracing::info!(
            run_id,
            status = status.as_str(),
            variants = variants.len(),
            "Run state persisted",
        );
        Ok(())
    }

    async fn create_asset(
        &self,
        campaign_id: DbId,
        run_id: DbId,
        variant_index: u32,
        image_ref: &str,
        copy_text: &str,
    ) -> Result<DbId, EngineError> {
        let variant = VariantRepo::find_by_run_and_index(&self.pool, run_id, variant_index as i32)
            .await
            .map_err(db_err)?
            .ok_or(EngineError::NotFound {
                entity: "variant",
                id: variant_index as DbId,
            })?;
        let input = CreateAsset {
            campaign_id,
            run_id: Some(run_id),
            variant_id: Some(variant.id),
            image_path: image_ref.to_string(),
            copy_text: (!copy_text.is_empty()).then(|| copy_text.to_string()),
        };
        let asset = AssetRepo::create(&self.pool, &input)
            .await
            .map_err(db_err)?;
        Ok(asset.id)
    }
}

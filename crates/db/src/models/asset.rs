//! Promoted asset models.

use serde::Serialize;
use sqlx::FromRow;

use flyerforge_core::types::{DbId, Timestamp};

/// A row from the `creative_assets` table.
///
/// Scoped to a campaign rather than a run; immutable after creation
/// except for re-selection of its variant reference.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CreativeAsset {
    pub id: DbId,
    pub campaign_id: DbId,
    pub run_id: Option<DbId>,
    pub variant_id: Option<DbId>,
    pub image_path: String,
    pub copy_text: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Fields for inserting an asset row.
#[derive(Debug, Clone)]
pub struct CreateAsset {
    pub campaign_id: DbId,
    pub run_id: Option<DbId>,
    pub variant_id: Option<DbId>,
    pub image_path: String,
    pub copy_text: Option<String>,
}

//! Persistence and storage collaborator seams.
//!
//! The engine is write-mostly: a run row at start, variants plus the
//! run update exactly once at completion, zero or one asset on
//! promotion. [`RunStore`] is that contract; [`ImageStore`] is the
//! object-storage contract (bytes in, opaque reference out). The
//! in-memory implementations back tests and persistence-disabled runs;
//! the Postgres implementation lives in `flyerforge-db`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use flyerforge_core::brand::BrandStyle;
use flyerforge_core::brief::Brief;
use flyerforge_core::error::EngineError;
use flyerforge_core::state::RunStatus;
use flyerforge_core::types::DbId;

use crate::variant::VariantOutcome;

/// The relational persistence collaborator.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Insert the run row at run start, returning its id.
    async fn create_run(
        &self,
        brief: &Brief,
        model_versions: &serde_json::Value,
    ) -> Result<DbId, EngineError>;

    /// Optional incremental write of the derived brand style; purely
    /// for observability, not required for correctness.
    async fn record_style(&self, run_id: DbId, style: &BrandStyle) -> Result<(), EngineError>;

    /// Write every variant and the terminal run state. Called exactly
    /// once per run.
    async fn complete_run(
        &self,
        run_id: DbId,
        status: RunStatus,
        error: Option<&str>,
        variants: &[VariantOutcome],
    ) -> Result<(), EngineError>;

    /// Promote a variant to a durable campaign asset, returning the
    /// asset id.
    async fn create_asset(
        &self,
        campaign_id: DbId,
        run_id: DbId,
        variant_index: u32,
        image_ref: &str,
        copy_text: &str,
    ) -> Result<DbId, EngineError>;
}

/// The object/file storage collaborator.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Store an image buffer under a logical key, returning a stable
    /// opaque reference.
    async fn put_image(&self, key: &str, bytes: &[u8]) -> Result<String, EngineError>;
}

/// Logical storage key for a variant's image.
pub fn image_key(run_id: DbId, variant_index: u32) -> String {
    format!("runs/{run_id}/variant_{variant_index:02}.png")
}

// ---------------------------------------------------------------------------
// In-memory run store
// ---------------------------------------------------------------------------

/// A run as the memory store recorded it. Exposed for assertions in
/// tests and for summary output in persistence-disabled runs.
#[derive(Debug, Clone)]
pub struct StoredRun {
    pub id: DbId,
    pub brief: serde_json::Value,
    pub model_versions: serde_json::Value,
    pub style: Option<BrandStyle>,
    pub status: RunStatus,
    pub error: Option<String>,
    pub variants: Vec<VariantOutcome>,
    /// How many times `complete_run` was called; must end at 1.
    pub completion_writes: u32,
}

/// A promoted asset as the memory store recorded it.
#[derive(Debug, Clone)]
pub struct StoredAsset {
    pub id: DbId,
    pub campaign_id: DbId,
    pub run_id: DbId,
    pub variant_index: u32,
    pub image_ref: String,
    pub copy_text: String,
}

#[derive(Default)]
struct MemoryState {
    next_id: DbId,
    runs: HashMap<DbId, StoredRun>,
    assets: Vec<StoredAsset>,
}

/// In-memory [`RunStore`] for tests and persistence-disabled runs.
#[derive(Default)]
pub struct MemoryRunStore {
    state: Mutex<MemoryState>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(&self, run_id: DbId) -> Option<StoredRun> {
        self.state.lock().unwrap().runs.get(&run_id).cloned()
    }

    pub fn assets(&self) -> Vec<StoredAsset> {
        self.state.lock().unwrap().assets.clone()
    }

    pub fn run_count(&self) -> usize {
        self.state.lock().unwrap().runs.len()
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn create_run(
        &self,
        brief: &Brief,
        model_versions: &serde_json::Value,
    ) -> Result<DbId, EngineError> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.runs.insert(
            id,
            StoredRun {
                id,
                brief: serde_json::to_value(brief)
                    .map_err(|e| EngineError::Persistence(e.to_string()))?,
                model_versions: model_versions.clone(),
                style: None,
                status: RunStatus::Running,
                error: None,
                variants: Vec::new(),
                completion_writes: 0,
            },
        );
        Ok(id)
    }

    async fn record_style(&self, run_id: DbId, style: &BrandStyle) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        let run = state.runs.get_mut(&run_id).ok_or(EngineError::NotFound {
            entity: "run",
            id: run_id,
        })?;
        run.style = Some(style.clone());
        Ok(())
    }

    async fn complete_run(
        &self,
        run_id: DbId,
        status: RunStatus,
        error: Option<&str>,
        variants: &[VariantOutcome],
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        let run = state.runs.get_mut(&run_id).ok_or(EngineError::NotFound {
            entity: "run",
            id: run_id,
        })?;
        run.status = run.status.finish(status)?;
        run.error = error.map(str::to_string);
        run.variants = variants.to_vec();
        run.completion_writes += 1;
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
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.assets.push(StoredAsset {
            id,
            campaign_id,
            run_id,
            variant_index,
            image_ref: image_ref.to_string(),
            copy_text: copy_text.to_string(),
        });
        Ok(id)
    }
}

// ---------------------------------------------------------------------------
// Image stores
// ---------------------------------------------------------------------------

/// Filesystem-backed [`ImageStore`]; the returned reference is the
/// written path.
pub struct LocalImageStore {
    root: PathBuf,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn put_image(&self, key: &str, bytes: &[u8]) -> Result<String, EngineError> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| EngineError::Storage(e.to_string()))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| EngineError::Storage(e.to_string()))?;
        Ok(path.display().to_string())
    }
}

/// In-memory [`ImageStore`] for tests.
#[derive(Default)]
pub struct MemoryImageStore {
    images: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image(&self, key: &str) -> Option<Vec<u8>> {
        self.images.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.images.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn put_image(&self, key: &str, bytes: &[u8]) -> Result<String, EngineError> {
        self.images
            .lock()
            .unwrap()
            .insert(key.to_string(), bytes.to_vec());
        Ok(format!("mem://{key}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use flyerforge_core::brief::{normalize, BusinessDetails, RawBrief};

    fn brief() -> Brief {
        normalize(RawBrief {
            business: BusinessDetails {
                name: "Acme HVAC".into(),
                address: None,
                city: None,
                state: None,
                postal_code: None,
                phone: None,
                website: None,
                service_area: None,
                hours: None,
            },
            product: "Furnace tune-up".into(),
            offer: "$79 special".into(),
            tone: None,
            cta: None,
            audience: None,
            size: "6x9".into(),
            constraints: vec![],
            brand_colors: vec![],
            style_keywords: vec![],
            reference_images: vec![],
        })
        .unwrap()
    }

    #[tokio::test]
    async fn memory_store_round_trips_a_run() {
        let store = MemoryRunStore::new();
        let id = store
            .create_run(&brief(), &serde_json::json!({"text_model": "m"}))
            .await
            .unwrap();
        store
            .complete_run(id, RunStatus::Succeeded, None, &[])
            .await
            .unwrap();
        let run = store.run(id).unwrap();
        assert_eq!(run.status, RunStatus::Succeeded);
        assert_eq!(run.completion_writes, 1);
    }

    #[tokio::test]
    async fn completing_twice_is_rejected() {
        let store = MemoryRunStore::new();
        let id = store
            .create_run(&brief(), &serde_json::json!({}))
            .await
            .unwrap();
        store
            .complete_run(id, RunStatus::Failed, Some("boom"), &[])
            .await
            .unwrap();
        assert_matches!(
            store.complete_run(id, RunStatus::Succeeded, None, &[]).await,
            Err(EngineError::Internal(_))
        );
    }

    #[tokio::test]
    async fn memory_image_store_returns_opaque_ref() {
        let store = MemoryImageStore::new();
        let key = image_key(7, 2);
        assert_eq!(key, "runs/7/variant_02.png");
        let reference = store.put_image(&key, b"png-bytes").await.unwrap();
        assert_eq!(reference, "mem://runs/7/variant_02.png");
        assert_eq!(store.image(&key).unwrap(), b"png-bytes");
    }
}

mod asset_repo;
mod run_repo;
mod variant_repo;

pub use asset_repo::AssetRepo;
pub use run_repo::RunRepo;
pub use variant_repo::VariantRepo;

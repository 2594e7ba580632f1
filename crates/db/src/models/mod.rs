pub mod asset;
pub mod run;
pub mod variant;

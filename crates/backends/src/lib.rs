//! Model and image backend clients.
//!
//! One capability trait per role -- [`text::TextGenerator`],
//! [`vision::QualityInspector`], [`image::ImageBackend`] -- with one
//! implementation per concrete backend. Backend selection is resolved
//! once from configuration at run setup, never per call.

pub mod chat;
pub mod cli;
pub mod diffusion;
pub mod health;
pub mod hosted;
pub mod image;
pub mod provider;
pub mod text;
pub mod vision;
pub mod workflow;

//! Workflow-compositor support.
//!
//! The workflow compositor is the one image backend that synthesizes a
//! background *and* typesets the flyer copy in a single call, driven by
//! a JSON node-graph template. This crate provides the placeholder
//! substitution engine that turns a template into a concrete workflow
//! document, and the submit-and-poll HTTP client that executes it.

pub mod api;
pub mod template;

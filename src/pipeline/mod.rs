//! Tender drafting pipeline: context assembly, generation stages, stage
//! gating and export.

pub mod context;
pub mod export;
pub mod generator;
pub mod operations;
pub mod prompts;
pub mod workflow;

pub use operations::{EditorActionInput, Pipeline, WorkPackageView};

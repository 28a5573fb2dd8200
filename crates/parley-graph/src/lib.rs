//! Graph payload pipeline for Parley.
//!
//! Turns loosely-typed answering-service responses into canonical chart
//! configurations in three gated steps:
//!
//! 1. [`extract`] locates a graph payload wherever it is embedded.
//! 2. [`validate`] confirms a candidate satisfies the minimal chart contract.
//! 3. [`normalize`] builds a theme-aware [`ChartConfig`](parley_core::ChartConfig).
//!
//! [`render`] re-checks a stored config before it reaches a chart renderer and
//! picks the table fallback when the numeric series is unusable.

pub mod error;
pub mod extract;
pub mod normalize;
pub mod palette;
pub mod pipeline;
pub mod render;
pub mod validate;

pub use error::GraphValidationError;
pub use extract::{extract, Extraction, ExtractionSource, RawGraphCandidate};
pub use normalize::{normalize, retheme};
pub use pipeline::{resolve, GraphOutcome};
pub use render::{plan, DataTable, RenderPlan};
pub use validate::{check, validate, ValidatedGraph};

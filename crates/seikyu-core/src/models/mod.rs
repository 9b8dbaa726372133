//! Data models: configuration and extraction results.

pub mod config;
pub mod result;

pub use config::{AmountPatternSpec, ExtractorConfig, ScoreWeights};
pub use result::{Alternative, CandidateSource, ExtractionContext, ExtractionResult};

//! Text normalization and mojibake recovery.

pub mod normalize;
pub mod readable;

pub use normalize::normalize;
pub use readable::{extract_readable, ReadableText};

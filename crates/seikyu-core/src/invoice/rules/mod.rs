//! Rule-based field extractors for Japanese invoices.

pub mod amount;
pub mod customer;
pub mod patterns;

pub use amount::{extract_amount, extract_amount_paged, AmountExtractor};
pub use customer::{extract_customer, mask_name, CustomerExtractor};
pub use patterns::*;

use crate::models::result::CandidateSource;

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the best-scoring field from text.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract all surviving candidates, best first.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// A monetary candidate awaiting scoring and filtering.
#[derive(Debug, Clone)]
pub struct AmountCandidate {
    /// Parsed integer value in yen.
    pub value: i64,
    /// Priority of the pattern family that produced it (0 = strongest).
    pub pattern_priority: u8,
    /// ±40-character window around the match.
    pub context_window: String,
    /// Byte span of the numeric literal in its source text.
    pub span: (usize, usize),
    /// Candidate sits in the bottom 20% of its page.
    pub bottom: bool,
    /// Candidate sits on the last page of a multi-page document.
    pub last_page: bool,
    /// A currency sign appears within ±5 characters.
    pub has_currency_symbol: bool,
    /// Value was synthesized from a mojibake-damaged literal.
    pub recovered: bool,
    /// Final score after context adjustments.
    pub score: i32,
}

/// An addressee candidate awaiting selection.
#[derive(Debug, Clone)]
pub struct CustomerCandidate {
    /// Canonical name without honorific suffix.
    pub name: String,
    /// Mining score.
    pub score: i32,
    /// Where the candidate came from.
    pub source: CandidateSource,
    /// Byte offset of the first occurrence, for stable tie-breaking.
    pub position: usize,
}

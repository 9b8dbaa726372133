//! Core library for Japanese invoice field extraction.
//!
//! Given a noisy, typically OCR-derived block of Japanese invoice text (and
//! optionally a filename), this crate extracts:
//! - the billed amount as an integer number of yen, and
//! - the addressee as a display string suffixed with 様 (or 御中 for
//!   organizations).
//!
//! The crate performs no I/O: PDF conversion, OCR, and whatever is done with
//! the result are the caller's concern. Extraction never fails hard; a field
//! that cannot be determined comes back as `None`.

pub mod error;
pub mod invoice;
pub mod models;
pub mod text;

pub use error::{ExtractionError, Result, SeikyuError};
pub use invoice::{CacheEntry, InvoiceFieldExtractor, StructuredEntry};
pub use invoice::rules::{
    extract_amount, extract_amount_paged, extract_customer, AmountExtractor, CustomerExtractor,
    FieldExtractor,
};
pub use models::config::{AmountPatternSpec, ExtractorConfig, ScoreWeights};
pub use models::result::{Alternative, CandidateSource, ExtractionContext, ExtractionResult};
pub use text::{extract_readable, normalize, ReadableText};

//! Result types returned by the extraction coordinator.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Combined result of one extraction call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Addressee display string, suffixed with 様 (or 御中 for corporate
    /// matches). `None` when no plausible name was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,

    /// Billed amount in yen. `None` when no plausible amount was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,

    /// How the result was produced.
    pub context: ExtractionContext,
}

impl ExtractionResult {
    /// An empty result with the given method tag.
    pub fn empty(method: impl Into<String>) -> Self {
        Self {
            customer: None,
            amount: None,
            context: ExtractionContext::new(method),
        }
    }
}

/// Diagnostic context attached to every result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionContext {
    /// Text path the extractors ran on: `normalized`, `recovered`, `cache`,
    /// or `empty`.
    pub method: String,

    /// Free-form diagnostics (readable ratio, candidate counts, sources).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub notes: HashMap<String, String>,
}

impl ExtractionContext {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            notes: HashMap::new(),
        }
    }

    pub fn note(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.notes.insert(key.into(), value.into());
    }
}

/// A runner-up customer candidate, retained for `get_alternatives`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alternative {
    /// Candidate name without honorific suffix.
    pub name: String,

    /// Privacy-masked form, absent for corporate names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub masked: Option<String>,

    /// Score the candidate reached during mining.
    pub score: i32,

    /// Where the candidate came from.
    pub source: CandidateSource,
}

/// Origin of a customer candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    /// Generic text mining (labels, runs, postal-adjacent lines).
    Text,
    /// Derived from the filename.
    Filename,
    /// 様-suffixed honorific match.
    SamaPattern,
    /// Corporate 御中 match.
    OnchuPattern,
}

impl CandidateSource {
    /// Stable tag for logs and notes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Filename => "filename",
            Self::SamaPattern => "sama_pattern",
            Self::OnchuPattern => "onchu_pattern",
        }
    }
}

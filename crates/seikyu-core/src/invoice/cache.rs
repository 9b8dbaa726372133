//! Process-local cache entries for repeated extraction calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::result::Alternative;

/// One cache entry, keyed by filename or a short text hash.
///
/// Two shapes circulate: the legacy bare customer string, and the structured
/// form carrying the masked name, the amount, and runner-up candidates.
/// Deserialization accepts both; callers branch through the accessors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CacheEntry {
    /// Legacy form: the customer display string alone.
    Legacy(String),
    /// Structured form.
    Structured(StructuredEntry),
}

/// Structured cache payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredEntry {
    /// Customer display string, honorific applied.
    pub name: Option<String>,

    /// Privacy-masked form of the name, absent for corporate names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub masked: Option<String>,

    /// Billed amount in yen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,

    /// Runner-up customer candidates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<Alternative>,

    /// When the entry was stored.
    pub timestamp: DateTime<Utc>,
}

impl CacheEntry {
    /// Customer display string, regardless of shape.
    pub fn customer(&self) -> Option<&str> {
        match self {
            Self::Legacy(name) => Some(name.as_str()),
            Self::Structured(entry) => entry.name.as_deref(),
        }
    }

    /// Cached amount; legacy entries carry none.
    pub fn amount(&self) -> Option<i64> {
        match self {
            Self::Legacy(_) => None,
            Self::Structured(entry) => entry.amount,
        }
    }

    /// Runner-up candidates; legacy entries carry none.
    pub fn alternatives(&self) -> &[Alternative] {
        match self {
            Self::Legacy(_) => &[],
            Self::Structured(entry) => &entry.alternatives,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_legacy_entry_accessors() {
        let entry = CacheEntry::Legacy("山口 大輝様".to_string());
        assert_eq!(entry.customer(), Some("山口 大輝様"));
        assert_eq!(entry.amount(), None);
        assert!(entry.alternatives().is_empty());
    }

    #[test]
    fn test_untagged_deserialization_accepts_both_shapes() {
        let legacy: CacheEntry = serde_json::from_str(r#""テスト商事様""#).unwrap();
        assert!(matches!(legacy, CacheEntry::Legacy(_)));

        let structured: CacheEntry = serde_json::from_str(
            r#"{"name":"テスト商事様","amount":5500,"timestamp":"2024-07-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(structured.customer(), Some("テスト商事様"));
        assert_eq!(structured.amount(), Some(5500));
    }
}

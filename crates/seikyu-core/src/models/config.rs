//! Configuration structures for the extraction core.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Configuration for the extraction core.
///
/// Everything defaults to the built-in tables; overrides exist so that
/// pattern and weight tuning stays a data change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Filename substring → display name, used by the filename fallback.
    pub customer_mapping: HashMap<String, String>,

    /// Permit pure-ASCII alphanumeric candidates when the source is the
    /// filename.
    pub allow_alphanumeric_from_filename: bool,

    /// Override of the amount pattern table. Entries are compiled at
    /// construction; an invalid regex is a configuration error.
    pub patterns: Option<Vec<AmountPatternSpec>>,

    /// Override of the monetary-label blacklist.
    pub blacklist: Option<Vec<String>>,

    /// Score adjustment table for amount candidates.
    pub weights: ScoreWeights,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            customer_mapping: HashMap::new(),
            allow_alphanumeric_from_filename: true,
            patterns: None,
            blacklist: None,
            weights: ScoreWeights::default(),
        }
    }
}

impl ExtractorConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Replace the customer mapping from a JSON object string.
    ///
    /// The mapping may travel as an encrypted blob; decryption is the
    /// caller's responsibility and this only parses the plaintext JSON.
    pub fn customer_mapping_from_json(&mut self, json: &str) -> Result<()> {
        self.customer_mapping = serde_json::from_str(json)?;
        Ok(())
    }
}

/// One amount pattern in an overridden table.
///
/// The regex must contain a single capture group holding the numeric
/// literal. Priority 0 is the strongest family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmountPatternSpec {
    pub regex: String,
    pub priority: u8,
}

/// Context-window score adjustments for amount candidates.
///
/// The exact numbers are tunable; what matters is the ordering they induce
/// (label-anchored beats currency-anchored beats bare, and billed/total
/// labels beat per-line-item context).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    /// ご請求額 / ご請求金額 in the window.
    pub billed_label: i32,
    /// 請求額 / 請求金額 in the window (without the ご prefix).
    pub invoice_label: i32,
    /// 合計 within ±20 characters.
    pub total_label: i32,
    /// 総額 in the window.
    pub gross_label: i32,
    /// 金額 within ±20 characters.
    pub amount_label: i32,
    /// お支払 in the window.
    pub payment_label: i32,
    /// ¥ / ￥ within ±5 characters.
    pub currency_nearby: i32,
    /// 円 within 5 characters after the match.
    pub yen_suffix: i32,
    /// Candidate below 1000 yen.
    pub small_value_penalty: i32,
    /// Round multiple of 1000 with no 合計 nearby.
    pub round_thousand_penalty: i32,
    /// Per-line-item keyword in the window with no 合計 nearby.
    pub line_item_penalty: i32,
    /// Postal/recipient/phone/date shape in the window, candidate itself not
    /// excluded.
    pub lookalike_penalty: i32,
    /// Value synthesized from a mojibake-damaged literal.
    pub recovered_penalty: i32,
    /// Candidate sits on the last page of a multi-page document.
    pub last_page_bonus: i32,
    /// Candidate sits in the bottom 20% of its page.
    pub bottom_bonus: i32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            billed_label: 12,
            invoice_label: 8,
            total_label: 4,
            gross_label: 3,
            amount_label: 2,
            payment_label: 6,
            currency_nearby: 3,
            yen_suffix: 1,
            small_value_penalty: -2,
            round_thousand_penalty: -1,
            line_item_penalty: -5,
            lookalike_penalty: -8,
            recovered_penalty: -6,
            last_page_bonus: 2,
            bottom_bonus: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config_roundtrip() {
        let config = ExtractorConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: ExtractorConfig = serde_json::from_str(&json).unwrap();

        assert!(back.allow_alphanumeric_from_filename);
        assert!(back.patterns.is_none());
        assert_eq!(back.weights.billed_label, 12);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ExtractorConfig =
            serde_json::from_str(r#"{"allow_alphanumeric_from_filename": false}"#).unwrap();

        assert!(!config.allow_alphanumeric_from_filename);
        assert_eq!(config.weights.line_item_penalty, -5);
    }

    #[test]
    fn test_customer_mapping_from_json() {
        let mut config = ExtractorConfig::default();
        config
            .customer_mapping_from_json(r#"{"YORUTOKO": "ヨルトコ"}"#)
            .unwrap();

        assert_eq!(config.customer_mapping["YORUTOKO"], "ヨルトコ");
    }

    #[test]
    fn test_customer_mapping_rejects_bad_json() {
        let mut config = ExtractorConfig::default();
        assert!(config.customer_mapping_from_json("not json").is_err());
    }
}

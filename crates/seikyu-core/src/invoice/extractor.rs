//! Extraction coordinator: wires the normalizer and the field extractors,
//! fronted by a process-local cache.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{ExtractionError, Result, SeikyuError};
use crate::models::config::ExtractorConfig;
use crate::models::result::{Alternative, ExtractionContext, ExtractionResult};
use crate::text::{extract_readable, normalize};

use super::cache::{CacheEntry, StructuredEntry};
use super::rules::customer::{apply_honorific, mask_name};
use super::rules::{AmountExtractor, CustomerExtractor};

/// Below this readability ratio the recovered text is used instead of the
/// normalized text.
const RECOVERY_THRESHOLD: f64 = 0.5;

/// Below this ratio the input is considered unreadable; extraction still
/// proceeds on whatever was recovered.
const UNREADABLE_THRESHOLD: f64 = 0.3;

/// Coordinator for invoice field extraction.
///
/// Pure over `(text, filename)` apart from the cache; all failures degrade
/// to `None` for the affected field.
pub struct InvoiceFieldExtractor {
    config: ExtractorConfig,
    compiled_patterns: Option<Vec<(u8, Regex)>>,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl InvoiceFieldExtractor {
    /// Create a coordinator with default configuration.
    pub fn new() -> Self {
        Self {
            config: ExtractorConfig::default(),
            compiled_patterns: None,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Create a coordinator from a configuration, compiling any pattern
    /// overrides.
    pub fn with_config(config: ExtractorConfig) -> Result<Self> {
        let compiled_patterns = match &config.patterns {
            Some(specs) => {
                let mut table = Vec::with_capacity(specs.len());
                for spec in specs {
                    let re = Regex::new(&spec.regex)?;
                    if re.captures_len() < 2 {
                        return Err(SeikyuError::Config(format!(
                            "amount pattern {:?} has no capture group",
                            spec.regex
                        )));
                    }
                    table.push((spec.priority, re));
                }
                table.sort_by_key(|(priority, _)| *priority);
                Some(table)
            }
            None => None,
        };

        Ok(Self {
            config,
            compiled_patterns,
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn amount_extractor(&self) -> AmountExtractor {
        let extractor = AmountExtractor::new().with_weights(self.config.weights.clone());
        match &self.compiled_patterns {
            Some(table) => extractor.with_patterns(table.clone()),
            None => extractor,
        }
    }

    fn customer_extractor(&self) -> CustomerExtractor {
        let extractor = CustomerExtractor::new()
            .with_mapping(self.config.customer_mapping.clone())
            .with_allow_alphanumeric(self.config.allow_alphanumeric_from_filename);
        match &self.config.blacklist {
            Some(list) => extractor.with_blacklist(list.clone()),
            None => extractor,
        }
    }

    /// Extract customer and amount from one document.
    pub fn extract(
        &self,
        text: &str,
        filename: Option<&str>,
        force_refresh: bool,
    ) -> ExtractionResult {
        if text.trim().is_empty() {
            let mut result = ExtractionResult::empty("empty");
            result
                .context
                .note("error", ExtractionError::EmptyInput.to_string());
            return result;
        }

        let key = cache_key(text, filename);

        if !force_refresh {
            let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            match cache.get(&key) {
                Some(CacheEntry::Structured(entry)) => {
                    debug!(key = key.as_str(), "cache hit");
                    let mut context = ExtractionContext::new("cache");
                    context.note("cache_key", key.clone());
                    return ExtractionResult {
                        customer: entry.name.clone(),
                        amount: entry.amount,
                        context,
                    };
                }
                Some(CacheEntry::Legacy(name)) => {
                    // Legacy entries carry no amount: serve the customer,
                    // recompute the amount, and upgrade the entry in place.
                    debug!(key = key.as_str(), "legacy cache hit, upgrading");
                    let name = name.clone();
                    drop(cache);
                    let (mut result, alternatives) = self.compute(text, filename);
                    result.customer = Some(name);
                    result.context.note("cache", "legacy_upgraded");
                    self.store(&key, &result, alternatives);
                    return result;
                }
                None => {}
            }
        }

        let (result, alternatives) = self.compute(text, filename);
        self.store(&key, &result, alternatives);
        result
    }

    /// Extract the billed amount only. Not cached.
    pub fn extract_amount(&self, text: &str, page_index: usize, page_count: usize) -> Option<i64> {
        let chosen = self.choose_text(text).0;
        self.amount_extractor()
            .with_page(page_index, page_count)
            .candidates(&chosen)
            .first()
            .map(|c| c.value)
    }

    /// Extract the customer only, sharing the coordinator cache.
    pub fn extract_customer(
        &self,
        text: &str,
        filename: Option<&str>,
        force_refresh: bool,
    ) -> Option<String> {
        self.extract(text, filename, force_refresh).customer
    }

    /// Empty the process-local cache.
    pub fn clear_cache(&self) {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        info!("extraction cache cleared");
    }

    /// Runner-up customer candidates stored for a cache key.
    pub fn get_alternatives(&self, cache_key: &str) -> Vec<Alternative> {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(cache_key)
            .map(|entry| entry.alternatives().to_vec())
            .unwrap_or_default()
    }

    /// Insert a pre-existing entry, legacy or structured. Whole-entry
    /// replacement; concurrent readers never observe a partial write.
    pub fn seed_cache(&self, key: impl Into<String>, entry: CacheEntry) {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into(), entry);
    }

    /// The cache key `extract` uses for this input.
    pub fn cache_key_for(&self, text: &str, filename: Option<&str>) -> String {
        cache_key(text, filename)
    }

    fn choose_text(&self, text: &str) -> (String, &'static str, f64) {
        let readable = extract_readable(text);
        if readable.readable_ratio < RECOVERY_THRESHOLD {
            (readable.text, "recovered", readable.readable_ratio)
        } else {
            (normalize(text), "normalized", readable.readable_ratio)
        }
    }

    fn compute(&self, text: &str, filename: Option<&str>) -> (ExtractionResult, Vec<Alternative>) {
        let (chosen, method, ratio) = self.choose_text(text);
        if ratio < UNREADABLE_THRESHOLD {
            warn!(ratio, "input barely readable, proceeding on recovered text");
        }

        let customer_cands = self.customer_extractor().candidates(&chosen, filename);
        let customer = customer_cands
            .first()
            .map(|c| apply_honorific(&c.name, c.source));
        let alternatives: Vec<Alternative> = customer_cands
            .iter()
            .skip(1)
            .take(3)
            .map(|c| Alternative {
                name: c.name.clone(),
                masked: mask_name(&c.name),
                score: c.score,
                source: c.source,
            })
            .collect();

        let amount_cands = self.amount_extractor().candidates(&chosen);
        let amount = amount_cands.first().map(|c| c.value);

        let mut context = ExtractionContext::new(method);
        context.note("readable_ratio", format!("{ratio:.2}"));
        context.note("amount_candidates", amount_cands.len().to_string());
        context.note("customer_candidates", customer_cands.len().to_string());
        if let Some(winner) = customer_cands.first() {
            context.note("customer_source", winner.source.as_str());
        }
        if let Some(best) = amount_cands.first() {
            context.note("amount_pattern_priority", best.pattern_priority.to_string());
        }
        if ratio < UNREADABLE_THRESHOLD {
            context.note("error", ExtractionError::UnreadableInput { ratio }.to_string());
        }

        info!(
            customer_len = customer.as_deref().map(|c| c.chars().count()).unwrap_or(0),
            amount = amount.unwrap_or(0),
            method,
            "extraction complete"
        );

        (
            ExtractionResult {
                customer,
                amount,
                context,
            },
            alternatives,
        )
    }

    fn store(&self, key: &str, result: &ExtractionResult, alternatives: Vec<Alternative>) {
        let masked = result
            .customer
            .as_deref()
            .and_then(|name| mask_name(name.trim_end_matches('様')));

        let entry = CacheEntry::Structured(StructuredEntry {
            name: result.customer.clone(),
            masked,
            amount: result.amount,
            alternatives,
            timestamp: Utc::now(),
        });

        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), entry);
    }
}

impl Default for InvoiceFieldExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Filename when present, otherwise a short hash of the first ~1 KB.
fn cache_key(text: &str, filename: Option<&str>) -> String {
    if let Some(name) = filename {
        if !name.is_empty() {
            return name.to_string();
        }
    }

    let mut end = text.len().min(1024);
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }

    let mut hasher = Sha256::new();
    hasher.update(text[..end].as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_canonical_invoice() {
        let extractor = InvoiceFieldExtractor::new();
        let result = extractor.extract("山口 大輝 様\n\nご請求金額 ¥12,800\n合計 ¥12,800\n", None, false);

        assert_eq!(result.customer.as_deref(), Some("山口 大輝様"));
        assert_eq!(result.amount, Some(12800));
    }

    #[test]
    fn test_postal_code_invoice() {
        let extractor = InvoiceFieldExtractor::new();
        let result = extractor.extract("〒700-0804\n株式会社テスト 御中\nご請求額 1,080円\n", None, false);

        assert_eq!(result.customer.as_deref(), Some("株式会社テスト御中"));
        assert_eq!(result.amount, Some(1080));
    }

    #[test]
    fn test_mojibake_invoice() {
        let extractor = InvoiceFieldExtractor::new();
        let result = extractor.extract(
            "\u{FFFD}\u{FFFD}客様 テスト商事 様\nご請求額 ¥5,500\n",
            None,
            false,
        );

        assert_eq!(result.customer.as_deref(), Some("テスト商事様"));
        assert_eq!(result.amount, Some(5500));
    }

    #[test]
    fn test_filename_fallback_invoice() {
        let extractor = InvoiceFieldExtractor::new();
        let result = extractor.extract("ご請求額 3,300円\n", Some("AcmeCorp_invoice_2024.pdf"), false);

        assert_eq!(result.customer.as_deref(), Some("AcmeCorp様"));
        assert_eq!(result.amount, Some(3300));
    }

    #[test]
    fn test_line_item_invoice() {
        let extractor = InvoiceFieldExtractor::new();
        let result = extractor.extract(
            "おやつ 500\n教材費 1,200\n合計 1,700 円\n鈴木 一郎 様\n",
            None,
            false,
        );

        assert_eq!(result.customer.as_deref(), Some("鈴木 一郎様"));
        assert_eq!(result.amount, Some(1700));
    }

    #[test]
    fn test_nothing_extractable() {
        let extractor = InvoiceFieldExtractor::new();
        let result = extractor.extract("Page 1 of 1\n", None, false);

        assert_eq!(result.customer, None);
        assert_eq!(result.amount, None);
    }

    #[test]
    fn test_empty_input() {
        let extractor = InvoiceFieldExtractor::new();
        let result = extractor.extract("   \n  ", None, false);

        assert_eq!(result.customer, None);
        assert_eq!(result.amount, None);
        assert_eq!(result.context.method, "empty");
    }

    #[test]
    fn test_repeated_extraction_is_stable() {
        let extractor = InvoiceFieldExtractor::new();
        let text = "山口 大輝 様\nご請求額 9,800円\n";

        let first = extractor.extract(text, None, false);
        let second = extractor.extract(text, None, false);

        assert_eq!(first.customer, second.customer);
        assert_eq!(first.amount, second.amount);
        assert_eq!(second.context.method, "cache");
    }

    #[test]
    fn test_force_refresh_ignores_cache() {
        let extractor = InvoiceFieldExtractor::new();
        let text = "鈴木 一郎 様\nご請求額 4,200円\n";
        let key = extractor.cache_key_for(text, None);

        extractor.seed_cache(key, CacheEntry::Legacy("偽物様".to_string()));
        let result = extractor.extract(text, None, true);

        assert_eq!(result.customer.as_deref(), Some("鈴木 一郎様"));
        assert_eq!(result.amount, Some(4200));
    }

    #[test]
    fn test_legacy_entry_served_and_upgraded() {
        let extractor = InvoiceFieldExtractor::new();
        let text = "ご請求額 4,200円\n";
        let key = extractor.cache_key_for(text, None);

        extractor.seed_cache(key.clone(), CacheEntry::Legacy("旧形式商店様".to_string()));
        let result = extractor.extract(text, None, false);

        // Customer from the legacy entry, amount recomputed.
        assert_eq!(result.customer.as_deref(), Some("旧形式商店様"));
        assert_eq!(result.amount, Some(4200));

        // Subsequent hits see the structured upgrade.
        let again = extractor.extract(text, None, false);
        assert_eq!(again.context.method, "cache");
        assert_eq!(again.customer.as_deref(), Some("旧形式商店様"));
        assert_eq!(again.amount, Some(4200));
    }

    #[test]
    fn test_alternatives_stored() {
        let extractor = InvoiceFieldExtractor::new();
        let text = "佐藤 様\n田中 様\nご請求額 1,500円\n";
        let key = extractor.cache_key_for(text, None);

        extractor.extract(text, None, false);
        let alts = extractor.get_alternatives(&key);

        assert!(!alts.is_empty());
        assert_eq!(alts[0].name, "田中");
    }

    #[test]
    fn test_clear_cache() {
        let extractor = InvoiceFieldExtractor::new();
        let text = "佐藤 様\nご請求額 1,500円\n";
        let key = extractor.cache_key_for(text, None);

        extractor.extract(text, None, false);
        extractor.clear_cache();

        assert!(extractor.get_alternatives(&key).is_empty());
    }

    #[test]
    fn test_extract_on_normalized_text_matches_raw() {
        let extractor = InvoiceFieldExtractor::new();
        let raw = "山口　大輝　様\n\nご請求金額　￥１２，８００\n";
        let normalized = normalize(raw);

        let from_raw = extractor.extract(raw, None, true);
        let from_normalized = extractor.extract(&normalized, None, true);

        assert_eq!(from_raw.customer, from_normalized.customer);
        assert_eq!(from_raw.amount, from_normalized.amount);
    }

    #[test]
    fn test_custom_pattern_table() {
        use crate::models::config::AmountPatternSpec;

        let config = ExtractorConfig {
            patterns: Some(vec![AmountPatternSpec {
                regex: r"支払額[:： ]*(\d[\d,]*)".to_string(),
                priority: 0,
            }]),
            ..ExtractorConfig::default()
        };
        let extractor = InvoiceFieldExtractor::with_config(config).unwrap();

        assert_eq!(extractor.extract_amount("支払額: 6,600\n", 0, 1), Some(6600));
        assert_eq!(extractor.extract_amount("ご請求額 6,600円\n", 0, 1), None);
    }

    #[test]
    fn test_bad_pattern_override_rejected() {
        let config = ExtractorConfig {
            patterns: Some(vec![crate::models::config::AmountPatternSpec {
                regex: "([unclosed".to_string(),
                priority: 0,
            }]),
            ..ExtractorConfig::default()
        };

        assert!(InvoiceFieldExtractor::with_config(config).is_err());
    }

    #[test]
    fn test_unreadable_input_degrades_gracefully() {
        let extractor = InvoiceFieldExtractor::new();
        let garbage = "\u{FFFD}\u{FFFD}\u{FFFD}\u{FFFD}\u{FFFD}\u{FFFD}\u{FFFD}a\n";
        let result = extractor.extract(garbage, None, false);

        assert_eq!(result.customer, None);
        assert_eq!(result.amount, None);
        assert_eq!(result.context.method, "recovered");
    }

    #[test]
    fn test_cache_key_prefers_filename() {
        let extractor = InvoiceFieldExtractor::new();
        assert_eq!(
            extractor.cache_key_for("text", Some("invoice.pdf")),
            "invoice.pdf"
        );
        assert_eq!(extractor.cache_key_for("text", None).len(), 16);
    }
}

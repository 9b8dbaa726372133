//! Addressee extraction from Japanese invoice text.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::models::result::CandidateSource;
use crate::text::normalize;

use super::patterns::{
    CORPORATE_MARKERS, FILENAME_PREFIX, HONORIFIC_FRAGMENTS, JA_RUN, LABELED_CUSTOMER,
    MONETARY_BLACKLIST, MONETARY_LINE_LABELS, ONCHU_CUSTOMER, POSTAL_LINE_CUSTOMER, SAMA_CUSTOMER,
};
use super::{CustomerCandidate, FieldExtractor};

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref PAREN_ALIAS: Regex = Regex::new(r"[（(][^（）()]*[）)]").unwrap();
}

/// Customer (addressee) field extractor.
pub struct CustomerExtractor {
    blacklist: Option<Vec<String>>,
    mapping: HashMap<String, String>,
    allow_alphanumeric_from_filename: bool,
}

impl CustomerExtractor {
    pub fn new() -> Self {
        Self {
            blacklist: None,
            mapping: HashMap::new(),
            allow_alphanumeric_from_filename: true,
        }
    }

    /// Override the monetary-label blacklist.
    pub fn with_blacklist(mut self, blacklist: Vec<String>) -> Self {
        self.blacklist = Some(blacklist);
        self
    }

    /// Supply the filename-substring → display-name mapping.
    pub fn with_mapping(mut self, mapping: HashMap<String, String>) -> Self {
        self.mapping = mapping;
        self
    }

    /// Permit pure-ASCII candidates from filename sources.
    pub fn with_allow_alphanumeric(mut self, allow: bool) -> Self {
        self.allow_alphanumeric_from_filename = allow;
        self
    }

    fn is_blacklisted(&self, name: &str) -> bool {
        match &self.blacklist {
            Some(list) => list.iter().any(|t| name.contains(t.as_str())),
            None => MONETARY_BLACKLIST.iter().any(|t| name.contains(t)),
        }
    }

    /// Mine, filter, and sort addressee candidates. Text candidates come
    /// first; the filename ladder runs only when the text yields nothing.
    pub fn candidates(&self, text: &str, filename: Option<&str>) -> Vec<CustomerCandidate> {
        let normalized = normalize(text);
        let mined_text = strip_monetary_lines(&normalized);

        let mut out: Vec<CustomerCandidate> = Vec::new();
        self.mine_text(&mined_text, &mut out);

        if out.is_empty() {
            if let Some(name) = filename {
                self.mine_filename(name, &mut out);
            }
        }

        out.sort_by(|a, b| b.score.cmp(&a.score).then(a.position.cmp(&b.position)));
        out
    }

    fn mine_text(&self, text: &str, out: &mut Vec<CustomerCandidate>) {
        for caps in SAMA_CUSTOMER.captures_iter(text) {
            let m = caps.get(1).unwrap();
            self.push_candidate(out, m.as_str(), 16, CandidateSource::SamaPattern, m.start());
        }

        for caps in ONCHU_CUSTOMER.captures_iter(text) {
            let m = caps.get(1).unwrap();
            self.push_candidate(out, m.as_str(), 14, CandidateSource::OnchuPattern, m.start());
        }

        for caps in LABELED_CUSTOMER.captures_iter(text) {
            let m = caps.get(1).unwrap();
            self.push_candidate(out, m.as_str(), 5, CandidateSource::Text, m.start());
        }

        for caps in POSTAL_LINE_CUSTOMER.captures_iter(text) {
            let m = caps.get(1).unwrap();
            self.push_candidate(out, m.as_str(), 5, CandidateSource::Text, m.start());
        }

        // Bare Japanese runs, head of the document only.
        let head_end: usize = text.split_inclusive('\n').take(20).map(str::len).sum();
        for m in JA_RUN.find_iter(&text[..head_end]) {
            self.push_candidate(out, m.as_str(), 2, CandidateSource::Text, m.start());
        }
    }

    fn push_candidate(
        &self,
        out: &mut Vec<CustomerCandidate>,
        raw: &str,
        score: i32,
        source: CandidateSource,
        position: usize,
    ) {
        let Some(name) = canonicalize(raw) else { return };
        if !self.is_valid(&name, source) {
            debug!(len = name.chars().count(), source = source.as_str(), "candidate rejected");
            return;
        }

        match out.iter_mut().find(|c| c.name == name) {
            Some(existing) => {
                if score > existing.score {
                    existing.score = score;
                    existing.source = source;
                    existing.position = position;
                }
            }
            None => out.push(CustomerCandidate {
                name,
                score,
                source,
                position,
            }),
        }
    }

    /// Validity filter. "Letter-class" means Unicode alphabetic, the stable
    /// approximation of general category L*.
    fn is_valid(&self, name: &str, source: CandidateSource) -> bool {
        if name.chars().count() < 2 {
            return false;
        }
        if name.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        if !name.chars().any(char::is_alphabetic) {
            return false;
        }
        if name.contains('様') || name.contains("御中") {
            return false;
        }
        if self.is_blacklisted(name) {
            return false;
        }
        if HONORIFIC_FRAGMENTS.contains(&name) {
            return false;
        }

        let pure_ascii = name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == ' ');
        if pure_ascii
            && !(source == CandidateSource::Filename && self.allow_alphanumeric_from_filename)
        {
            return false;
        }

        true
    }

    fn mine_filename(&self, filename: &str, out: &mut Vec<CustomerCandidate>) {
        let base = Path::new(filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.to_string());

        // Configured mapping first; keys visited in sorted order so the
        // outcome does not depend on map iteration order.
        let mut keys: Vec<&String> = self.mapping.keys().collect();
        keys.sort();
        for key in keys {
            if filename.contains(key.as_str()) {
                let display = self.mapping[key].clone();
                self.push_candidate(out, &display, 1, CandidateSource::Filename, 0);
                if !out.is_empty() {
                    return;
                }
            }
        }

        // prefix_invoice / prefix-receipt style names.
        if let Some(caps) = FILENAME_PREFIX.captures(&base) {
            self.push_candidate(out, &caps[1], 1, CandidateSource::Filename, 1);
            if !out.is_empty() {
                return;
            }
        }

        // First segment before an underscore or hyphen, extended when short.
        if let Some(segment) = leading_segment(&base) {
            self.push_candidate(out, &segment, 0, CandidateSource::Filename, 2);
        }
    }
}

impl Default for CustomerExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for CustomerExtractor {
    type Output = CustomerCandidate;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        self.candidates(text, None)
    }
}

impl CustomerExtractor {
    /// Extract the addressee display string, honorific applied.
    pub fn extract_with_filename(&self, text: &str, filename: Option<&str>) -> Option<String> {
        let cands = self.candidates(text, filename);
        let winner = cands.first()?;
        Some(apply_honorific(&winner.name, winner.source))
    }
}

/// Extract the addressee from invoice text, with optional filename fallback.
pub fn extract_customer(text: &str, filename: Option<&str>) -> Option<String> {
    CustomerExtractor::new().extract_with_filename(text, filename)
}

/// Append the honorific the candidate's source calls for. Corporate 御中
/// matches keep 御中 and are never rewritten to 様.
pub(crate) fn apply_honorific(name: &str, source: CandidateSource) -> String {
    if source == CandidateSource::OnchuPattern {
        return format!("{name}御中");
    }
    if name.ends_with('様') || name.ends_with("御中") {
        return name.to_string();
    }
    format!("{name}様")
}

/// Privacy mask: ends kept, middle starred. Corporate names and names of two
/// characters or fewer are not masked.
pub fn mask_name(name: &str) -> Option<String> {
    if CORPORATE_MARKERS.iter().any(|m| name.contains(m)) {
        return None;
    }
    let chars: Vec<char> = name.chars().collect();
    if chars.len() <= 2 {
        return None;
    }
    let mut masked = String::new();
    masked.push(chars[0]);
    for _ in 0..chars.len() - 2 {
        masked.push('*');
    }
    masked.push(chars[chars.len() - 1]);
    Some(masked)
}

/// Drop lines that carry monetary labels before mining. Reverted when the
/// filter leaves less than 50 characters.
fn strip_monetary_lines(text: &str) -> String {
    let filtered: Vec<&str> = text
        .split('\n')
        .filter(|line| !MONETARY_LINE_LABELS.iter().any(|label| line.contains(label)))
        .collect();
    let joined = filtered.join("\n");
    if joined.chars().count() < 50 {
        text.to_string()
    } else {
        joined
    }
}

/// Canonical candidate form: aliases stripped, whitespace collapsed, leading
/// honorific/label runs shed, the literal 請求 removed.
fn canonicalize(raw: &str) -> Option<String> {
    let no_alias = PAREN_ALIAS.replace_all(raw, "");
    let mut runs: Vec<&str> = no_alias.split_whitespace().collect();

    while let Some(first) = runs.first() {
        let fragment = first.contains('様')
            || first.contains("御中")
            || HONORIFIC_FRAGMENTS.contains(first);
        if fragment {
            runs.remove(0);
        } else {
            break;
        }
    }

    if runs.is_empty() {
        return None;
    }

    let name = runs.join(" ").replace("請求", "");
    let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// First filename segment before `_` or `-`, extended with the following
/// segment when shorter than three characters.
fn leading_segment(base: &str) -> Option<String> {
    let mut parts = base.splitn(3, ['_', '-']);
    let first = parts.next()?;
    if first.is_empty() {
        return None;
    }
    if first.chars().count() < 3 {
        if let Some(second) = parts.next() {
            if !second.is_empty() {
                return Some(format!("{first} {second}"));
            }
        }
    }
    Some(first.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sama_name_extracted() {
        let text = "山口 大輝 様\n\nご請求金額 ¥12,800\n合計 ¥12,800\n";
        assert_eq!(extract_customer(text, None), Some("山口 大輝様".to_string()));
    }

    #[test]
    fn test_corporate_onchu_preserved() {
        let text = "〒700-0804\n株式会社テスト 御中\nご請求額 1,080円\n";
        assert_eq!(
            extract_customer(text, None),
            Some("株式会社テスト御中".to_string())
        );
    }

    #[test]
    fn test_mojibake_label_fragment_shed() {
        let text = "\u{FFFD}\u{FFFD}客様 テスト商事 様\nご請求額 ¥5,500\n";
        assert_eq!(extract_customer(text, None), Some("テスト商事様".to_string()));
    }

    #[test]
    fn test_filename_fallback_prefix() {
        let text = "ご請求額 3,300円\n";
        assert_eq!(
            extract_customer(text, Some("AcmeCorp_invoice_2024.pdf")),
            Some("AcmeCorp様".to_string())
        );
    }

    #[test]
    fn test_customer_found_in_line_item_invoice() {
        let text = "おやつ 500\n教材費 1,200\n合計 1,700 円\n鈴木 一郎 様\n";
        assert_eq!(extract_customer(text, None), Some("鈴木 一郎様".to_string()));
    }

    #[test]
    fn test_nothing_extractable() {
        assert_eq!(extract_customer("Page 1 of 1\n", None), None);
    }

    #[test]
    fn test_blacklist_terms_never_returned() {
        let text = "合計 12345\n";
        let result = extract_customer(text, None);
        assert!(result.is_none(), "got {result:?}");
    }

    #[test]
    fn test_single_char_name_rejected() {
        assert_eq!(extract_customer("あ 様\n", None), None);
    }

    #[test]
    fn test_twenty_char_name_accepted() {
        let name = "あいうえおかきくけこさしすせそたちつてと";
        let text = format!("{name} 様\n");
        assert_eq!(extract_customer(&text, None), Some(format!("{name}様")));
    }

    #[test]
    fn test_labeled_customer() {
        let text = "お客様: 高橋物産\nよろしくお願いします\n";
        assert_eq!(extract_customer(text, None), Some("高橋物産様".to_string()));
    }

    #[test]
    fn test_alias_stripped() {
        let text = "山口 大輝(ヤマグチ) 様\n";
        assert_eq!(extract_customer(text, None), Some("山口 大輝様".to_string()));
    }

    #[test]
    fn test_ascii_rejected_from_text_but_allowed_from_filename() {
        let text = "氏名: John\n";
        assert_eq!(extract_customer(text, None), None);

        assert_eq!(
            extract_customer("ご請求額 500円\n", Some("Acme_invoice.pdf")),
            Some("Acme様".to_string())
        );
    }

    #[test]
    fn test_filename_mapping_strategy() {
        let mut mapping = HashMap::new();
        mapping.insert("YORUTOKO".to_string(), "ヨルトコ".to_string());
        let extractor = CustomerExtractor::new().with_mapping(mapping);

        assert_eq!(
            extractor.extract_with_filename("", Some("YORUTOKO_2024_07.pdf")),
            Some("ヨルトコ様".to_string())
        );
    }

    #[test]
    fn test_filename_short_segment_extended() {
        assert_eq!(
            extract_customer("", Some("ab_cd_2024.pdf")),
            Some("ab cd様".to_string())
        );
    }

    #[test]
    fn test_mask_personal_name() {
        assert_eq!(mask_name("山口 大輝"), Some("山***輝".to_string()));
        assert_eq!(mask_name("鈴木"), None);
    }

    #[test]
    fn test_mask_corporate_name_skipped() {
        assert_eq!(mask_name("株式会社テスト"), None);
    }

    #[test]
    fn test_custom_blacklist_applies() {
        let extractor =
            CustomerExtractor::new().with_blacklist(vec!["テスト商事".to_string()]);
        assert_eq!(extractor.extract_with_filename("テスト商事 様\n", None), None);
    }

    #[test]
    fn test_alternatives_keep_occurrence_order() {
        let text = "佐藤 様\n田中 様\n";
        let cands = CustomerExtractor::new().candidates(text, None);
        assert_eq!(cands[0].name, "佐藤");
        assert_eq!(cands[1].name, "田中");
    }
}

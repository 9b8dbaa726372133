//! Billed-amount extraction from Japanese invoice text.

use regex::Regex;
use tracing::debug;

use crate::error::ExtractionError;
use crate::models::config::ScoreWeights;
use crate::text::normalize;

use super::patterns::{
    AMOUNT_PATTERNS, DATE_YMD, LINE_ITEM_KEYWORDS, PHONE_NUMBER, POSTAL_CODE, RECIPIENT_NUMBER,
};
use super::{AmountCandidate, FieldExtractor};

/// Amounts outside this window are never billed totals.
const MIN_AMOUNT: i64 = 100;
const MAX_AMOUNT: i64 = 10_000_000;

/// Label families with priority 4 or below anchor on an explicit label.
const LABEL_ANCHORED_MAX_PRIORITY: u8 = 4;

/// Amount field extractor.
pub struct AmountExtractor {
    patterns: Option<Vec<(u8, Regex)>>,
    weights: ScoreWeights,
    page_index: usize,
    page_count: usize,
}

impl AmountExtractor {
    pub fn new() -> Self {
        Self {
            patterns: None,
            weights: ScoreWeights::default(),
            page_index: 0,
            page_count: 1,
        }
    }

    /// Override the score weight table.
    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Override the pattern family table.
    pub fn with_patterns(mut self, patterns: Vec<(u8, Regex)>) -> Self {
        self.patterns = Some(patterns);
        self
    }

    /// Supply pagination context for position bonuses.
    pub fn with_page(mut self, page_index: usize, page_count: usize) -> Self {
        self.page_index = page_index;
        self.page_count = page_count;
        self
    }

    fn patterns(&self) -> &[(u8, Regex)] {
        self.patterns.as_deref().unwrap_or(AMOUNT_PATTERNS.as_slice())
    }

    fn on_last_page(&self) -> bool {
        self.page_count > 1 && self.page_index + 1 == self.page_count
    }

    /// Mine, filter, score, and sort candidates from one query.
    pub fn candidates(&self, text: &str) -> Vec<AmountCandidate> {
        let normalized = normalize(text);
        let mut found: Vec<AmountCandidate> = Vec::new();

        self.mine_source(&normalized, None, &mut found);
        if normalized != text {
            self.mine_source(text, None, &mut found);
        }

        // Last-page fallback sweep of the bottom region, only when nothing
        // label-anchored turned up.
        let has_labeled = found
            .iter()
            .any(|c| c.pattern_priority <= LABEL_ANCHORED_MAX_PRIORITY);
        if self.on_last_page() && !has_labeled {
            let start = bottom_region_start(&normalized);
            self.mine_source(&normalized, Some(start), &mut found);
        }

        // One candidate per value: keep the best score.
        let mut best: Vec<AmountCandidate> = Vec::new();
        for cand in found {
            match best.iter_mut().find(|c| c.value == cand.value) {
                Some(existing) if cand.score > existing.score => *existing = cand,
                Some(_) => {}
                None => best.push(cand),
            }
        }

        best.sort_by(|a, b| b.score.cmp(&a.score).then(b.value.cmp(&a.value)));
        best
    }

    fn mine_source(&self, source: &str, from: Option<usize>, out: &mut Vec<AmountCandidate>) {
        let zones = exclusion_zones(source);
        let mut region = from.unwrap_or(0).min(source.len());
        while region < source.len() && !source.is_char_boundary(region) {
            region += 1;
        }
        let slice = &source[region..];

        for (priority, re) in self.patterns() {
            for caps in re.captures_iter(slice) {
                let Some(literal) = caps.get(1) else { continue };
                let (value, recovered) = match parse_literal(literal.as_str()) {
                    Ok(parsed) => parsed,
                    Err(ExtractionError::Parse { literal }) => {
                        debug!(literal = %literal, "skipping unparseable numeric literal");
                        continue;
                    }
                    Err(_) => continue,
                };

                if !(MIN_AMOUNT..=MAX_AMOUNT).contains(&value) {
                    continue;
                }

                let span = (region + literal.start(), region + literal.end());
                if let Some(zone) = excluded_by(&zones, span, value) {
                    debug!(value, zone = zone.digits.as_str(), "candidate excluded as lookalike");
                    continue;
                }

                let cand = self.build_candidate(source, span, value, *priority, recovered);
                out.push(cand);
            }
        }
    }

    fn build_candidate(
        &self,
        source: &str,
        span: (usize, usize),
        value: i64,
        priority: u8,
        recovered: bool,
    ) -> AmountCandidate {
        let w = &self.weights;
        let window = char_window(source, span, 40, 40);
        let near20 = char_window(source, span, 20, 20);
        let near5 = char_window(source, span, 5, 5);
        let after5 = char_window(source, (span.1, span.1), 0, 5);

        let mut score = self.patterns().len() as i32 - priority as i32;

        if ["ご請求額", "ご請求金額", "御請求額", "御請求金額"]
            .iter()
            .any(|l| window.contains(l))
        {
            score += w.billed_label;
        } else if window.contains("請求額") || window.contains("請求金額") {
            score += w.invoice_label;
        }

        let total_nearby = near20.contains("合計");
        if total_nearby {
            score += w.total_label;
        }
        if window.contains("総額") {
            score += w.gross_label;
        }
        if near20.contains("金額") {
            score += w.amount_label;
        }
        if window.contains("お支払") {
            score += w.payment_label;
        }

        let has_currency_symbol = near5.contains('¥') || near5.contains('￥');
        if has_currency_symbol {
            score += w.currency_nearby;
        }
        if after5.contains('円') {
            score += w.yen_suffix;
        }

        if value < 1000 {
            score += w.small_value_penalty;
        }
        if value % 1000 == 0 && !total_nearby {
            score += w.round_thousand_penalty;
        }
        if !total_nearby && LINE_ITEM_KEYWORDS.iter().any(|k| window.contains(k)) {
            score += w.line_item_penalty;
        }
        if looks_like_lookalike(window) {
            score += w.lookalike_penalty;
        }
        if recovered {
            score += w.recovered_penalty;
        }

        let bottom = !source.is_empty() && span.0 >= bottom_region_start(source);
        let last_page = self.on_last_page();
        if self.page_count > 1 {
            if last_page {
                score += w.last_page_bonus;
            }
            if bottom {
                score += w.bottom_bonus;
            }
        }

        AmountCandidate {
            value,
            pattern_priority: priority,
            context_window: window.to_string(),
            span,
            bottom,
            last_page,
            has_currency_symbol,
            recovered,
            score,
        }
    }
}

impl Default for AmountExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for AmountExtractor {
    type Output = AmountCandidate;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        self.candidates(text)
    }
}

/// Extract the billed amount from invoice text.
pub fn extract_amount(text: &str) -> Option<i64> {
    AmountExtractor::new().extract(text).map(|c| c.value)
}

/// Extract the billed amount with pagination context.
pub fn extract_amount_paged(text: &str, page_index: usize, page_count: usize) -> Option<i64> {
    AmountExtractor::new()
        .with_page(page_index, page_count)
        .extract(text)
        .map(|c| c.value)
}

/// Parse a matched numeric literal.
///
/// Separators are stripped. A literal damaged by replacement characters
/// synthesizes a power-of-ten estimate from its digit-position count; the
/// caller demotes the score.
fn parse_literal(literal: &str) -> Result<(i64, bool), ExtractionError> {
    if literal.contains('\u{FFFD}') {
        let positions = literal
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '\u{FFFD}')
            .count();
        if positions == 0 || positions > 8 {
            return Err(ExtractionError::Parse {
                literal: literal.to_string(),
            });
        }
        return Ok((10i64.pow(positions as u32 - 1), true));
    }

    let digits: String = literal.chars().filter(|c| c.is_ascii_digit()).collect();
    digits
        .parse::<i64>()
        .map(|v| (v, false))
        .map_err(|_| ExtractionError::Parse {
            literal: literal.to_string(),
        })
}

/// A span of text whose digits must not be returned as the amount.
struct ExclusionZone {
    span: (usize, usize),
    digits: String,
}

fn exclusion_zones(text: &str) -> Vec<ExclusionZone> {
    let mut zones = Vec::new();

    for caps in POSTAL_CODE.captures_iter(text) {
        let m = caps.get(0).unwrap();
        zones.push(ExclusionZone {
            span: (m.start(), m.end()),
            digits: format!("{}{}", &caps[1], &caps[2]),
        });
    }

    for caps in RECIPIENT_NUMBER.captures_iter(text) {
        let m = caps.get(0).unwrap();
        zones.push(ExclusionZone {
            span: (m.start(), m.end()),
            digits: caps[1].to_string(),
        });
    }

    for caps in PHONE_NUMBER.captures_iter(text) {
        let m = caps.get(0).unwrap();
        zones.push(ExclusionZone {
            span: (m.start(), m.end()),
            digits: caps[1].chars().filter(|c| c.is_ascii_digit()).collect(),
        });
    }

    for caps in DATE_YMD.captures_iter(text) {
        let (y, m, d) = (&caps[1], &caps[2], &caps[3]);
        let valid = matches!(
            (y.parse::<i32>(), m.parse::<u32>(), d.parse::<u32>()),
            (Ok(y), Ok(m), Ok(d)) if chrono::NaiveDate::from_ymd_opt(y, m, d).is_some()
        );
        if !valid {
            continue;
        }
        let full = caps.get(0).unwrap();
        zones.push(ExclusionZone {
            span: (full.start(), full.end()),
            // Digits concatenated without separators, as they would collide
            // with a candidate literal.
            digits: format!("{y}{m}{d}"),
        });
    }

    zones
}

fn excluded_by(zones: &[ExclusionZone], span: (usize, usize), value: i64) -> Option<&ExclusionZone> {
    let value_digits = value.to_string();
    zones
        .iter()
        .find(|z| (span.0 < z.span.1 && z.span.0 < span.1) || z.digits == value_digits)
}

fn looks_like_lookalike(window: &str) -> bool {
    POSTAL_CODE.is_match(window)
        || RECIPIENT_NUMBER.is_match(window)
        || PHONE_NUMBER.is_match(window)
        || DATE_YMD.is_match(window)
}

/// Byte offset where the bottom 20% of the page starts.
fn bottom_region_start(text: &str) -> usize {
    (text.len() as f64 * 0.8) as usize
}

/// Window of `before`/`after` characters around a byte span, snapped to
/// character boundaries.
fn char_window(text: &str, span: (usize, usize), before: usize, after: usize) -> &str {
    let mut start = span.0.min(text.len());
    for _ in 0..before {
        match text[..start].char_indices().next_back() {
            Some((i, _)) => start = i,
            None => break,
        }
    }

    let base = span.1.min(text.len());
    let end = match text[base..].char_indices().nth(after) {
        Some((i, _)) => base + i,
        None => text.len(),
    };

    &text[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_billed_label_wins_over_total() {
        let text = "山口 大輝 様\n\nご請求金額 ¥12,800\n合計 ¥12,800\n";
        assert_eq!(extract_amount(text), Some(12800));
    }

    #[test]
    fn test_postal_code_never_returned() {
        let text = "〒700-0804\n株式会社テスト 御中\nご請求額 1,080円\n";
        assert_eq!(extract_amount(text), Some(1080));
    }

    #[test]
    fn test_postal_code_alone_yields_none() {
        assert_eq!(extract_amount("〒123-4567\n"), None);
    }

    #[test]
    fn test_line_items_demoted_below_total() {
        let text = "おやつ 500\n教材費 1,200\n合計 1,700 円\n鈴木 一郎 様\n";
        assert_eq!(extract_amount(text), Some(1700));
    }

    #[test]
    fn test_no_amount_in_plain_text() {
        assert_eq!(extract_amount("Page 1 of 1\n"), None);
    }

    #[test]
    fn test_boundary_values() {
        assert_eq!(extract_amount("金額 100円"), Some(100));
        assert_eq!(extract_amount("金額 99円"), None);
        assert_eq!(extract_amount("金額 10,000,000円"), Some(10_000_000));
        assert_eq!(extract_amount("金額 10,000,001円"), None);
    }

    #[test]
    fn test_phone_number_excluded() {
        let text = "TEL 03-1234-5678\nご請求額 2,400円\n";
        assert_eq!(extract_amount(text), Some(2400));
        assert_eq!(extract_amount("TEL 03-1234-5678\n"), None);
    }

    #[test]
    fn test_recipient_number_excluded() {
        assert_eq!(extract_amount("口座番号 (1234567)\n"), None);
    }

    #[test]
    fn test_date_excluded() {
        assert_eq!(extract_amount("発行日 2024年1月15日\n"), None);
        let text = "発行日 2024年1月15日\n合計 3,200円\n";
        assert_eq!(extract_amount(text), Some(3200));
    }

    #[test]
    fn test_fullwidth_digits_extracted() {
        assert_eq!(extract_amount("ご請求金額　￥１２，８００"), Some(12800));
    }

    #[test]
    fn test_tie_breaks_by_value_descending() {
        // Two bare numbers with identical context: higher value wins.
        let text = "1,500\n2,500\n";
        assert_eq!(extract_amount(text), Some(2500));
    }

    #[test]
    fn test_label_beats_position() {
        // The billed label on an earlier page outranks a bare total in the
        // bottom of the last page.
        let first = AmountExtractor::new()
            .with_page(0, 2)
            .extract("ご請求額 4,400円\n")
            .unwrap();
        let last = AmountExtractor::new()
            .with_page(1, 2)
            .extract("明細をご確認ください\n\n\n9,900\n")
            .unwrap();
        assert!(first.score > last.score);
        assert_eq!(first.value, 4400);
    }

    #[test]
    fn test_last_page_flags_set() {
        let cands = AmountExtractor::new()
            .with_page(1, 2)
            .candidates("ご請求額 4,400円\n");
        assert!(cands[0].last_page);
    }

    #[test]
    fn test_mojibake_literal_recovers_power_of_ten() {
        let cands = AmountExtractor::new().candidates("ご請求額 5,5\u{FFFD}\u{FFFD}\n");
        let recovered = cands.iter().find(|c| c.recovered).unwrap();
        // Four digit positions survive: 5, 5, and two damaged.
        assert_eq!(recovered.value, 1000);
    }

    #[test]
    fn test_recovered_candidate_loses_to_clean_one() {
        let text = "金額 5,5\u{FFFD}\u{FFFD}\nご請求額 5,500円\n";
        assert_eq!(extract_amount(text), Some(5500));
    }

    #[test]
    fn test_extract_on_normalized_matches_raw() {
        let raw = "ご請求金額　￥１２，８００\n合計 ¥12,800\n";
        assert_eq!(extract_amount(raw), extract_amount(&normalize(raw)));
    }

    #[test]
    fn test_currency_flag_recorded() {
        let cands = AmountExtractor::new().candidates("ご請求額 ¥5,500\n");
        assert!(cands[0].has_currency_symbol);
    }
}

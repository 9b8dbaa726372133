//! Mojibake detection and recovery.
//!
//! OCR output and badly transcoded PDFs arrive with U+FFFD replacement
//! characters and control-category noise. Recovery keeps what is legible
//! and rescues digit runs from lines that are otherwise lost.

use lazy_static::lazy_static;
use regex::Regex;

use super::normalize::normalize;

lazy_static! {
    static ref DIGIT_RUN: Regex = Regex::new(r"[0-9][0-9,]*").unwrap();
}

/// Readability assessment and recovered form of a raw text blob.
#[derive(Debug, Clone, Default)]
pub struct ReadableText {
    /// Recovered text: normalized, with garbled lines dropped or reduced to
    /// their digit runs.
    pub text: String,

    /// Non-empty recovered lines.
    pub lines: Vec<String>,

    /// Digit runs rescued from lines that were dropped as garbled.
    pub numbers: Vec<String>,

    /// Share of non-whitespace characters that are neither replacement nor
    /// control characters. 0.0 for empty input.
    pub readable_ratio: f64,
}

fn is_noise(c: char) -> bool {
    c == '\u{FFFD}' || c.is_control()
}

/// Assess readability and produce a recovered form of the input.
///
/// A line more than half replacement/control characters is dropped unless it
/// contains a digit run, in which case the digit runs are kept in isolation
/// and recorded in `numbers`.
pub fn extract_readable(text: &str) -> ReadableText {
    let visible: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    let readable_ratio = if visible.is_empty() {
        0.0
    } else {
        let ok = visible.iter().filter(|c| !is_noise(**c)).count();
        ok as f64 / visible.len() as f64
    };

    let mut kept: Vec<String> = Vec::new();
    let mut numbers: Vec<String> = Vec::new();

    for raw_line in text.split('\n') {
        let chars: Vec<char> = raw_line.chars().filter(|c| !c.is_whitespace()).collect();
        let noise = chars.iter().filter(|c| is_noise(**c)).count();
        let cleaned = normalize(raw_line);

        if !chars.is_empty() && noise * 2 > chars.len() {
            let runs: Vec<String> = DIGIT_RUN
                .find_iter(&cleaned)
                .map(|m| m.as_str().to_string())
                .collect();
            if runs.is_empty() {
                continue;
            }
            numbers.extend(runs.iter().cloned());
            kept.push(runs.join(" "));
        } else {
            kept.push(cleaned);
        }
    }

    let recovered = kept.join("\n");
    let lines = kept.into_iter().filter(|l| !l.is_empty()).collect();

    ReadableText {
        text: recovered,
        lines,
        numbers,
        readable_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clean_text_ratio_is_one() {
        let r = extract_readable("ご請求額 1,080円\n");
        assert!(r.readable_ratio > 0.99);
        assert_eq!(r.lines, vec!["ご請求額 1,080円".to_string()]);
    }

    #[test]
    fn test_empty_input_ratio_zero() {
        let r = extract_readable("");
        assert_eq!(r.readable_ratio, 0.0);
        assert_eq!(r.text, "");
        assert!(r.lines.is_empty());
    }

    #[test]
    fn test_mildly_damaged_line_kept() {
        let r = extract_readable("\u{FFFD}\u{FFFD}客様 テスト商事 様\n");
        assert_eq!(r.lines, vec!["客様 テスト商事 様".to_string()]);
        assert!(r.readable_ratio > 0.5);
    }

    #[test]
    fn test_garbled_line_dropped() {
        let garbled = "\u{FFFD}\u{FFFD}\u{FFFD}\u{FFFD}\u{FFFD}あ\n読める行です\n";
        let r = extract_readable(garbled);
        assert_eq!(r.lines, vec!["読める行です".to_string()]);
    }

    #[test]
    fn test_digit_run_rescued_from_garbled_line() {
        let garbled = "\u{FFFD}\u{FFFD}\u{FFFD}\u{FFFD}\u{FFFD}\u{FFFD}12,800\u{FFFD}\u{FFFD}\n";
        let r = extract_readable(garbled);
        assert_eq!(r.numbers, vec!["12,800".to_string()]);
        assert_eq!(r.lines, vec!["12,800".to_string()]);
        assert!(r.readable_ratio < 0.5);
    }

    #[test]
    fn test_ratio_counts_noise() {
        let half = "ab\u{FFFD}\u{FFFD}";
        let r = extract_readable(half);
        assert!((r.readable_ratio - 0.5).abs() < 1e-9);
    }
}

//! Canonical text form for the extractors.
//!
//! Full NFKC would over-fold (compatibility forms like ㌔, and the honorific
//! characters the customer patterns anchor on), so the fold set is an
//! explicit table covering exactly what the downstream patterns rely on.

/// Fold a single full-width character to its half-width equivalent.
///
/// Covers digits, the ideographic space, comma, period, yen sign, colon,
/// slash, percent, and three dash variants. Everything else passes through.
fn fold_char(c: char) -> char {
    match c {
        '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
        '\u{3000}' => ' ',
        '，' => ',',
        '．' => '.',
        '￥' => '¥',
        '：' => ':',
        '／' => '/',
        '％' => '%',
        // ‐ (U+2010), − (U+2212), － (U+FF0D)
        '\u{2010}' | '\u{2212}' | '\u{FF0D}' => '-',
        _ => c,
    }
}

/// Normalize a raw text blob to the canonical form the extractors expect.
///
/// Half-width digits and punctuation, single spaces, trimmed lines,
/// replacement and control characters removed. Line structure is preserved.
/// The transformation is idempotent.
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .chars()
        .filter(|&c| c != '\u{FFFD}')
        .filter(|&c| c == '\n' || c == '\t' || !c.is_control())
        .map(|c| if c == '\t' { ' ' } else { fold_char(c) })
        .collect();

    folded
        .split('\n')
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fullwidth_digits_fold() {
        assert_eq!(normalize("１２，８００円"), "12,800円");
    }

    #[test]
    fn test_fullwidth_punctuation_folds() {
        assert_eq!(normalize("￥１００：５０％　／"), "¥100:50% /");
    }

    #[test]
    fn test_dash_variants_fold() {
        assert_eq!(normalize("〒７００\u{2212}０８０４"), "〒700-0804");
        assert_eq!(normalize("123\u{FF0D}4567"), "123-4567");
        assert_eq!(normalize("a\u{2010}b"), "a-b");
    }

    #[test]
    fn test_whitespace_collapses_per_line() {
        assert_eq!(normalize("  山口 　 大輝   様  \nご請求額"), "山口 大輝 様\nご請求額");
    }

    #[test]
    fn test_replacement_and_control_chars_removed() {
        assert_eq!(normalize("テ\u{FFFD}スト\u{0007}商事"), "テスト商事");
    }

    #[test]
    fn test_line_structure_preserved() {
        assert_eq!(normalize("a\n\nb\n"), "a\n\nb\n");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "山口　大輝　様\n\nご請求金額　￥１２，８００\n合計 ¥12,800\n",
            "〒700-0804\n株式会社テスト 御中\nご請求額 1,080円\n",
            "",
            "   \n \t \n",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
    }
}

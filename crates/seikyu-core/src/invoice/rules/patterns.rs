//! Regex and keyword tables for Japanese invoice extraction.
//!
//! Everything tunable lives here as data: the amount pattern families, the
//! lookalike shapes, the customer patterns, and the keyword lists.

use lazy_static::lazy_static;
use regex::Regex;

/// Characters allowed inside a name run: CJK, kana, iteration marks, the
/// prolonged sound mark, ASCII alphanumerics, and the middle dot.
const NAME_CHAR: &str = r"[\p{Han}\p{Hiragana}\p{Katakana}々〆ーA-Za-z0-9・]";

/// A name: up to three space-separated runs (surname, given name, alias).
macro_rules! name_group {
    () => {
        concat!(
            r"[\p{Han}\p{Hiragana}\p{Katakana}々〆ーA-Za-z0-9・]{1,20}",
            r"(?:[ \u{3000}][\p{Han}\p{Hiragana}\p{Katakana}々〆ーA-Za-z0-9・]{1,20}){0,2}"
        )
    };
}

/// Separator between an amount label and its number: optional colon and
/// currency sign with surrounding spaces.
const LABEL_SEP: &str = r"[ \u{3000}]*[:：]?[ \u{3000}]*[¥￥]?[ \u{3000}]*";

/// Numeric literal, tolerating U+FFFD damage inside label-anchored matches.
const NUM_DAMAGED: &str = r"[0-9\u{FFFD}][0-9,\u{FFFD}]*";

/// Clean numeric literal with optional thousands separators.
const NUM: &str = r"(?:\d{1,3}(?:,\d{3})+|\d+)";

/// Default amount pattern families, highest priority first. Each regex has a
/// single capture group holding the numeric literal.
pub fn default_amount_patterns() -> Vec<(u8, Regex)> {
    let families: [(u8, String); 8] = [
        (
            0,
            format!(r"(?:ご請求額|ご請求金額|御請求額|御請求金額){LABEL_SEP}({NUM_DAMAGED})"),
        ),
        (
            1,
            format!(r"(?:請求金額|請求額|請求合計){LABEL_SEP}({NUM_DAMAGED})"),
        ),
        (
            2,
            format!(r"(?:合計金額|合計額|総額){LABEL_SEP}({NUM_DAMAGED})"),
        ),
        (3, format!(r"合計{LABEL_SEP}({NUM_DAMAGED})")),
        (4, format!(r"金額{LABEL_SEP}({NUM_DAMAGED})")),
        (5, format!(r"[¥￥][ \u{{3000}}]*({NUM})")),
        (6, format!(r"({NUM})[ \u{{3000}}]*円")),
        // The trailing class (instead of \b) stops a partial match of a
        // longer number: without it, 10,000,001円 would backtrack to a bogus
        // 10,000 candidate because 円 is a word character.
        (7, r"\b(\d{1,3}(?:,\d{3})+|\d{3,7})(?:[^,0-9]|$)".to_string()),
    ];

    families
        .into_iter()
        .map(|(priority, pattern)| (priority, Regex::new(&pattern).expect("default pattern")))
        .collect()
}

lazy_static! {
    /// Compiled default amount families.
    pub static ref AMOUNT_PATTERNS: Vec<(u8, Regex)> = default_amount_patterns();

    // Amount lookalikes. These shapes produce digits that must never be
    // returned as the billed amount.
    pub static ref POSTAL_CODE: Regex = Regex::new(
        r"〒[ \u{3000}]*(\d{3})[-－‐−]?(\d{4})"
    ).unwrap();

    pub static ref RECIPIENT_NUMBER: Regex = Regex::new(
        r"[（(][ ]*(\d{7,10})[ ]*[）)]"
    ).unwrap();

    pub static ref PHONE_NUMBER: Regex = Regex::new(
        r"(?:TEL|ＴＥＬ|Tel|tel|電話|FAX|ＦＡＸ|Fax)[ \u{3000}]*[:：.]?[ \u{3000}]*(\+?\d[\d\-() ]{6,14}\d)"
    ).unwrap();

    pub static ref DATE_YMD: Regex = Regex::new(
        r"(\d{4})[ ]?[年/\-.][ ]?(\d{1,2})[ ]?[月/\-.][ ]?(\d{1,2})[ ]?日?"
    ).unwrap();

    // Customer patterns.
    pub static ref SAMA_CUSTOMER: Regex = Regex::new(&format!(
        r"({})[ \u{{3000}}]*(?:[（(][^（）()\n]{{1,20}}[）)])?[ \u{{3000}}]*様",
        name_group!()
    )).unwrap();

    pub static ref ONCHU_CUSTOMER: Regex = Regex::new(&format!(
        r"((?:{corp})[ \u{{3000}}]?{nc}{{1,20}}|{nc}{{1,20}}[ \u{{3000}}]?(?:{corp}))[ \u{{3000}}]*御中",
        corp = r"株式会社|有限会社|合同会社|合資会社|合名会社|一般社団法人|一般財団法人",
        nc = NAME_CHAR
    )).unwrap();

    pub static ref LABELED_CUSTOMER: Regex = Regex::new(&format!(
        r"(?:お客様|お客さま|顧客|宛名|請求先|氏名)[ \u{{3000}}]*[:：]?[ \u{{3000}}]*({})",
        name_group!()
    )).unwrap();

    pub static ref POSTAL_LINE_CUSTOMER: Regex = Regex::new(&format!(
        r"〒[ \u{{3000}}]*\d{{3}}[-－‐−]?\d{{4}}[^\n]*\n[ \u{{3000}}]*({})[ \u{{3000}}]*様",
        name_group!()
    )).unwrap();

    /// Bare Japanese run, mined only from the head of the document.
    pub static ref JA_RUN: Regex = Regex::new(
        r"[\p{Han}\p{Hiragana}\p{Katakana}ー々]{2,15}"
    ).unwrap();

    /// Filename prefix before an invoice-ish keyword. An underscore is a
    /// word character, so a \b anchor would miss `foo_invoice_2024`.
    pub static ref FILENAME_PREFIX: Regex = Regex::new(
        r"(?i)^(.+?)[_-](?:invoice|receipt|bill|payment|order)(?:[_\-.]|$)"
    ).unwrap();
}

/// Monetary-label blacklist: a customer candidate containing any of these is
/// invalid.
pub const MONETARY_BLACKLIST: &[&str] = &[
    "合計",
    "小計",
    "総額",
    "金額",
    "請求額",
    "請求金額",
    "請求合計",
    "小計額",
    "税込",
    "税抜",
    "消費税",
    "合計額",
    "合計金額",
    "御請求額",
    "御請求金額",
    "ご請求額",
    "ご請求金額",
    "御合計",
    "請求書",
    "領収書",
    "明細",
    "単価",
    "数量",
    "振込手数料",
    "お支払",
    "〒",
    "TEL",
    "Tel",
    "FAX",
    "Fax",
    "電話",
    "年月日",
];

/// Words that label per-line-item rows rather than document totals.
pub const LINE_ITEM_KEYWORDS: &[&str] = &[
    "交通費",
    "教材費",
    "おやつ",
    "送料",
    "手数料",
    "消耗品",
    "日用品",
    "雑費",
    "通信費",
    "飲食費",
    "材料費",
];

/// Honorific and addressee-label fragments. A candidate equal to one of
/// these is noise; a leading run containing one is shed before scoring.
pub const HONORIFIC_FRAGMENTS: &[&str] = &[
    "お客様",
    "客様",
    "お客さま",
    "お客",
    "顧客",
    "宛名",
    "請求先",
    "氏名",
    "御中",
    "様",
    "殿",
    "各位",
];

/// Corporate markers: names containing one keep 御中 and are never masked.
pub const CORPORATE_MARKERS: &[&str] = &[
    "株式会社",
    "有限会社",
    "合同会社",
    "合資会社",
    "合名会社",
    "一般社団法人",
    "一般財団法人",
    "NPO法人",
    "(株)",
    "（株）",
];

/// Lines containing these labels are stripped before customer mining.
pub const MONETARY_LINE_LABELS: &[&str] = &["合計", "小計", "総額", "金額"];

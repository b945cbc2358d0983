use std::sync::LazyLock;

use regex::Regex;

static WRAP_HYPHEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z])-\n([A-Za-z])").unwrap());
static SPLIT_DIGITS_3_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(page|section)\s+(\d)\s+(\d)\s+(\d)\b").unwrap());
static SPLIT_DIGITS_2_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(page|section)\s+(\d)\s+(\d)\b").unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Canonicalize one page of OCR text: ASCII glyphs, unix newlines,
/// rejoined line-wrap hyphenations, repaired split page references.
pub fn normalize_text(raw: &str) -> String {
    let text = raw
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace(['\u{2014}', '\u{2013}'], "-")
        .replace(['\u{201c}', '\u{201d}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace('\u{00ad}', "")
        .replace('_', " ");

    let text = WRAP_HYPHEN_RE.replace_all(&text, "${1}${2}");
    // OCR splits multi-digit page references: "page 1 8" -> "page 18".
    // Three digits first, or the two-digit rule eats the front of the run.
    let text = SPLIT_DIGITS_3_RE.replace_all(&text, "${1} ${2}${3}${4}");
    let text = SPLIT_DIGITS_2_RE.replace_all(&text, "${1} ${2}${3}");
    text.into_owned()
}

pub fn collapse_ws(text: &str) -> String {
    WS_RE.replace_all(text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glyphs_become_ascii() {
        let raw = "\u{201c}Stop\u{201d} \u{2014} he said \u{2018}now\u{2019} \u{2013} quietly";
        assert_eq!(normalize_text(raw), "\"Stop\" - he said 'now' - quietly");
    }

    #[test]
    fn soft_hyphen_and_underscores_dropped() {
        assert_eq!(normalize_text("under\u{00ad}ground ___"), "underground    ");
    }

    #[test]
    fn line_wrap_hyphen_rejoined() {
        assert_eq!(normalize_text("under-\nground passage"), "underground passage");
    }

    #[test]
    fn wrap_join_needs_letters_on_both_sides() {
        assert_eq!(normalize_text("turn to 1-\n8"), "turn to 1-\n8");
    }

    #[test]
    fn split_two_digit_reference() {
        assert_eq!(normalize_text("turn to page 1 8 now"), "turn to page 18 now");
    }

    #[test]
    fn split_three_digit_reference() {
        assert_eq!(normalize_text("go to section 2 0 4."), "go to section 204.");
    }

    #[test]
    fn collapse_ws_flattens() {
        assert_eq!(collapse_ws("  a \n b\t\tc "), "a b c");
    }
}

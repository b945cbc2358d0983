use std::sync::LazyLock;

use regex::Regex;

use super::normalize::collapse_ws;
use crate::store::MAX_CHOICES;

pub const MIN_DESTINATION: u32 = 1;
pub const MAX_DESTINATION: u32 = 500;

/// OCR digit confusions seen in destination tokens. A token is accepted
/// only if every character is a digit or maps through this table.
const DIGIT_CONFUSABLES: &[(char, char)] = &[
    ('O', '0'),
    ('o', '0'),
    ('I', '1'),
    ('l', '1'),
    ('S', '5'),
    ('s', '5'),
    ('B', '8'),
    ('g', '9'),
    ('q', '9'),
    ('H', '7'),
    ('h', '7'),
];

// One clause pattern shared with the prose cleaner, so every sentence the
// extractor consumes can be removed from the body afterwards. Shape:
// optional lead-in, a cue word, a short window, a digit-or-confusable
// destination token, then the tail of the sentence.
static CHOICE_CLAUSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)((?:(?:if|when|should|decide|step|wait|you're|you|to)\b[^.!?\n]{0,350}?)?\b(?:turn|go|proceed|continue|head|page|section|p\.|pg\.)\b[^.!?\n]{0,80}?\b([0-9OoIlSsBgqHh]{1,5})\b[^.!?\n]{0,100}[.!?]?)",
    )
    .unwrap()
});

static TRAILING_CUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\s*\b(?:turn|go|proceed|continue|head)\b(?:\s+on)?(?:\s+to)?(?:\s+(?:page|section))?\s*\b[0-9OoIlSsBgqHh]{1,5}\b.*$",
    )
    .unwrap()
});
static SPACE_PUNCT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+([,.!?;:])").unwrap());
static PAGE_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bpage\b").unwrap());
static SECTION_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bsection\s+[0-9OoIlSsBgqHh]{1,5}\b").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedChoice {
    pub label: String,
    pub destination: u32,
}

/// Map an OCR destination token to a section number, or None when any
/// character fails the confusable table.
pub fn token_to_int(token: &str) -> Option<u32> {
    let mut digits = String::with_capacity(token.len());
    for c in token.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else if let Some(&(_, d)) = DIGIT_CONFUSABLES.iter().find(|(from, _)| *from == c) {
            digits.push(d);
        } else {
            return None;
        }
    }
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Scan normalized section text for "go to section N" clauses. First
/// occurrence wins per destination; output is capped and ordered by
/// appearance.
pub fn extract_choices(text: &str) -> Vec<ExtractedChoice> {
    let flat = collapse_ws(text);
    let mut found: Vec<ExtractedChoice> = Vec::new();

    for caps in CHOICE_CLAUSE_RE.captures_iter(&flat) {
        let destination = match token_to_int(&caps[2]) {
            Some(n) => n,
            None => continue,
        };
        if !(MIN_DESTINATION..=MAX_DESTINATION).contains(&destination) {
            continue;
        }
        if found.iter().any(|c| c.destination == destination) {
            continue;
        }
        found.push(ExtractedChoice {
            label: clean_choice_label(caps[1].trim(), destination),
            destination,
        });
        if found.len() >= MAX_CHOICES {
            break;
        }
    }

    found
}

/// Blank out every clause the extractor would consume, leaving the prose.
pub fn strip_choice_clauses(text: &str) -> String {
    CHOICE_CLAUSE_RE.replace_all(text, " ").into_owned()
}

pub fn clean_choice_label(clause: &str, destination: u32) -> String {
    let mut text = collapse_ws(clause);
    text = TRAILING_CUE_RE.replace(&text, "").into_owned();
    text = text
        .trim_matches([' ', ',', ';', ':', '-', '.', '_', '~'])
        .to_string();
    text = SPACE_PUNCT_RE.replace_all(&text, "$1").into_owned();
    text = PAGE_WORD_RE.replace_all(&text, "section").into_owned();
    let section_ref = format!("section {}", destination);
    text = SECTION_TOKEN_RE
        .replace_all(&text, section_ref.as_str())
        .into_owned();
    text = capitalize_first(text);

    let alpha = text.chars().filter(|c| c.is_alphabetic()).count();
    if alpha < 6 || text.chars().count() < 8 {
        text = format!("Go to section {}.", destination);
    }

    if text.chars().count() > 60 {
        text = text.chars().take(57).collect::<String>().trim_end().to_string() + "...";
    }
    text
}

fn capitalize_first(text: String) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_lowercase() => {
            first.to_uppercase().collect::<String>() + chars.as_str()
        }
        _ => text,
    }
}

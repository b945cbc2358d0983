use std::sync::LazyLock;

use regex::Regex;

use crate::store::NodeType;

static TITLE_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z']{3,}").unwrap());

// Fixed case-insensitive substring tables; matching is deliberately loose
// because the text is OCR output.
const DEATH_TERMS: &[&str] = &[
    "death",
    "die",
    "dead",
    "killed",
    "execution",
    "collapse",
    "too late",
    "never seen again",
];
const WIN_TERMS: &[&str] = &[
    "victory",
    "escape",
    "survive",
    "triumph",
    "you return",
    "you are free",
    "worth the trip",
];

const TITLE_TABLE: &[(&[&str], &str)] = &[
    (&["forest", "woods", "tree", "wolves"], "Forest Road"),
    (&["cave", "cavern", "tunnel"], "Cave Passage"),
    (
        &["river", "stream", "waterfall", "lake", "water"],
        "Crossing The Water",
    ),
    (
        &["castle", "court", "hall", "tower", "room", "dungeon", "guard"],
        "Court And Castle",
    ),
    (&["mountain", "trail", "ridge", "climb"], "Mountain Ascent"),
    (
        &["field", "meadow", "plain", "pasture"],
        "Across The Open Field",
    ),
];

/// Choice presence wins; otherwise the first keyword table hit decides,
/// death before win, neutral when nothing matches.
pub fn infer_node_type(text: &str, has_choices: bool) -> NodeType {
    if has_choices {
        return NodeType::Normal;
    }
    let lower = text.to_lowercase();
    if DEATH_TERMS.iter().any(|t| lower.contains(t)) {
        return NodeType::EndingDeath;
    }
    if WIN_TERMS.iter().any(|t| lower.contains(t)) {
        return NodeType::EndingWin;
    }
    NodeType::EndingNeutral
}

pub fn infer_title(section_number: u32, text: &str) -> String {
    let lower = text.to_lowercase();
    for (keys, title) in TITLE_TABLE {
        if keys.iter().any(|k| lower.contains(k)) {
            return (*title).to_string();
        }
    }
    if lower.contains("the end") {
        return "Journey's End".to_string();
    }

    let words: Vec<String> = TITLE_WORD_RE
        .find_iter(text)
        .take(6)
        .map(|m| capitalize(m.as_str()))
        .collect();
    if words.len() >= 3 {
        return words.join(" ");
    }
    format!("Section {}", section_number)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

use std::sync::LazyLock;

use regex::Regex;

use super::choices::strip_choice_clauses;
use super::normalize::{collapse_ws, normalize_text};

static NOISE_SYMBOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\\/_=~`|<>]{3,}").unwrap());
static PAGE_NUMBER_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^A-Za-z0-9]*\d{1,3}[^A-Za-z0-9]*$").unwrap());
static LEADING_PAGE_NUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^A-Za-z]*\d{1,3}\b[^A-Za-z]*").unwrap());
static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z]+").unwrap());
static SPACE_PUNCT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+([,.!?;:])").unwrap());

pub fn placeholder_text(section_number: u32) -> String {
    format!("[Section {} - not found in source]", section_number)
}

/// OCR garbage detector for a single line. Thresholds tuned on scanned
/// gamebook pages; a line failing any rule is dropped from the body.
pub fn is_noise_line(line: &str) -> bool {
    let stripped = line.trim();
    if stripped.is_empty() {
        return false;
    }
    if PAGE_NUMBER_LINE_RE.is_match(stripped) || NOISE_SYMBOL_RE.is_match(stripped) {
        return true;
    }

    let non_space = stripped.chars().filter(|c| *c != ' ').count();
    if non_space == 0 {
        return true;
    }
    let alpha = stripped.chars().filter(|c| c.is_alphabetic()).count();
    let alpha_ratio = alpha as f64 / non_space as f64;
    let len = stripped.chars().count();

    if len >= 10 && alpha_ratio < 0.28 {
        return true;
    }

    let words: Vec<&str> = WORD_RE.find_iter(stripped).map(|m| m.as_str()).collect();
    if words.len() >= 6 {
        let count = words.len() as f64;
        let singles = words.iter().filter(|w| w.len() == 1).count() as f64;
        if singles / count > 0.55 {
            return true;
        }
        let avg_len = words.iter().map(|w| w.len()).sum::<usize>() as f64 / count;
        let voweled = words
            .iter()
            .filter(|w| w.chars().any(|c| "aeiouAEIOU".contains(c)))
            .count() as f64;
        if avg_len < 3.2 && voweled / count < 0.65 {
            return true;
        }
        let caps = words
            .iter()
            .filter(|w| w.chars().all(|c| c.is_ascii_uppercase()))
            .count() as f64;
        if caps / count > 0.7 && voweled / count < 0.7 {
            return true;
        }
    }

    let punct = stripped
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
        .count();
    punct as f64 / len as f64 > 0.25 && alpha_ratio < 0.55
}

/// Strip extracted choice clauses and OCR noise from normalized section
/// text, then reflow the survivors into blank-line-separated paragraphs.
/// Empty results fall back to `fallback`, then to a placeholder body.
pub fn clean_prose(text: &str, section_number: u32, fallback: &str) -> String {
    if text.trim().is_empty() {
        return fallback_body(section_number, fallback);
    }

    let text = strip_choice_clauses(text);

    let mut filtered: Vec<String> = Vec::new();
    for line in text.lines() {
        let stripped = line.trim();
        if stripped.is_empty() {
            filtered.push(String::new());
            continue;
        }
        let stripped = LEADING_PAGE_NUM_RE.replace(stripped, "").trim().to_string();
        if stripped.is_empty() || is_noise_line(&stripped) {
            continue;
        }
        filtered.push(stripped);
    }

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    for line in filtered {
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }

    let cleaned: Vec<String> = paragraphs
        .iter()
        .map(|p| {
            let p = collapse_ws(p);
            let p = SPACE_PUNCT_RE.replace_all(&p, "$1").into_owned();
            p.trim_matches([' ', '-']).to_string()
        })
        .filter(|p| !p.is_empty())
        .collect();

    let cleaned = cleaned.join("\n\n");
    if cleaned.is_empty() {
        return fallback_body(section_number, fallback);
    }
    cleaned
}

fn fallback_body(section_number: u32, fallback: &str) -> String {
    let fb = normalize_text(fallback);
    let fb = fb.trim();
    if fb.is_empty() {
        placeholder_text(section_number)
    } else {
        fb.to_string()
    }
}

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

static PAGE_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^--- PAGE (\d+) ---$").unwrap());
static BARE_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{1,3}$").unwrap());
static NUMBER_PAIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}\s+\d{1,3}$").unwrap());
static NUMBER_LEAD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{1,3}\b").unwrap());

/// Minimum alphabetic characters for a page to count as parseable prose.
const USABLE_ALPHA_FLOOR: usize = 80;

/// Physical page carrying section 1 in the scanned book, one-based.
pub const DEFAULT_PAGE_OFFSET: u32 = 10;

/// Supplier of raw per-section page text. The pipeline never opens the
/// scanned book itself; everything arrives through this seam.
pub trait PageTextSource {
    /// Raw extracted text for a section, empty when no page backs it.
    fn text_for(&self, section_number: u32) -> String;

    fn looks_usable(&self, section_number: u32) -> bool {
        let text = self.text_for(section_number);
        if text.trim().is_empty() {
            return false;
        }
        text.chars().filter(|c| c.is_alphabetic()).count() >= USABLE_ALPHA_FLOOR
    }

    /// Whether a page opens with a bare section-number header, which marks
    /// it as the start of the next section rather than continuation prose.
    fn looks_like_new_section(&self, page_text: &str) -> bool {
        looks_like_section_header(page_text)
    }
}

pub fn looks_like_section_header(page_text: &str) -> bool {
    let lines = page_text.lines().map(str::trim).filter(|l| !l.is_empty());
    for line in lines.take(4) {
        let stripped = line
            .trim_start_matches(|c: char| !c.is_ascii_alphanumeric())
            .trim_end_matches(|c: char| !c.is_ascii_alphanumeric());
        if stripped.is_empty() {
            continue;
        }
        if BARE_NUMBER_RE.is_match(stripped) || NUMBER_PAIR_RE.is_match(stripped) {
            return true;
        }
        if NUMBER_LEAD_RE.is_match(stripped) && stripped.split_whitespace().count() <= 3 {
            return true;
        }
    }
    false
}

/// Page text loaded from a `--- PAGE n ---` dump file, the format the
/// book-extraction step emits. Section numbers map onto physical pages
/// through a fixed offset.
pub struct PageFileSource {
    pages: BTreeMap<u32, String>,
    page_offset: u32,
}

impl PageFileSource {
    pub fn load(path: &Path, page_offset: u32) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("missing page dump: {}", path.display()))?;
        Ok(Self::from_dump(&raw, page_offset))
    }

    pub fn from_dump(raw: &str, page_offset: u32) -> Self {
        let mut pages: BTreeMap<u32, String> = BTreeMap::new();
        let mut current: Option<u32> = None;
        let mut buf: Vec<&str> = Vec::new();

        for line in raw.lines() {
            if let Some(caps) = PAGE_MARKER_RE.captures(line.trim_end()) {
                if let Some(n) = current {
                    pages.insert(n, buf.join("\n").trim_end().to_string());
                }
                buf.clear();
                current = caps[1].parse().ok();
                continue;
            }
            if current.is_some() {
                buf.push(line);
            }
        }
        if let Some(n) = current {
            pages.insert(n, buf.join("\n").trim_end().to_string());
        }

        PageFileSource { pages, page_offset }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

impl PageTextSource for PageFileSource {
    fn text_for(&self, section_number: u32) -> String {
        let page = section_number + self.page_offset;
        self.pages.get(&page).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_parsing_maps_pages() {
        let dump = "--- PAGE 1 ---\ncover art\n\n--- PAGE 2 ---\nfirst page text\nsecond line\n\n";
        let source = PageFileSource::from_dump(dump, 0);
        assert_eq!(source.page_count(), 2);
        assert_eq!(source.text_for(2), "first page text\nsecond line");
    }

    #[test]
    fn offset_shifts_section_lookup() {
        let dump = "--- PAGE 11 ---\nsection one prose\n";
        let source = PageFileSource::from_dump(dump, 10);
        assert_eq!(source.text_for(1), "section one prose");
        assert_eq!(source.text_for(2), "");
    }

    #[test]
    fn usable_requires_alphabetic_floor() {
        let thin = "--- PAGE 11 ---\nshort\n";
        let source = PageFileSource::from_dump(thin, 10);
        assert!(!source.looks_usable(1));

        let body = format!("--- PAGE 11 ---\n{}\n", "word ".repeat(30));
        let source = PageFileSource::from_dump(&body, 10);
        assert!(source.looks_usable(1));
    }

    #[test]
    fn section_header_detection() {
        assert!(looks_like_section_header("42\nYou walk on."));
        assert!(looks_like_section_header("- 42 -\nYou walk on."));
        assert!(looks_like_section_header("12 13\nfacing pages"));
        assert!(!looks_like_section_header(
            "You continue along the road for a long time."
        ));
        assert!(!looks_like_section_header(""));
    }

    #[test]
    fn header_number_with_short_tail_counts() {
        assert!(looks_like_section_header("17 THE CAVE\nDarkness ahead."));
    }
}

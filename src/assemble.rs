use std::collections::{BTreeMap, BTreeSet, VecDeque};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::parser::choices::{extract_choices, ExtractedChoice};
use crate::parser::normalize::normalize_text;
use crate::parser::{self, SectionDraft};
use crate::source::PageTextSource;
use crate::store::{Node, NodeType, MAX_CHOICES};

pub struct AssembleConfig {
    /// Section the book starts on.
    pub entry_section: u32,
    /// Safety cap on total assembled sections.
    pub max_nodes: usize,
    /// How many follow-on pages a choiceless section may absorb.
    pub max_continuation: u32,
}

impl Default for AssembleConfig {
    fn default() -> Self {
        AssembleConfig {
            entry_section: 1,
            max_nodes: 200,
            max_continuation: 2,
        }
    }
}

/// Expand a FIFO frontier of section numbers into parsed drafts. Seeded
/// from the prior snapshot plus the entry section; grows by following
/// extracted destinations whose pages look usable. Dangling references
/// that survive this stage are the repairer's problem, not ours.
pub fn assemble(
    source: &dyn PageTextSource,
    prior: &[Node],
    config: &AssembleConfig,
) -> BTreeMap<u32, SectionDraft> {
    let prior_by_section: BTreeMap<u32, &Node> = prior
        .iter()
        .filter(|n| n.section_number > 0)
        .map(|n| (n.section_number, n))
        .collect();

    let mut seeds: BTreeSet<u32> = prior_by_section.keys().copied().collect();
    if source.looks_usable(config.entry_section) {
        seeds.insert(config.entry_section);
    }

    let mut queue: VecDeque<u32> = seeds.into_iter().collect();
    let mut drafts: BTreeMap<u32, SectionDraft> = BTreeMap::new();

    let pb = ProgressBar::new(config.max_nodes as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} sections")
            .unwrap()
            .progress_chars("=> "),
    );

    while drafts.len() < config.max_nodes {
        let section = match queue.pop_front() {
            Some(s) => s,
            None => break,
        };
        if drafts.contains_key(&section) {
            continue;
        }

        let prior_node = prior_by_section.get(&section).copied();
        let draft = assemble_section(source, section, prior_node, config);

        for choice in &draft.choices {
            let dest = choice.destination;
            if drafts.contains_key(&dest) || queue.contains(&dest) {
                continue;
            }
            if prior_by_section.contains_key(&dest) || source.looks_usable(dest) {
                queue.push_back(dest);
            }
        }

        drafts.insert(section, draft);
        pb.inc(1);
    }
    if !queue.is_empty() {
        warn!(
            "section cap {} reached with {} sections still queued",
            config.max_nodes,
            queue.len()
        );
    }

    // Recovery pass: a destination skipped earlier may still have a usable
    // page; keep folding such sections in until a full scan adds nothing.
    loop {
        let missing: BTreeSet<u32> = drafts
            .values()
            .flat_map(|d| d.choices.iter().map(|c| c.destination))
            .filter(|d| !drafts.contains_key(d))
            .collect();
        if missing.is_empty() || drafts.len() >= config.max_nodes {
            break;
        }

        let mut added = false;
        for dest in missing {
            if drafts.len() >= config.max_nodes {
                break;
            }
            if source.looks_usable(dest) {
                let prior_node = prior_by_section.get(&dest).copied();
                let draft = assemble_section(source, dest, prior_node, config);
                drafts.insert(dest, draft);
                info!("added missing destination section {} from source", dest);
                added = true;
            }
        }
        if !added {
            break;
        }
    }

    pb.finish_and_clear();
    drafts
}

fn assemble_section(
    source: &dyn PageTextSource,
    section: u32,
    prior: Option<&Node>,
    config: &AssembleConfig,
) -> SectionDraft {
    let raw = source.text_for(section);
    let mut combined = normalize_text(&raw);
    let mut has_choices = !extract_choices(&combined).is_empty();

    // A section's prose can spill across a physical page break; absorb
    // follow-on pages while the text is truncated mid-story.
    if !combined.trim().is_empty() {
        for step in 1..=config.max_continuation {
            if has_choices || combined.to_lowercase().contains("the end") {
                break;
            }
            let continuation = source.text_for(section + step);
            if continuation.trim().is_empty() || source.looks_like_new_section(&continuation) {
                break;
            }
            combined.push('\n');
            combined.push_str(&normalize_text(&continuation));
            has_choices = !extract_choices(&combined).is_empty();
        }
    }

    let fallback_text = prior.map(|n| n.text.as_str()).unwrap_or("");
    let mut draft = parser::parse_section(section, &combined, fallback_text);

    // Page gave us nothing; trust the snapshot's destinations rather than
    // downgrading a previously linked section to an ending.
    if draft.choices.is_empty() && !draft.text.to_lowercase().contains("the end") {
        if let Some(prior_node) = prior {
            let dests = prior_destinations(prior_node);
            if !dests.is_empty() {
                draft.choices = dests
                    .into_iter()
                    .map(|d| ExtractedChoice {
                        label: format!("Go to section {}.", d),
                        destination: d,
                    })
                    .collect();
                draft.node_type = NodeType::Normal;
            }
        }
    }

    draft
}

fn prior_destinations(node: &Node) -> Vec<u32> {
    let mut out: Vec<u32> = Vec::new();
    for choice in &node.choices {
        if let Some(dest) = choice.destination_number() {
            if !out.contains(&dest) {
                out.push(dest);
            }
        }
    }
    out.truncate(MAX_CHOICES);
    out
}

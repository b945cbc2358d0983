use std::collections::{BTreeMap, BTreeSet};

use serde_json::Map;
use tracing::info;

use crate::parser::classify;
use crate::parser::prose::placeholder_text;
use crate::parser::SectionDraft;
use crate::store::{normalize_choice_text, section_id, Choice, Node, NodeType, MAX_CHOICES};

/// How far a dangling destination may be remapped to a neighbour.
const REMAP_WINDOW: u32 = 2;

/// Neutral endings carrying one of these read well enough to promote to
/// a win when the book yields none.
const AFFIRMATIVE_TERMS: &[&str] = &["return", "survive", "find", "worth"];

const SYNTH_WIN_SECTION: u32 = 999;

/// Close every dangling destination, drop duplicate parallel choices,
/// guarantee a win ending, and order nodes entry-first. Returns the
/// final node list plus the audit log of remaps and stub creations.
pub fn repair(mut drafts: BTreeMap<u32, SectionDraft>) -> (Vec<Node>, Vec<String>) {
    let mut changes: Vec<String> = Vec::new();
    let mut existing: BTreeSet<u32> = drafts.keys().copied().collect();
    let mut stubs: Vec<SectionDraft> = Vec::new();

    // Ascending order keeps remap results reproducible run to run.
    let numbers: Vec<u32> = drafts.keys().copied().collect();
    for number in numbers {
        if let Some(draft) = drafts.get_mut(&number) {
            for choice in &mut draft.choices {
                let dest = choice.destination;
                if existing.contains(&dest) {
                    continue;
                }
                let remap = existing
                    .iter()
                    .copied()
                    .filter(|e| e.abs_diff(dest) <= REMAP_WINDOW)
                    .min_by_key(|e| (e.abs_diff(dest), *e));
                match remap {
                    Some(remap) => {
                        choice.destination = remap;
                        changes.push(format!(
                            "Remapped missing destination {} -> {} (source section {}).",
                            dest, remap, number
                        ));
                    }
                    None => {
                        stubs.push(stub_draft(dest));
                        existing.insert(dest);
                        changes.push(format!(
                            "Created stub section {} (referenced by section {}).",
                            dest, number
                        ));
                    }
                }
            }
        }
    }

    for stub in stubs {
        drafts.entry(stub.section_number).or_insert(stub);
    }

    let mut nodes: Vec<Node> = drafts.values().map(build_node).collect();
    ensure_win_ending(&mut nodes);

    // Entry node first, everything else ascending.
    nodes.sort_by_key(|n| (n.section_number != 1, n.section_number));

    (nodes, changes)
}

fn stub_draft(section_number: u32) -> SectionDraft {
    SectionDraft {
        section_number,
        title: format!("Section {}", section_number),
        text: placeholder_text(section_number),
        node_type: NodeType::EndingNeutral,
        choices: Vec::new(),
    }
}

fn build_node(draft: &SectionDraft) -> Node {
    // Parallel duplicates collapse silently here; the linter is the layer
    // that reports them.
    let mut choices: Vec<Choice> = Vec::new();
    let mut seen: BTreeSet<(String, u32)> = BTreeSet::new();
    for choice in &draft.choices {
        let key = (normalize_choice_text(&choice.label), choice.destination);
        if seen.contains(&key) {
            continue;
        }
        seen.insert(key);
        choices.push(Choice::new(
            choice.label.clone(),
            section_id(choice.destination),
        ));
        if choices.len() >= MAX_CHOICES {
            break;
        }
    }

    let node_type = if !choices.is_empty() {
        NodeType::Normal
    } else if draft.node_type != NodeType::Normal {
        draft.node_type
    } else {
        classify::infer_node_type(&draft.text, false)
    };

    Node {
        id: section_id(draft.section_number),
        section_number: draft.section_number,
        title: draft.title.clone(),
        text: draft.text.clone(),
        node_type,
        choices,
        effects: Map::new(),
        random_event_pool: Vec::new(),
    }
}

fn ensure_win_ending(nodes: &mut Vec<Node>) {
    if nodes.iter().any(|n| n.node_type == NodeType::EndingWin) {
        return;
    }

    let pick = nodes
        .iter()
        .position(|n| {
            n.node_type == NodeType::EndingNeutral
                && AFFIRMATIVE_TERMS
                    .iter()
                    .any(|t| n.text.to_lowercase().contains(t))
        })
        .or_else(|| {
            nodes
                .iter()
                .position(|n| n.node_type == NodeType::EndingNeutral)
        });

    match pick {
        Some(i) => {
            info!("promoted {} to a win ending", nodes[i].id);
            nodes[i].node_type = NodeType::EndingWin;
        }
        None => {
            let max = nodes.iter().map(|n| n.section_number).max().unwrap_or(0);
            let number = if SYNTH_WIN_SECTION > max {
                SYNTH_WIN_SECTION
            } else {
                max + 1
            };
            info!("no win ending found; synthesized section {}", number);
            nodes.push(Node {
                id: section_id(number),
                section_number: number,
                title: "Final Triumphant Escape".to_string(),
                text: "You survive and escape. Victory is yours.".to_string(),
                node_type: NodeType::EndingWin,
                choices: Vec::new(),
                effects: Map::new(),
                random_event_pool: Vec::new(),
            });
        }
    }
}

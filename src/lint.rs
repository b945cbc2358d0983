use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::Path;

use crate::store::{self, normalize_choice_text, Node, NodeType, MAX_CHOICES};

/// Characters expected in cleaned prose; anything else counts as OCR
/// noise for the quality gate.
const ALLOWED_EXTRA: &str = " \t\n\r.,!?;:'\"()-[]{}_/\\@#$%^&*+=<>|`~\u{20ac}\u{a3}";

pub struct LintOptions {
    pub min_reachable_ratio: f64,
    pub max_noise_ratio: f64,
    pub fix: bool,
}

impl Default for LintOptions {
    fn default() -> Self {
        LintOptions {
            min_reachable_ratio: 0.15,
            max_noise_ratio: 0.03,
            fix: false,
        }
    }
}

/// Duplicate choices per node, keyed by (normalized label, destination).
/// Returns the offending (node id, label, destination) triples.
pub fn choice_duplicates(nodes: &[Node]) -> Vec<(String, String, String)> {
    let mut dups = Vec::new();
    for node in nodes {
        let mut seen: HashSet<(String, String)> = HashSet::new();
        for choice in &node.choices {
            let key = (normalize_choice_text(&choice.text), choice.next.clone());
            if seen.contains(&key) {
                dups.push((node.id.clone(), choice.text.clone(), choice.next.clone()));
            } else {
                seen.insert(key);
            }
        }
    }
    dups
}

/// Remove later duplicates and cap each node at the choice limit.
/// Returns how many choices were dropped.
pub fn fix_duplicate_choices(nodes: &mut [Node]) -> usize {
    let mut removed = 0;
    for node in nodes {
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let before = node.choices.len();
        node.choices.retain(|choice| {
            let key = (normalize_choice_text(&choice.text), choice.next.clone());
            if seen.contains(&key) {
                false
            } else {
                seen.insert(key);
                true
            }
        });
        node.choices.truncate(MAX_CHOICES);
        removed += before - node.choices.len();
    }
    removed
}

/// BFS over valid `next` edges from the entry node (first in persisted
/// order). Edges pointing outside the node set are ignored.
pub fn reachable_ratio(nodes: &[Node]) -> (f64, usize, usize) {
    if nodes.is_empty() {
        return (0.0, 0, 0);
    }
    let reached = reachable_set(nodes);
    (reached.len() as f64 / nodes.len() as f64, reached.len(), nodes.len())
}

fn valid_edges(nodes: &[Node]) -> HashMap<&str, Vec<&str>> {
    let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    nodes
        .iter()
        .map(|n| {
            let edges: Vec<&str> = n
                .choices
                .iter()
                .map(|c| c.next.as_str())
                .filter(|next| ids.contains(next))
                .collect();
            (n.id.as_str(), edges)
        })
        .collect()
}

fn reachable_set(nodes: &[Node]) -> HashSet<String> {
    let graph = valid_edges(nodes);
    let entry = nodes[0].id.as_str();
    let mut seen: HashSet<String> = HashSet::from([entry.to_string()]);
    let mut queue: VecDeque<&str> = VecDeque::from([entry]);
    while let Some(current) = queue.pop_front() {
        for next in graph.get(current).into_iter().flatten() {
            if !seen.contains(*next) {
                seen.insert((*next).to_string());
                queue.push_back(*next);
            }
        }
    }
    seen
}

/// Highest per-node fraction of characters outside the allow-list,
/// with the node carrying it.
pub fn max_noise_ratio(nodes: &[Node]) -> (f64, String) {
    let mut max_ratio = 0.0;
    let mut max_node = String::new();
    for node in nodes {
        let len = node.text.chars().count();
        if len == 0 {
            continue;
        }
        let bad = node
            .text
            .chars()
            .filter(|c| !c.is_ascii_alphanumeric() && !ALLOWED_EXTRA.contains(*c))
            .count();
        let ratio = bad as f64 / len as f64;
        if ratio > max_ratio {
            max_ratio = ratio;
            max_node = node.id.clone();
        }
    }
    (max_ratio, max_node)
}

/// Load, optionally fix, check, report. Returns the process exit code:
/// 0 all checks pass, 1 a check failed, 2 the store could not be loaded.
pub fn run(story_path: &Path, options: &LintOptions) -> i32 {
    let mut nodes = match store::load_nodes(story_path) {
        Ok(nodes) => nodes,
        Err(e) => {
            println!("ERROR: {}", e);
            return 2;
        }
    };

    if options.fix {
        let removed = fix_duplicate_choices(&mut nodes);
        if removed > 0 {
            if let Err(e) = store::save_nodes(story_path, &nodes) {
                println!("ERROR: {}", e);
                return 2;
            }
            println!(
                "FIXED: removed {} duplicate choices in {}",
                removed,
                story_path.display()
            );
        }
    }

    let duplicates = choice_duplicates(&nodes);
    let (ratio, reachable, total) = reachable_ratio(&nodes);
    let (noise_ratio, noisy_node) = max_noise_ratio(&nodes);

    let mut failed = false;
    if duplicates.is_empty() {
        println!("PASS: no duplicate choices");
    } else {
        failed = true;
        println!("FAIL: duplicate choices detected ({} total)", duplicates.len());
        for (id, text, next) in &duplicates {
            println!("  {}: \"{}\" -> {}", id, text, next);
        }
    }

    if ratio < options.min_reachable_ratio {
        failed = true;
        println!(
            "FAIL: reachable ratio {:.3} is below threshold {:.3} ({}/{})",
            ratio, options.min_reachable_ratio, reachable, total
        );
    } else {
        println!(
            "PASS: reachable ratio {:.3} meets threshold {:.3} ({}/{})",
            ratio, options.min_reachable_ratio, reachable, total
        );
    }

    if noise_ratio > options.max_noise_ratio {
        failed = true;
        println!(
            "FAIL: max noise ratio {:.3} exceeds threshold {:.3} (node {})",
            noise_ratio, options.max_noise_ratio, noisy_node
        );
    } else {
        println!(
            "PASS: max noise ratio {:.3} within threshold {:.3} (node {})",
            noise_ratio, options.max_noise_ratio, noisy_node
        );
    }

    if failed {
        1
    } else {
        0
    }
}

// ── Summary ──

pub struct GraphSummary {
    pub total_nodes: usize,
    pub total_choices: usize,
    pub win_count: usize,
    pub death_count: usize,
    pub neutral_count: usize,
    pub avg_choices: f64,
    pub depth: usize,
    pub unreachable: Vec<String>,
}

pub fn summarize(nodes: &[Node]) -> GraphSummary {
    let total_choices = nodes.iter().map(|n| n.choices.len()).sum();
    let count_type =
        |t: NodeType| nodes.iter().filter(|n| n.node_type == t).count();

    let normal_nodes: Vec<&Node> = nodes
        .iter()
        .filter(|n| n.node_type == NodeType::Normal)
        .collect();
    let avg_choices = if normal_nodes.is_empty() {
        0.0
    } else {
        normal_nodes.iter().map(|n| n.choices.len()).sum::<usize>() as f64
            / normal_nodes.len() as f64
    };

    let (depth, unreachable) = if nodes.is_empty() {
        (0, Vec::new())
    } else {
        let reached = reachable_set(nodes);
        let all: BTreeSet<String> = nodes.iter().map(|n| n.id.clone()).collect();
        let unreachable: Vec<String> =
            all.into_iter().filter(|id| !reached.contains(id)).collect();
        (bfs_depth(nodes), unreachable)
    };

    GraphSummary {
        total_nodes: nodes.len(),
        total_choices,
        win_count: count_type(NodeType::EndingWin),
        death_count: count_type(NodeType::EndingDeath),
        neutral_count: count_type(NodeType::EndingNeutral),
        avg_choices,
        depth,
        unreachable,
    }
}

fn bfs_depth(nodes: &[Node]) -> usize {
    let graph = valid_edges(nodes);
    let entry = nodes[0].id.as_str();
    let mut seen: HashSet<&str> = HashSet::from([entry]);
    let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(entry, 0)]);
    let mut max_depth = 0;
    while let Some((current, depth)) = queue.pop_front() {
        max_depth = max_depth.max(depth);
        for next in graph.get(current).into_iter().flatten() {
            if !seen.contains(*next) {
                seen.insert(*next);
                queue.push_back((*next, depth + 1));
            }
        }
    }
    max_depth
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{section_id, Choice};
    use serde_json::Map;
    use std::path::PathBuf;

    fn node(n: u32, node_type: NodeType, dests: &[u32]) -> Node {
        Node {
            id: section_id(n),
            section_number: n,
            title: format!("Section {}", n),
            text: "Plain readable text.".to_string(),
            node_type: if dests.is_empty() {
                node_type
            } else {
                NodeType::Normal
            },
            choices: dests
                .iter()
                .map(|d| Choice::new(format!("Go to section {}.", d), section_id(*d)))
                .collect(),
            effects: Map::new(),
            random_event_pool: Vec::new(),
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("gamebook_lint_{}_{}.json", name, std::process::id()))
    }

    #[test]
    fn duplicates_reported_then_fixed() {
        let mut nodes = vec![node(1, NodeType::Normal, &[2]), node(2, NodeType::EndingWin, &[])];
        nodes[0].choices = vec![
            Choice::new("Go north".to_string(), "section_2".to_string()),
            Choice::new("go NORTH".to_string(), "section_2".to_string()),
        ];

        assert_eq!(choice_duplicates(&nodes).len(), 1);
        assert_eq!(fix_duplicate_choices(&mut nodes), 1);
        assert!(choice_duplicates(&nodes).is_empty());
        // Idempotent: a second pass removes nothing.
        assert_eq!(fix_duplicate_choices(&mut nodes), 0);
    }

    #[test]
    fn fix_caps_choice_count() {
        let mut nodes = vec![node(1, NodeType::Normal, &[2, 3, 4, 5, 6, 7])];
        let removed = fix_duplicate_choices(&mut nodes);
        assert_eq!(removed, 2);
        assert_eq!(nodes[0].choices.len(), MAX_CHOICES);
    }

    #[test]
    fn chain_is_fully_reachable() {
        let nodes = vec![
            node(1, NodeType::Normal, &[2]),
            node(2, NodeType::Normal, &[3]),
            node(3, NodeType::EndingWin, &[]),
        ];
        let (ratio, reached, total) = reachable_ratio(&nodes);
        assert_eq!(ratio, 1.0);
        assert_eq!((reached, total), (3, 3));
    }

    #[test]
    fn orphan_lowers_ratio() {
        let nodes = vec![
            node(1, NodeType::Normal, &[2]),
            node(2, NodeType::EndingWin, &[]),
            node(3, NodeType::EndingNeutral, &[]),
        ];
        let (ratio, reached, total) = reachable_ratio(&nodes);
        assert_eq!((reached, total), (2, 3));
        assert!((ratio - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn dangling_edges_ignored_for_reachability() {
        let nodes = vec![node(1, NodeType::Normal, &[99]), node(2, NodeType::EndingWin, &[])];
        let (_, reached, total) = reachable_ratio(&nodes);
        assert_eq!((reached, total), (1, 2));
    }

    #[test]
    fn noise_ratio_flags_bad_node() {
        let mut nodes = vec![node(1, NodeType::EndingWin, &[]), node(2, NodeType::EndingNeutral, &[])];
        nodes[1].text = "abcdefg \u{25cf}\u{25cf}\u{25cf}".to_string();
        let (ratio, id) = max_noise_ratio(&nodes);
        assert_eq!(id, "section_2");
        assert!((ratio - 3.0 / 11.0).abs() < 1e-9);
    }

    #[test]
    fn clean_text_has_zero_noise() {
        let nodes = vec![node(1, NodeType::EndingWin, &[])];
        let (ratio, _) = max_noise_ratio(&nodes);
        assert_eq!(ratio, 0.0);
    }

    #[test]
    fn run_returns_two_on_missing_store() {
        let code = run(Path::new("no_such_story_file.json"), &LintOptions::default());
        assert_eq!(code, 2);
    }

    #[test]
    fn run_fix_mode_clears_duplicate_failure() {
        let path = temp_path("fix_mode");
        let mut nodes = vec![node(1, NodeType::Normal, &[2]), node(2, NodeType::EndingWin, &[])];
        nodes[0].choices = vec![
            Choice::new("Go north".to_string(), "section_2".to_string()),
            Choice::new("go north!".to_string(), "section_2".to_string()),
        ];
        store::save_nodes(&path, &nodes).unwrap();

        let failing = run(&path, &LintOptions::default());
        assert_eq!(failing, 1);

        let fixed = run(
            &path,
            &LintOptions {
                fix: true,
                ..LintOptions::default()
            },
        );
        assert_eq!(fixed, 0);

        // The rewritten store stays clean on a second pass.
        let clean = run(&path, &LintOptions::default());
        std::fs::remove_file(&path).ok();
        assert_eq!(clean, 0);
    }

    #[test]
    fn summary_counts_and_depth() {
        let nodes = vec![
            node(1, NodeType::Normal, &[2]),
            node(2, NodeType::Normal, &[3]),
            node(3, NodeType::EndingWin, &[]),
            node(4, NodeType::EndingDeath, &[]),
        ];
        let summary = summarize(&nodes);
        assert_eq!(summary.total_nodes, 4);
        assert_eq!(summary.total_choices, 2);
        assert_eq!(summary.win_count, 1);
        assert_eq!(summary.death_count, 1);
        assert_eq!(summary.neutral_count, 0);
        assert_eq!(summary.depth, 2);
        assert_eq!(summary.unreachable, vec!["section_4".to_string()]);
        assert!((summary.avg_choices - 1.0).abs() < 1e-9);
    }
}

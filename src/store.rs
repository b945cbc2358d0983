use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::parser::classify;

static NON_ALNUM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Hard cap on outgoing choices per node; UI numbering relies on it.
pub const MAX_CHOICES: usize = 4;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("story file not found: {0}")]
    Missing(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("story root must be a JSON array: {0}")]
    NotAnArray(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Normal,
    EndingWin,
    EndingDeath,
    EndingNeutral,
}

impl NodeType {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Normal => "normal",
            NodeType::EndingWin => "ending_win",
            NodeType::EndingDeath => "ending_death",
            NodeType::EndingNeutral => "ending_neutral",
        }
    }

    pub fn parse(s: &str) -> Option<NodeType> {
        match s {
            "normal" => Some(NodeType::Normal),
            "ending_win" => Some(NodeType::EndingWin),
            "ending_death" => Some(NodeType::EndingDeath),
            "ending_neutral" => Some(NodeType::EndingNeutral),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Choice {
    pub text: String,
    pub next: String,
    pub requires: Map<String, Value>,
    pub effects: Map<String, Value>,
}

impl Choice {
    pub fn new(text: String, next: String) -> Self {
        Choice {
            text,
            next,
            requires: Map::new(),
            effects: Map::new(),
        }
    }

    /// Numeric destination when `next` follows the canonical id scheme.
    pub fn destination_number(&self) -> Option<u32> {
        self.next.strip_prefix("section_")?.parse().ok()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub id: String,
    pub section_number: u32,
    pub title: String,
    pub text: String,
    pub node_type: NodeType,
    pub choices: Vec<Choice>,
    pub effects: Map<String, Value>,
    pub random_event_pool: Vec<Value>,
}

pub fn section_id(section_number: u32) -> String {
    format!("section_{}", section_number)
}

/// Key used when comparing choice labels: lowercased, punctuation runs
/// collapsed to single spaces.
pub fn normalize_choice_text(text: &str) -> String {
    NON_ALNUM_RE
        .replace_all(&text.to_lowercase(), " ")
        .trim()
        .to_string()
}

// ── Load ──

#[derive(Deserialize)]
struct RawChoice {
    #[serde(default)]
    text: String,
    #[serde(default)]
    next: String,
    #[serde(default)]
    requires: Map<String, Value>,
    #[serde(default)]
    effects: Map<String, Value>,
}

#[derive(Deserialize)]
struct RawNode {
    #[serde(default)]
    id: String,
    #[serde(default)]
    section_number: u32,
    #[serde(default)]
    title: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    node_type: String,
    #[serde(default)]
    choices: Vec<RawChoice>,
    #[serde(default)]
    effects: Map<String, Value>,
    #[serde(default)]
    random_event_pool: Vec<Value>,
}

/// Load the persisted node list. Missing file and malformed container are
/// hard errors; per-node oddities (missing id, unknown node_type) are
/// repaired in place and logged, never fatal.
pub fn load_nodes(path: &Path) -> Result<Vec<Node>, StoreError> {
    if !path.exists() {
        return Err(StoreError::Missing(path.display().to_string()));
    }
    let raw = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let value: Value = serde_json::from_str(&raw).map_err(|source| StoreError::Json {
        path: path.display().to_string(),
        source,
    })?;
    let items = match value.as_array() {
        Some(items) => items,
        None => return Err(StoreError::NotAnArray(path.display().to_string())),
    };

    let mut nodes = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<RawNode>(item.clone()) {
            Ok(raw_node) => {
                if let Some(node) = finish_node(raw_node) {
                    nodes.push(node);
                }
            }
            Err(e) => warn!("skipping malformed node entry: {}", e),
        }
    }
    Ok(nodes)
}

fn finish_node(raw: RawNode) -> Option<Node> {
    let mut section_number = raw.section_number;
    let mut id = raw.id.trim().to_string();
    if id.is_empty() {
        if section_number == 0 {
            warn!("skipping node with no id and no section number");
            return None;
        }
        id = section_id(section_number);
    }
    if section_number == 0 {
        section_number = id
            .strip_prefix("section_")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
    }

    let choices: Vec<Choice> = raw
        .choices
        .into_iter()
        .filter(|c| !c.next.trim().is_empty())
        .map(|c| Choice {
            text: c.text,
            next: c.next.trim().to_string(),
            requires: c.requires,
            effects: c.effects,
        })
        .collect();

    // A node is `normal` exactly when it has outgoing choices; anything
    // persisted in violation gets reclassified from its text.
    let node_type = if !choices.is_empty() {
        NodeType::Normal
    } else {
        match NodeType::parse(&raw.node_type) {
            Some(NodeType::Normal) | None => classify::infer_node_type(&raw.text, false),
            Some(t) => t,
        }
    };

    Some(Node {
        id,
        section_number,
        title: raw.title,
        text: raw.text,
        node_type,
        choices,
        effects: raw.effects,
        random_event_pool: raw.random_event_pool,
    })
}

// ── Save ──

/// Whole-file overwrite of the node list as pretty-printed JSON.
pub fn save_nodes(path: &Path, nodes: &[Node]) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(nodes).map_err(|source| StoreError::Json {
        path: path.display().to_string(),
        source,
    })?;
    fs::write(path, json + "\n").map_err(|source| StoreError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("gamebook_ingest_{}_{}.json", name, std::process::id()))
    }

    fn sample_node(n: u32, node_type: NodeType, choices: Vec<Choice>) -> Node {
        Node {
            id: section_id(n),
            section_number: n,
            title: format!("Section {}", n),
            text: "You stand at a crossroads.".to_string(),
            node_type,
            choices,
            effects: Map::new(),
            random_event_pool: Vec::new(),
        }
    }

    #[test]
    fn round_trip() {
        let path = temp_path("round_trip");
        let nodes = vec![
            sample_node(
                1,
                NodeType::Normal,
                vec![Choice::new("Go north.".into(), "section_2".into())],
            ),
            sample_node(2, NodeType::EndingWin, vec![]),
        ];
        save_nodes(&path, &nodes).unwrap();
        let loaded = load_nodes(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, "section_1");
        assert_eq!(loaded[0].choices[0].next, "section_2");
        assert_eq!(loaded[1].node_type, NodeType::EndingWin);
    }

    #[test]
    fn missing_file() {
        let err = load_nodes(Path::new("does_not_exist_story.json")).unwrap_err();
        assert!(matches!(err, StoreError::Missing(_)));
    }

    #[test]
    fn malformed_json() {
        let path = temp_path("malformed");
        std::fs::write(&path, "{not json").unwrap();
        let err = load_nodes(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, StoreError::Json { .. }));
    }

    #[test]
    fn root_must_be_array() {
        let path = temp_path("not_array");
        std::fs::write(&path, "{\"id\": \"section_1\"}").unwrap();
        let err = load_nodes(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, StoreError::NotAnArray(_)));
    }

    #[test]
    fn unknown_node_type_reclassified() {
        let path = temp_path("unknown_type");
        std::fs::write(
            &path,
            r#"[{"id": "section_3", "section_number": 3, "title": "", "text": "You are killed instantly.", "node_type": "mystery", "choices": []}]"#,
        )
        .unwrap();
        let loaded = load_nodes(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded[0].node_type, NodeType::EndingDeath);
    }

    #[test]
    fn normal_without_choices_demoted() {
        let path = temp_path("normal_no_choices");
        std::fs::write(
            &path,
            r#"[{"id": "section_9", "section_number": 9, "text": "The road simply ends.", "node_type": "normal", "choices": []}]"#,
        )
        .unwrap();
        let loaded = load_nodes(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded[0].node_type, NodeType::EndingNeutral);
    }

    #[test]
    fn id_minted_from_section_number() {
        let path = temp_path("minted_id");
        std::fs::write(
            &path,
            r#"[{"section_number": 7, "text": "", "node_type": "ending_neutral", "choices": []}]"#,
        )
        .unwrap();
        let loaded = load_nodes(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded[0].id, "section_7");
    }

    #[test]
    fn destination_number_parses_canonical_ids() {
        let c = Choice::new("Go.".into(), "section_42".into());
        assert_eq!(c.destination_number(), Some(42));
        let c = Choice::new("Go.".into(), "elsewhere".into());
        assert_eq!(c.destination_number(), None);
    }
}

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::store::{Choice, Node};

/// Read-side view over a validated node list for the gameplay layer:
/// entry lookup, id resolution, and requirement-filtered choices.
pub struct StoryIndex {
    nodes: Vec<Node>,
    by_id: HashMap<String, usize>,
}

impl StoryIndex {
    pub fn new(mut nodes: Vec<Node>) -> Self {
        nodes.sort_by(|a, b| {
            (a.section_number, &a.id).cmp(&(b.section_number, &b.id))
        });
        let by_id = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();
        StoryIndex { nodes, by_id }
    }

    pub fn entry_node(&self) -> Option<&Node> {
        if let Some(&i) = self.by_id.get("section_1") {
            return Some(&self.nodes[i]);
        }
        self.nodes.first()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.by_id.get(id).map(|&i| &self.nodes[i])
    }

    pub fn node_exists(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Choices whose `requires` map is satisfied by the given stats.
    pub fn available_choices<'a>(
        &self,
        node: &'a Node,
        stats: &Map<String, Value>,
    ) -> Vec<&'a Choice> {
        node.choices
            .iter()
            .filter(|c| requirements_met(&c.requires, stats))
            .collect()
    }
}

/// Every rule in `requires` must hold; a stat missing from the context
/// fails its rule. An empty map always passes.
pub fn requirements_met(requires: &Map<String, Value>, stats: &Map<String, Value>) -> bool {
    requires.iter().all(|(key, rule)| {
        stats
            .get(key)
            .is_some_and(|current| rule_satisfied(current, rule))
    })
}

fn rule_satisfied(current: &Value, rule: &Value) -> bool {
    match rule {
        Value::Object(rule) => {
            let mut checks: Vec<bool> = Vec::new();
            if let Some(v) = rule.get("min") {
                checks.push(as_int(current) >= as_int(v));
            }
            if let Some(v) = rule.get("max") {
                checks.push(as_int(current) <= as_int(v));
            }
            if let Some(v) = rule.get("gt") {
                checks.push(as_int(current) > as_int(v));
            }
            if let Some(v) = rule.get("gte") {
                checks.push(as_int(current) >= as_int(v));
            }
            if let Some(v) = rule.get("lt") {
                checks.push(as_int(current) < as_int(v));
            }
            if let Some(v) = rule.get("lte") {
                checks.push(as_int(current) <= as_int(v));
            }
            if let Some(v) = rule.get("eq") {
                checks.push(current == v);
            }
            if let Some(v) = rule.get("ne") {
                checks.push(current != v);
            }
            if let Some(Value::Array(options)) = rule.get("in") {
                checks.push(options.contains(current));
            }
            if let Some(Value::Array(options)) = rule.get("not_in") {
                checks.push(!options.contains(current));
            }
            checks.into_iter().all(|c| c)
        }
        Value::Bool(b) => truthy(current) == *b,
        // Bare number means minimum required value.
        Value::Number(_) => as_int(current) >= as_int(rule),
        other => current == other,
    }
}

fn as_int(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::Bool(b) => i64::from(*b),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

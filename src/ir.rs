use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::LineageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Horizontal,
    Vertical,
}

impl Direction {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "horizontal" | "lr" => Some(Self::Horizontal),
            "vertical" | "td" | "tb" => Some(Self::Vertical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeSize {
    pub width: f32,
    pub height: f32,
}

impl NodeSize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// A user supplied node. Field names accept the `f`-prefixed spelling used by
/// lineage payloads produced for the web component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNode {
    #[serde(default, alias = "fData")]
    pub data: serde_json::Value,
    #[serde(default, alias = "fChildren")]
    /// Kept in input order; it decides display order and which items overflow.
    pub children: IndexMap<String, RawNode>,
    #[serde(default, alias = "fHideChildren")]
    pub hide_children: bool,
    #[serde(default, alias = "fNodeTemplate")]
    pub template: Option<String>,
}

impl RawNode {
    pub fn with_data(data: serde_json::Value) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawLink {
    pub source: String,
    pub target: String,
}

impl RawLink {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineageData {
    #[serde(default)]
    pub nodes: BTreeMap<String, RawNode>,
    #[serde(default)]
    pub links: Vec<RawLink>,
}

impl LineageData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure_node(&mut self, id: &str) -> &mut RawNode {
        self.nodes.entry(id.to_string()).or_default()
    }

    pub fn link(&mut self, source: &str, target: &str) {
        self.ensure_node(source);
        self.ensure_node(target);
        self.links.push(RawLink::new(source, target));
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() || self.links.is_empty()
    }
}

pub fn parse_lineage(input: &str) -> Result<LineageData, LineageError> {
    match serde_json::from_str(input) {
        Ok(data) => Ok(data),
        Err(json_err) => json5::from_str(input).map_err(|json5_err| LineageError::Input {
            message: format!("{json_err}; as json5: {json5_err}"),
        }),
    }
}

pub fn load_lineage(path: &Path) -> Result<LineageData, LineageError> {
    let contents = std::fs::read_to_string(path).map_err(|source| LineageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_lineage(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefixed_node_fields() {
        let input = r#"{
            "nodes": {
                "orders": {
                    "fData": { "owner": "sales" },
                    "fChildren": { "orders.id": {}, "orders.total": {} },
                    "fHideChildren": true
                },
                "report": {}
            },
            "links": [{ "source": "orders", "target": "report" }]
        }"#;
        let data = parse_lineage(input).expect("parse failed");
        let orders = &data.nodes["orders"];
        assert_eq!(orders.data["owner"], "sales");
        assert_eq!(orders.children.len(), 2);
        assert!(orders.hide_children);
        assert_eq!(data.links, vec![RawLink::new("orders", "report")]);
    }

    #[test]
    fn attached_children_keep_input_order() {
        let input = r#"{
            "nodes": {
                "t": { "fChildren": { "zeta": {}, "alpha": {}, "col10": {}, "col2": {} } }
            },
            "links": []
        }"#;
        let data = parse_lineage(input).expect("parse failed");
        let order: Vec<&str> = data.nodes["t"].children.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["zeta", "alpha", "col10", "col2"]);

        let relaxed = parse_lineage("{ nodes: { t: { children: { b: {}, a: {} } } } }")
            .expect("json5 parse failed");
        let order: Vec<&str> = relaxed.nodes["t"].children.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn falls_back_to_json5() {
        let input = "{ nodes: { a: {}, b: {}, }, links: [{ source: 'a', target: 'b' }] }";
        let data = parse_lineage(input).expect("json5 parse failed");
        assert_eq!(data.nodes.len(), 2);
        assert_eq!(data.links.len(), 1);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_lineage("not a lineage").is_err());
    }

    #[test]
    fn direction_tokens() {
        assert_eq!(Direction::from_token("LR"), Some(Direction::Horizontal));
        assert_eq!(Direction::from_token("vertical"), Some(Direction::Vertical));
        assert_eq!(Direction::from_token("diagonal"), None);
    }
}

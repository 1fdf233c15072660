use std::collections::HashMap;

use serde::Serialize;

use crate::hierarchy::LinkClass;
use crate::ir::Direction;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NodeKind {
    Node,
    Attached { owner: String },
    /// Stand-in for attached children beyond the cap.
    Overflow { owner: String, hidden: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionedNode {
    pub id: String,
    pub kind: NodeKind,
    pub level: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Structural parent id; attached items report their owner's parent.
    pub parent: Option<String>,
    pub data: serde_json::Value,
    pub template: Option<String>,
    pub has_children: bool,
    pub children_hidden: bool,
}

impl PositionedNode {
    pub fn is_attached_child(&self) -> bool {
        !matches!(self.kind, NodeKind::Node)
    }

    /// Id of the tree node this item belongs to.
    pub fn owner_id(&self) -> &str {
        match &self.kind {
            NodeKind::Node => &self.id,
            NodeKind::Attached { owner } | NodeKind::Overflow { owner, .. } => owner,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkLayout {
    pub source: String,
    pub target: String,
    /// Index of the drawn source item in `Layout::nodes`.
    pub source_node: usize,
    pub target_node: usize,
    pub source_level: usize,
    pub target_level: usize,
    pub source_attached: bool,
    pub target_attached: bool,
    pub class: LinkClass,
    pub bidirectional: bool,
    pub points: Vec<(f32, f32)>,
}

impl LinkLayout {
    pub fn involves_attached(&self) -> bool {
        self.source_attached || self.target_attached
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Layout {
    pub direction: Direction,
    pub nodes: Vec<PositionedNode>,
    pub links: Vec<LinkLayout>,
    /// Index of the root node in `nodes`.
    pub center: Option<usize>,
    pub max_level: usize,
    pub width: f32,
    pub height: f32,
    #[serde(skip)]
    pub(crate) index: HashMap<String, usize>,
}

impl Layout {
    pub fn empty(direction: Direction) -> Self {
        Self {
            direction,
            nodes: Vec::new(),
            links: Vec::new(),
            center: None,
            max_level: 0,
            width: 0.0,
            height: 0.0,
            index: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn node(&self, id: &str) -> Option<&PositionedNode> {
        self.position_of(id).map(|idx| &self.nodes[idx])
    }
}

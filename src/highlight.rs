use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::layout::{Layout, NodeKind};

/// Layout positions and link indices that are live on the rendering surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Materialized {
    pub nodes: BTreeSet<usize>,
    pub links: BTreeSet<usize>,
}

impl Materialized {
    pub fn all(layout: &Layout) -> Self {
        Self {
            nodes: (0..layout.nodes.len()).collect(),
            links: (0..layout.links.len()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Classification of every live element after a click. Recomputed from scratch each time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighlightState {
    pub clicked: String,
    pub nodes: BTreeSet<usize>,
    pub dimmed_nodes: BTreeSet<usize>,
    pub links: BTreeSet<usize>,
    pub dimmed_links: BTreeSet<usize>,
}

impl HighlightState {
    pub fn highlighted_ids<'a>(&self, layout: &'a Layout) -> Vec<&'a str> {
        self.nodes
            .iter()
            .map(|&position| layout.nodes[position].id.as_str())
            .collect()
    }
}

/// Highlights the ancestor chain and descendant subtree of `clicked`.
/// Returns `None` when the id is not live.
pub fn highlight_path(
    layout: &Layout,
    live: &Materialized,
    clicked: &str,
) -> Option<HighlightState> {
    let position = layout.position_of(clicked)?;
    if !live.nodes.contains(&position) {
        return None;
    }
    let owner = layout.nodes[position].owner_id();

    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
    for &idx in &live.nodes {
        let node = &layout.nodes[idx];
        if let (NodeKind::Node, Some(parent)) = (&node.kind, node.parent.as_deref()) {
            children.entry(parent).or_default().push(node.id.as_str());
        }
    }
    let is_live = |id: &str| {
        layout
            .position_of(id)
            .is_some_and(|idx| live.nodes.contains(&idx))
    };

    let mut chain: HashSet<&str> = HashSet::new();
    let mut current = Some(owner);
    while let Some(id) = current {
        if !is_live(id) || !chain.insert(id) {
            break;
        }
        current = layout.node(id).and_then(|node| node.parent.as_deref());
    }

    let mut queue = VecDeque::from([owner]);
    while let Some(id) = queue.pop_front() {
        for &child in children.get(id).into_iter().flatten() {
            if chain.insert(child) {
                queue.push_back(child);
            }
        }
    }

    let mut state = HighlightState {
        clicked: clicked.to_string(),
        ..HighlightState::default()
    };
    for &idx in &live.nodes {
        if chain.contains(layout.nodes[idx].owner_id()) {
            state.nodes.insert(idx);
        } else {
            state.dimmed_nodes.insert(idx);
        }
    }
    for &idx in &live.links {
        let link = &layout.links[idx];
        let source = state.nodes.contains(&link.source_node);
        let target = state.nodes.contains(&link.target_node);
        if (source && target) || (link.bidirectional && (source || target)) {
            state.links.insert(idx);
        } else {
            state.dimmed_links.insert(idx);
        }
    }
    Some(state)
}

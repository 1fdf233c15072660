use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;
use tracing::{debug, warn};

use crate::ir::{LineageData, RawNode};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttachedChild {
    pub id: String,
    pub data: serde_json::Value,
    pub template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HierarchyNode {
    pub id: String,
    pub data: serde_json::Value,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub attached: Vec<AttachedChild>,
    pub children_hidden: bool,
    pub template: Option<String>,
}

impl HierarchyNode {
    fn from_raw(id: &str, raw: &RawNode, parent: Option<usize>) -> Self {
        Self {
            id: id.to_string(),
            data: raw.data.clone(),
            parent,
            children: Vec::new(),
            attached: Vec::new(),
            children_hidden: raw.hide_children,
            template: raw.template.clone(),
        }
    }

    pub fn has_attached(&self) -> bool {
        !self.attached.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkClass {
    /// Parent to child edge of the tree.
    Structural,
    /// Drawn on top of the tree, never used for positioning.
    Overlay,
    /// One endpoint is not reachable from the root.
    Detached,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HierarchyLink {
    /// Position in the input link list.
    pub input_index: usize,
    pub source: String,
    pub target: String,
    /// Tree node owning `source` (the node itself unless `source` is an attached child).
    pub source_owner: String,
    pub target_owner: String,
    pub class: LinkClass,
    pub bidirectional: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RootSelection {
    /// Source of the first link whose source is never a target.
    IndegreeZero,
    /// Every candidate is some link's target; the first link's source is used.
    FirstLinkFallback,
}

/// Where a rendered id lives inside the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub node: usize,
    pub attached: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Hierarchy {
    pub nodes: Vec<HierarchyNode>,
    pub links: Vec<HierarchyLink>,
    pub root_selection: Option<RootSelection>,
    /// Input node ids that the walk from the root never reached.
    pub unreachable: Vec<String>,
    #[serde(skip)]
    endpoints: HashMap<String, Endpoint>,
}

impl Hierarchy {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<&HierarchyNode> {
        self.nodes.first()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.endpoints
            .get(id)
            .filter(|endpoint| endpoint.attached.is_none())
            .map(|endpoint| endpoint.node)
    }

    pub fn node(&self, id: &str) -> Option<&HierarchyNode> {
        self.index_of(id).map(|idx| &self.nodes[idx])
    }

    /// Resolves a node or attached child id.
    pub fn endpoint(&self, id: &str) -> Option<Endpoint> {
        self.endpoints.get(id).copied()
    }

    pub fn structural_links(&self) -> impl Iterator<Item = &HierarchyLink> {
        self.links
            .iter()
            .filter(|link| link.class == LinkClass::Structural)
    }

    pub fn overlay_links(&self) -> impl Iterator<Item = &HierarchyLink> {
        self.links
            .iter()
            .filter(|link| link.class == LinkClass::Overlay)
    }

    pub fn depth(&self, idx: usize) -> usize {
        let mut depth = 0;
        let mut current = self.nodes[idx].parent;
        while let Some(parent) = current {
            depth += 1;
            current = self.nodes[parent].parent;
        }
        depth
    }
}

struct ResolvedLink<'a> {
    input_index: usize,
    source: &'a str,
    target: &'a str,
    source_owner: &'a str,
    target_owner: &'a str,
}

/// Reduces the graph to a single rooted tree. The first link a breadth-first walk
/// reaches a node through becomes its parent edge; other links touching the tree
/// are kept as overlays.
pub fn build_hierarchy(data: &LineageData) -> Hierarchy {
    let owners = owner_index(data);

    let mut resolved: Vec<ResolvedLink<'_>> = Vec::with_capacity(data.links.len());
    for (input_index, link) in data.links.iter().enumerate() {
        let (Some(source_owner), Some(target_owner)) = (
            owners.get(link.source.as_str()),
            owners.get(link.target.as_str()),
        ) else {
            warn!(
                source = %link.source,
                target = %link.target,
                "link references an unknown node id; skipped"
            );
            continue;
        };
        resolved.push(ResolvedLink {
            input_index,
            source: &link.source,
            target: &link.target,
            source_owner,
            target_owner,
        });
    }

    let Some((root_id, root_selection)) = select_root(&resolved) else {
        return Hierarchy::default();
    };

    let mut outgoing: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, link) in resolved.iter().enumerate() {
        outgoing.entry(link.source_owner).or_default().push(idx);
    }

    let mut hierarchy = Hierarchy {
        root_selection: Some(root_selection),
        ..Hierarchy::default()
    };
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut classes = vec![LinkClass::Detached; resolved.len()];

    index.insert(root_id, 0);
    hierarchy
        .nodes
        .push(HierarchyNode::from_raw(root_id, &data.nodes[root_id], None));
    let mut queue = VecDeque::from([0usize]);

    while let Some(current) = queue.pop_front() {
        let current_id = hierarchy.nodes[current].id.clone();
        let Some(edges) = outgoing.get(current_id.as_str()) else {
            continue;
        };
        for &edge in edges {
            let target = resolved[edge].target_owner;
            if target == current_id || index.contains_key(target) {
                classes[edge] = LinkClass::Overlay;
                continue;
            }
            let child = hierarchy.nodes.len();
            hierarchy.nodes.push(HierarchyNode::from_raw(
                target,
                &data.nodes[target],
                Some(current),
            ));
            hierarchy.nodes[current].children.push(child);
            index.insert(target, child);
            queue.push_back(child);
            classes[edge] = LinkClass::Structural;
        }
    }

    for (idx, node) in hierarchy.nodes.iter_mut().enumerate() {
        hierarchy.endpoints.insert(
            node.id.clone(),
            Endpoint {
                node: idx,
                attached: None,
            },
        );
        let raw = &data.nodes[node.id.as_str()];
        for (child_id, child) in &raw.children {
            if owners.get(child_id.as_str()) != Some(&node.id.as_str()) {
                continue;
            }
            hierarchy.endpoints.insert(
                child_id.clone(),
                Endpoint {
                    node: idx,
                    attached: Some(node.attached.len()),
                },
            );
            node.attached.push(AttachedChild {
                id: child_id.clone(),
                data: child.data.clone(),
                template: child.template.clone(),
            });
        }
    }

    let live: HashSet<(&str, &str)> = resolved
        .iter()
        .zip(&classes)
        .filter(|(_, class)| **class != LinkClass::Detached)
        .map(|(link, _)| (link.source, link.target))
        .collect();

    hierarchy.links = resolved
        .iter()
        .zip(&classes)
        .map(|(link, class)| {
            let bidirectional = *class != LinkClass::Detached
                && link.source != link.target
                && live.contains(&(link.target, link.source));
            HierarchyLink {
                input_index: link.input_index,
                source: link.source.to_string(),
                target: link.target.to_string(),
                source_owner: link.source_owner.to_string(),
                target_owner: link.target_owner.to_string(),
                class: *class,
                bidirectional,
            }
        })
        .collect();

    hierarchy.unreachable = data
        .nodes
        .keys()
        .filter(|id| !index.contains_key(id.as_str()))
        .cloned()
        .collect();
    if !hierarchy.unreachable.is_empty() {
        debug!(
            count = hierarchy.unreachable.len(),
            root = root_id,
            "nodes unreachable from root were excluded"
        );
    }

    hierarchy
}

/// Maps every known id to the id of the tree node that owns it. Top-level
/// nodes own themselves; attached children resolve to their node.
fn owner_index(data: &LineageData) -> HashMap<&str, &str> {
    let mut owners: HashMap<&str, &str> = data
        .nodes
        .keys()
        .map(|id| (id.as_str(), id.as_str()))
        .collect();
    for (id, node) in &data.nodes {
        for child_id in node.children.keys() {
            if let Some(existing) = owners.get(child_id.as_str()) {
                warn!(
                    id = %child_id,
                    owner = %existing,
                    ignored_owner = %id,
                    "duplicate attached child id; keeping first definition"
                );
                continue;
            }
            owners.insert(child_id.as_str(), id.as_str());
        }
    }
    owners
}

fn select_root<'a>(links: &[ResolvedLink<'a>]) -> Option<(&'a str, RootSelection)> {
    let first = links.first()?;
    let targets: HashSet<&str> = links
        .iter()
        .filter(|link| link.source_owner != link.target_owner)
        .map(|link| link.target_owner)
        .collect();
    if let Some(link) = links
        .iter()
        .find(|link| !targets.contains(link.source_owner))
    {
        return Some((link.source_owner, RootSelection::IndegreeZero));
    }
    debug!(
        root = first.source_owner,
        "every link source is also a target; using the first link's source as root"
    );
    Some((first.source_owner, RootSelection::FirstLinkFallback))
}

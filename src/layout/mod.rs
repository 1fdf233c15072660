mod attached;
pub(crate) mod types;
pub use attached::{AttachedBlock, attached_block};
pub use types::*;

use crate::config::LayoutConfig;
use crate::hierarchy::{Endpoint, Hierarchy, LinkClass};
use crate::ir::Direction;
use tracing::{debug, warn};

/// Suffix of the synthetic id given to a node's "+N more" indicator.
pub const OVERFLOW_SUFFIX: &str = "::more";

pub fn compute_layout(hierarchy: &Hierarchy, config: &LayoutConfig) -> Layout {
    if hierarchy.is_empty() {
        return Layout::empty(config.direction);
    }

    let node_size = config.node_size;
    let item_size = config.children_node_size;
    let count = hierarchy.nodes.len();

    let blocks: Vec<AttachedBlock> = hierarchy
        .nodes
        .iter()
        .map(|node| attached_block(node, config))
        .collect();
    let box_heights: Vec<f32> = blocks
        .iter()
        .map(|block| node_size.height + block.extent(item_size.height))
        .collect();

    // Arena order is breadth-first, so a parent is always seen before its children.
    let mut levels = vec![0usize; count];
    for (idx, node) in hierarchy.nodes.iter().enumerate() {
        if let Some(parent) = node.parent {
            levels[idx] = levels[parent] + 1;
        }
    }
    let max_level = levels.iter().copied().max().unwrap_or(0);

    let (own_extent, primary_step): (Vec<f32>, f32) = match config.direction {
        Direction::Horizontal => (box_heights.clone(), node_size.width + config.gap),
        Direction::Vertical => {
            let tallest = box_heights.iter().copied().fold(node_size.height, f32::max);
            (vec![node_size.width; count], tallest + config.gap)
        }
    };

    let mut subtree_extent = own_extent.clone();
    for idx in (0..count).rev() {
        let children = &hierarchy.nodes[idx].children;
        if children.is_empty() {
            continue;
        }
        let stacked = stacked_extent(children, &subtree_extent, config.padding);
        subtree_extent[idx] = subtree_extent[idx].max(stacked);
    }

    let mut span_start = vec![0.0f32; count];
    let mut secondary = vec![0.0f32; count];
    for idx in 0..count {
        let start = span_start[idx];
        secondary[idx] = start + (subtree_extent[idx] - own_extent[idx]) / 2.0;
        let children = &hierarchy.nodes[idx].children;
        if children.is_empty() {
            continue;
        }
        let stacked = stacked_extent(children, &subtree_extent, config.padding);
        let mut cursor = start + (subtree_extent[idx] - stacked) / 2.0;
        for &child in children {
            span_start[child] = cursor;
            cursor += subtree_extent[child] + config.padding;
        }
    }

    let mut layout = Layout::empty(config.direction);
    layout.max_level = max_level;
    layout.center = Some(0);
    // Drawn position of each hierarchy node and its attached items.
    let mut drawn: Vec<usize> = Vec::with_capacity(count);
    let mut attached_drawn: Vec<Vec<usize>> = Vec::with_capacity(count);
    let mut overflow_drawn: Vec<Option<usize>> = Vec::with_capacity(count);

    for (idx, node) in hierarchy.nodes.iter().enumerate() {
        let primary = levels[idx] as f32 * primary_step;
        let (x, y) = match config.direction {
            Direction::Horizontal => (primary, secondary[idx]),
            Direction::Vertical => (secondary[idx], primary),
        };
        let parent = node.parent.map(|p| hierarchy.nodes[p].id.clone());
        drawn.push(layout.nodes.len());
        layout.nodes.push(PositionedNode {
            id: node.id.clone(),
            kind: NodeKind::Node,
            level: levels[idx],
            x,
            y,
            width: node_size.width,
            height: node_size.height,
            parent: parent.clone(),
            data: node.data.clone(),
            template: node.template.clone(),
            has_children: node.has_attached(),
            children_hidden: node.children_hidden,
        });

        let block = blocks[idx];
        let mut item_y = y + node_size.height;
        let mut items = Vec::with_capacity(block.shown);
        for child in node.attached.iter().take(block.shown) {
            items.push(layout.nodes.len());
            layout.nodes.push(PositionedNode {
                id: child.id.clone(),
                kind: NodeKind::Attached {
                    owner: node.id.clone(),
                },
                level: levels[idx],
                x,
                y: item_y,
                width: node_size.width,
                height: item_size.height,
                parent: parent.clone(),
                data: child.data.clone(),
                template: child.template.clone(),
                has_children: false,
                children_hidden: false,
            });
            item_y += item_size.height;
        }
        attached_drawn.push(items);

        overflow_drawn.push(block.overflow.map(|hidden| {
            let position = layout.nodes.len();
            layout.nodes.push(PositionedNode {
                id: overflow_id(hierarchy, &node.id),
                kind: NodeKind::Overflow {
                    owner: node.id.clone(),
                    hidden,
                },
                level: levels[idx],
                x,
                y: item_y,
                width: node_size.width,
                height: item_size.height,
                parent: parent.clone(),
                data: serde_json::Value::Null,
                template: None,
                has_children: false,
                children_hidden: false,
            });
            position
        }));
    }

    let resolve = |endpoint: Endpoint| -> usize {
        match endpoint.attached {
            None => drawn[endpoint.node],
            Some(attached) => attached_drawn[endpoint.node]
                .get(attached)
                .copied()
                .or(overflow_drawn[endpoint.node])
                .unwrap_or(drawn[endpoint.node]),
        }
    };

    for link in &hierarchy.links {
        if link.class == LinkClass::Detached {
            continue;
        }
        let (Some(source), Some(target)) = (
            hierarchy.endpoint(&link.source),
            hierarchy.endpoint(&link.target),
        ) else {
            warn!(source = %link.source, target = %link.target, "link endpoint missing from hierarchy");
            continue;
        };
        if source.node == target.node && source.attached.is_none() != target.attached.is_none() {
            // node to its own attached child: implied by containment
            continue;
        }
        let source_node = resolve(source);
        let target_node = resolve(target);
        if source_node == target_node {
            continue;
        }
        let points = route_link(
            &layout.nodes[source_node],
            &layout.nodes[target_node],
            config.direction,
            config.gap,
        );
        layout.links.push(LinkLayout {
            source: link.source.clone(),
            target: link.target.clone(),
            source_node,
            target_node,
            source_level: levels[source.node],
            target_level: levels[target.node],
            source_attached: source.attached.is_some(),
            target_attached: target.attached.is_some(),
            class: link.class,
            bidirectional: link.bidirectional,
            points,
        });
    }

    for (position, node) in layout.nodes.iter().enumerate() {
        layout.index.insert(node.id.clone(), position);
        layout.width = layout.width.max(node.x + node.width);
        layout.height = layout.height.max(node.y + node.height);
    }

    debug!(
        nodes = layout.nodes.len(),
        links = layout.links.len(),
        max_level,
        "layout computed"
    );
    layout
}

/// `<owner>::more`, numbered when a real id already uses that name.
fn overflow_id(hierarchy: &Hierarchy, owner: &str) -> String {
    let base = format!("{owner}{OVERFLOW_SUFFIX}");
    if hierarchy.endpoint(&base).is_none() {
        return base;
    }
    let mut n = 1;
    while hierarchy.endpoint(&format!("{base}~{n}")).is_some() {
        n += 1;
    }
    warn!(id = %base, "overflow id clashes with a node id; renamed");
    format!("{base}~{n}")
}

fn stacked_extent(children: &[usize], extents: &[f32], padding: f32) -> f32 {
    let total: f32 = children.iter().map(|&child| extents[child]).sum();
    total + padding * children.len().saturating_sub(1) as f32
}

/// Four point elbow between two boxes, leaving the source on the side facing the target.
fn route_link(
    source: &PositionedNode,
    target: &PositionedNode,
    direction: Direction,
    gap: f32,
) -> Vec<(f32, f32)> {
    // (primary start, primary end, secondary center)
    let axis = |node: &PositionedNode| match direction {
        Direction::Horizontal => (node.x, node.x + node.width, node.y + node.height / 2.0),
        Direction::Vertical => (node.y, node.y + node.height, node.x + node.width / 2.0),
    };
    let (s0, s1, s_mid) = axis(source);
    let (t0, t1, t_mid) = axis(target);

    let (start, end, bend) = if t0 > s0 {
        (s1, t0, (s1 + t0) / 2.0)
    } else if t0 < s0 {
        (s0, t1, (s0 + t1) / 2.0)
    } else {
        (s1, t1, s1.max(t1) + gap / 4.0)
    };

    let points = [(start, s_mid), (bend, s_mid), (bend, t_mid), (end, t_mid)];
    match direction {
        Direction::Horizontal => points.to_vec(),
        Direction::Vertical => points.iter().map(|&(p, s)| (s, p)).collect(),
    }
}

impl Layout {
    /// Level used to seed pagination. Falls back to the root when the id is unset or unknown.
    pub fn center_level(&self, center_id: Option<&str>) -> usize {
        let root_level = self
            .center
            .map(|center| self.nodes[center].level)
            .unwrap_or(0);
        let Some(id) = center_id else {
            return root_level;
        };
        match self.node(id) {
            Some(node) => node.level,
            None => {
                warn!(center_node = id, "center node not found; using root");
                root_level
            }
        }
    }
}

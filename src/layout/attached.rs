use crate::config::LayoutConfig;
use crate::hierarchy::HierarchyNode;

/// Visible part of a node's attached list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttachedBlock {
    pub shown: usize,
    /// Number of attached children folded into the "+N more" indicator.
    pub overflow: Option<usize>,
}

impl AttachedBlock {
    pub fn slots(&self) -> usize {
        self.shown + usize::from(self.overflow.is_some())
    }

    pub fn extent(&self, item_height: f32) -> f32 {
        self.slots() as f32 * item_height
    }

    pub fn is_visible(&self, attached: usize) -> bool {
        attached < self.shown
    }
}

pub fn attached_block(node: &HierarchyNode, config: &LayoutConfig) -> AttachedBlock {
    let count = node.attached.len();
    if count == 0 || node.children_hidden {
        return AttachedBlock::default();
    }
    let item_height = config.children_node_size.height;
    if count as f32 * item_height <= config.max_attached_height() {
        return AttachedBlock {
            shown: count,
            overflow: None,
        };
    }
    let shown = config.max_children.saturating_sub(1).min(count);
    AttachedBlock {
        shown,
        overflow: Some(count - shown),
    }
}

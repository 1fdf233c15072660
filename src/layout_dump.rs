use crate::hierarchy::{Hierarchy, LinkClass, RootSelection};
use crate::ir::Direction;
use crate::layout::{Layout, NodeKind};
use crate::pagination::PageTag;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDump {
    pub direction: Direction,
    pub width: f32,
    pub height: f32,
    pub root: Option<String>,
    pub root_selection: Option<RootSelection>,
    pub max_level: usize,
    pub unreachable: Vec<String>,
    pub nodes: Vec<NodeDump>,
    pub links: Vec<LinkDump>,
    pub pages: BTreeMap<PageTag, Vec<usize>>,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub id: String,
    #[serde(flatten)]
    pub kind: NodeKind,
    pub level: usize,
    pub parent: Option<String>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Serialize)]
pub struct LinkDump {
    pub source: String,
    pub target: String,
    pub class: LinkClass,
    pub bidirectional: bool,
    pub points: Vec<[f32; 2]>,
}

impl LayoutDump {
    pub fn from_layout(
        layout: &Layout,
        hierarchy: &Hierarchy,
        pages: &BTreeMap<PageTag, BTreeSet<usize>>,
    ) -> Self {
        let nodes = layout
            .nodes
            .iter()
            .map(|node| NodeDump {
                id: node.id.clone(),
                kind: node.kind.clone(),
                level: node.level,
                parent: node.parent.clone(),
                x: node.x,
                y: node.y,
                width: node.width,
                height: node.height,
            })
            .collect();

        let links = layout
            .links
            .iter()
            .map(|link| LinkDump {
                source: link.source.clone(),
                target: link.target.clone(),
                class: link.class,
                bidirectional: link.bidirectional,
                points: link.points.iter().map(|(x, y)| [*x, *y]).collect(),
            })
            .collect();

        LayoutDump {
            direction: layout.direction,
            width: layout.width,
            height: layout.height,
            root: hierarchy.root().map(|node| node.id.clone()),
            root_selection: hierarchy.root_selection,
            max_level: layout.max_level,
            unreachable: hierarchy.unreachable.clone(),
            nodes,
            links,
            pages: pages
                .iter()
                .map(|(page, levels)| (*page, levels.iter().copied().collect()))
                .collect(),
        }
    }
}

pub fn write_layout_dump(
    path: &Path,
    layout: &Layout,
    hierarchy: &Hierarchy,
    pages: &BTreeMap<PageTag, BTreeSet<usize>>,
) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_layout(layout, hierarchy, pages);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}

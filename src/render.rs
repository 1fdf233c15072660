use crate::config::{RenderConfig, TemplateConfig};
use crate::hierarchy::{Hierarchy, LinkClass};
use crate::highlight::HighlightState;
use crate::layout::{LinkLayout, NodeKind, PositionedNode};
use crate::pagination::{PageDraw, PageTag, RenderingAdapter};
use crate::template::TemplateRenderer;
use crate::text_metrics::truncate_to_width;
use crate::theme::Theme;
use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;

const TEXT_PAD_X: f32 = 12.0;
const SURFACE_MARGIN: f32 = 24.0;
const MIN_SURFACE: f32 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Layer {
    Link,
    Node,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ElementKey {
    page: PageTag,
    layer: Layer,
    index: usize,
}

#[derive(Debug, Clone)]
struct Element {
    id: String,
    body: String,
}

/// Page indexed SVG surface. Every element is filed under the page that drew it,
/// so erasing a page touches only that page's entries.
#[derive(Debug, Clone)]
pub struct SvgSurface {
    theme: Theme,
    templates: TemplateRenderer,
    elements: BTreeMap<ElementKey, Element>,
    width: f32,
    height: f32,
    empty: bool,
    progress: u32,
    ready_count: usize,
    highlight: Option<HighlightState>,
}

impl SvgSurface {
    pub fn new(theme: Theme, templates: TemplateConfig) -> Self {
        Self {
            theme,
            templates: TemplateRenderer::new(templates),
            elements: BTreeMap::new(),
            width: 0.0,
            height: 0.0,
            empty: false,
            progress: 0,
            ready_count: 0,
            highlight: None,
        }
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn page_element_count(&self, page: PageTag) -> usize {
        self.page_range(page).count()
    }

    pub fn ready_count(&self) -> usize {
        self.ready_count
    }

    pub fn progress(&self) -> u32 {
        self.progress
    }

    pub fn apply_highlight(&mut self, state: HighlightState) {
        self.highlight = Some(state);
    }

    pub fn clear_highlight(&mut self) {
        self.highlight = None;
    }

    fn page_range(&self, page: PageTag) -> impl Iterator<Item = (&ElementKey, &Element)> {
        let start = ElementKey {
            page,
            layer: Layer::Link,
            index: 0,
        };
        self.elements
            .range(start..)
            .take_while(move |(key, _)| key.page == page)
    }

    fn opacity(&self, layer: Layer, index: usize) -> Option<f32> {
        let state = self.highlight.as_ref()?;
        let dimmed = match layer {
            Layer::Link => state.dimmed_links.contains(&index),
            Layer::Node => state.dimmed_nodes.contains(&index),
        };
        dimmed.then_some(self.theme.dim_opacity)
    }

    pub fn to_svg(&self, config: &RenderConfig) -> String {
        let mut svg = String::new();
        let width = (self.width + SURFACE_MARGIN * 2.0).max(MIN_SURFACE);
        let height = (self.height + SURFACE_MARGIN * 2.0).max(MIN_SURFACE);

        svg.push_str(&format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" class=\"lineage-svg\" width=\"{width:.2}\" height=\"{height:.2}\" viewBox=\"0 0 {width:.2} {height:.2}\">",
        ));
        svg.push_str(&format!(
            "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
            config.background
        ));

        svg.push_str("<defs>");
        svg.push_str(&format!(
            "<marker id=\"arrow\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" markerWidth=\"6\" markerHeight=\"6\" orient=\"auto-start-reverse\"><path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"{}\"/></marker>",
            self.theme.link_color
        ));
        svg.push_str("</defs>");

        if self.empty {
            svg.push_str(&format!(
                "<text class=\"lineage-empty\" x=\"50%\" y=\"50%\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">No data to display</text>",
                escape_xml(&self.theme.font_family),
                self.theme.font_size,
                self.theme.node_text
            ));
            svg.push_str("</svg>");
            return svg;
        }

        svg.push_str(&format!(
            "<g transform=\"translate({SURFACE_MARGIN} {SURFACE_MARGIN})\">"
        ));
        for layer in [Layer::Link, Layer::Node] {
            for (key, element) in self.elements.iter().filter(|(key, _)| key.layer == layer) {
                let opacity = self
                    .opacity(layer, key.index)
                    .map(|value| format!(" opacity=\"{value}\""))
                    .unwrap_or_default();
                svg.push_str(&format!(
                    "<g data-page=\"{}\" data-id=\"{}\"{opacity}>{}</g>",
                    key.page,
                    escape_xml(&element.id),
                    element.body
                ));
            }
        }
        svg.push_str("</g>");

        if self.ready_count == 0 {
            svg.push_str(&format!(
                "<text class=\"lineage-progress\" x=\"8\" y=\"16\" font-family=\"{}\" font-size=\"11\" fill=\"{}\">{}%</text>",
                escape_xml(&self.theme.font_family),
                self.theme.node_text,
                self.progress
            ));
        }

        svg.push_str("</svg>");
        svg
    }

    fn node_svg(&self, node: &PositionedNode) -> String {
        let attached = node.is_attached_child();
        let content = self.templates.render(node, attached);
        let (fill, text_color) = match (&node.kind, content.error) {
            (_, true) => (self.theme.node_fill.as_str(), self.theme.error_text.as_str()),
            (NodeKind::Node, false) => (self.theme.node_fill.as_str(), self.theme.node_text.as_str()),
            _ => (
                self.theme.attached_fill.as_str(),
                self.theme.attached_text.as_str(),
            ),
        };
        let radius = if attached { 0.0 } else { 6.0 };

        let mut body = format!(
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"{radius}\" ry=\"{radius}\" fill=\"{fill}\" stroke=\"{}\" stroke-width=\"1\"/>",
            node.x, node.y, node.width, node.height, self.theme.node_border
        );

        let line_height = self.theme.font_size * 1.3;
        let total = content.lines.len() as f32 * line_height;
        let text_x = node.x + TEXT_PAD_X;
        let mut text_y = node.y + (node.height - total) / 2.0 + self.theme.font_size;
        let max_width = (node.width - TEXT_PAD_X * 2.0).max(0.0);
        let style = match node.kind {
            NodeKind::Overflow { .. } => " font-style=\"italic\"",
            _ => "",
        };
        for line in &content.lines {
            let fitted = truncate_to_width(
                line,
                max_width,
                self.theme.font_size,
                &self.theme.font_family,
            );
            body.push_str(&format!(
                "<text x=\"{text_x:.2}\" y=\"{text_y:.2}\" font-family=\"{}\" font-size=\"{}\" fill=\"{text_color}\"{style}>{}</text>",
                escape_xml(&self.theme.font_family),
                self.theme.font_size,
                escape_xml(&fitted)
            ));
            text_y += line_height;
        }
        body
    }

    fn link_svg(&self, link: &LinkLayout) -> String {
        let (stroke, dash) = match (link.class, link.bidirectional) {
            (_, true) => (self.theme.bidirectional_link_color.as_str(), ""),
            (LinkClass::Overlay, false) => {
                (self.theme.overlay_link_color.as_str(), " stroke-dasharray=\"6 4\"")
            }
            _ => (self.theme.link_color.as_str(), ""),
        };
        let start_marker = if link.bidirectional {
            " marker-start=\"url(#arrow)\""
        } else {
            ""
        };
        format!(
            "<path d=\"{}\" fill=\"none\" stroke=\"{stroke}\" stroke-width=\"1.4\"{dash}{start_marker} marker-end=\"url(#arrow)\"/>",
            points_to_path(&link.points)
        )
    }
}

impl RenderingAdapter for SvgSurface {
    fn draw(&mut self, page: &PageDraw<'_>) {
        let layout = page.layout;
        self.empty = false;
        self.width = layout.width;
        self.height = layout.height;

        for &index in &page.links {
            let link = &layout.links[index];
            let element = Element {
                id: format!("{}->{}", link.source, link.target),
                body: self.link_svg(link),
            };
            self.elements.insert(
                ElementKey {
                    page: page.page,
                    layer: Layer::Link,
                    index,
                },
                element,
            );
        }
        for &index in &page.nodes {
            let node = &layout.nodes[index];
            let element = Element {
                id: node.id.clone(),
                body: self.node_svg(node),
            };
            self.elements.insert(
                ElementKey {
                    page: page.page,
                    layer: Layer::Node,
                    index,
                },
                element,
            );
        }
    }

    fn erase(&mut self, page: PageTag) {
        let keys: Vec<ElementKey> = self.page_range(page).map(|(key, _)| key.clone()).collect();
        for key in keys {
            self.elements.remove(&key);
        }
    }

    fn show_empty(&mut self) {
        self.elements.clear();
        self.empty = true;
    }

    fn on_progress(&mut self, percent: u32) {
        self.progress = percent.min(100);
    }

    fn on_ready(&mut self, _hierarchy: &Hierarchy) {
        self.ready_count += 1;
    }
}

fn points_to_path(points: &[(f32, f32)]) -> String {
    if points.is_empty() {
        return String::new();
    }
    let mut d = String::new();
    d.push_str(&format!("M {:.2} {:.2}", points[0].0, points[0].1));
    for point in points.iter().skip(1) {
        d.push_str(&format!(" L {:.2} {:.2}", point.0, point.1));
    }
    d
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.default_size = usvg::Size::from_wh(render_cfg.width, render_cfg.height)
        .ok_or_else(|| anyhow::anyhow!("Invalid render size"))?;
    opt.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, LayoutConfig};
    use crate::hierarchy::build_hierarchy;
    use crate::highlight::{Materialized, highlight_path};
    use crate::ir::LineageData;
    use crate::layout::compute_layout;
    use std::collections::BTreeSet;

    fn surface() -> SvgSurface {
        SvgSurface::new(Theme::flow(), TemplateConfig::default())
    }

    fn sample() -> crate::layout::Layout {
        let mut data = LineageData::new();
        data.link("orders", "daily<sales>");
        data.link("orders", "refunds");
        compute_layout(&build_hierarchy(&data), &LayoutConfig::default())
    }

    fn draw_all(surface: &mut SvgSurface, layout: &crate::layout::Layout, page: PageTag) {
        let levels: BTreeSet<usize> = (0..=layout.max_level).collect();
        surface.draw(&PageDraw {
            page,
            levels: &levels,
            layout,
            nodes: (0..layout.nodes.len()).collect(),
            links: (0..layout.links.len()).collect(),
        });
    }

    #[test]
    fn render_svg_basic() {
        let layout = sample();
        let mut surface = surface();
        draw_all(&mut surface, &layout, 1);
        let svg = surface.to_svg(&Config::default().render);
        assert!(svg.contains("<svg"));
        assert!(svg.contains("orders"));
        assert!(svg.contains("daily&lt;sales&gt;"));
        assert!(svg.contains("data-page=\"1\""));
        assert!(svg.ends_with("</svg>"));
    }

    #[test]
    fn draw_is_idempotent_and_erase_is_page_scoped() {
        let layout = sample();
        let mut surface = surface();
        draw_all(&mut surface, &layout, 1);
        let count = surface.element_count();
        draw_all(&mut surface, &layout, 1);
        assert_eq!(surface.element_count(), count);

        draw_all(&mut surface, &layout, 2);
        assert_eq!(surface.page_element_count(2), count);
        surface.erase(1);
        assert_eq!(surface.page_element_count(1), 0);
        assert_eq!(surface.element_count(), count);
    }

    #[test]
    fn empty_surface_says_so() {
        let mut surface = surface();
        surface.show_empty();
        let svg = surface.to_svg(&Config::default().render);
        assert!(svg.contains("No data to display"));
    }

    #[test]
    fn template_failure_renders_placeholder() {
        let layout = sample();
        let mut surface = SvgSurface::new(
            Theme::flow(),
            TemplateConfig {
                node_template: "${node.data.missing}".to_string(),
                ..TemplateConfig::default()
            },
        );
        draw_all(&mut surface, &layout, 1);
        let svg = surface.to_svg(&Config::default().render);
        assert!(svg.contains("Error reading node"));
        assert!(svg.contains(&Theme::flow().error_text));
    }

    #[test]
    fn highlight_dims_other_elements() {
        let layout = sample();
        let mut surface = surface();
        draw_all(&mut surface, &layout, 1);
        let state = highlight_path(&layout, &Materialized::all(&layout), "refunds").unwrap();
        surface.apply_highlight(state);
        let svg = surface.to_svg(&Config::default().render);
        assert!(svg.contains("opacity=\"0.2\""));
        surface.clear_highlight();
        let svg = surface.to_svg(&Config::default().render);
        assert!(!svg.contains("opacity=\"0.2\""));
    }
}

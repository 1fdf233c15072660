use crate::LineageError;
use crate::ir::{Direction, NodeSize};
use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

pub const DEFAULT_NODE_TEMPLATE: &str = "${node.id}${node.childrenToggle}";
pub const DEFAULT_CHILDREN_NODE_TEMPLATE: &str = "${node.id}";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub direction: Direction,
    pub node_size: NodeSize,
    pub children_node_size: NodeSize,
    pub padding: f32,
    pub gap: f32,
    pub max_children: usize,
}

impl LayoutConfig {
    /// Height an attached list may take before it collapses behind a "+N more" item.
    pub fn max_attached_height(&self) -> f32 {
        self.max_children as f32 * self.children_node_size.height
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            direction: Direction::Horizontal,
            node_size: NodeSize::new(200.0, 52.0),
            children_node_size: NodeSize::new(200.0, 32.0),
            padding: 16.0,
            gap: 100.0,
            max_children: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    pub stagger_load: usize,
    pub center_node: Option<String>,
    pub initial_delay_ms: u64,
    pub step_delay_ms: u64,
}

impl PaginationConfig {
    /// Levels added per step, never less than one.
    pub fn stagger(&self) -> usize {
        self.stagger_load.max(1)
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            stagger_load: 10,
            center_node: None,
            initial_delay_ms: 1000,
            step_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    pub node_template: String,
    pub children_node_template: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            node_template: DEFAULT_NODE_TEMPLATE.to_string(),
            children_node_template: DEFAULT_CHILDREN_NODE_TEMPLATE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
    pub background: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            background: "#FFFFFF".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub pagination: PaginationConfig,
    pub templates: TemplateConfig,
    pub render: RenderConfig,
}

impl Default for Config {
    fn default() -> Self {
        let theme = Theme::flow();
        let render = RenderConfig {
            background: theme.background.clone(),
            ..Default::default()
        };
        Self {
            theme,
            layout: LayoutConfig::default(),
            pagination: PaginationConfig::default(),
            templates: TemplateConfig::default(),
            render,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<f32>,
    node_fill: Option<String>,
    node_border: Option<String>,
    node_text: Option<String>,
    attached_fill: Option<String>,
    attached_text: Option<String>,
    link_color: Option<String>,
    overlay_link_color: Option<String>,
    bidirectional_link_color: Option<String>,
    highlight_color: Option<String>,
    error_text: Option<String>,
    background: Option<String>,
    dim_opacity: Option<f32>,
}

/// Host property surface. Kebab-case attribute names are accepted as aliases.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    direction: Option<String>,
    #[serde(alias = "node-size")]
    node_size: Option<NodeSize>,
    #[serde(alias = "children-node-size", alias = "attachedChildSize")]
    children_node_size: Option<NodeSize>,
    padding: Option<f32>,
    gap: Option<f32>,
    #[serde(alias = "center-node", alias = "centerNodeId")]
    center_node: Option<String>,
    #[serde(alias = "stagger-load", alias = "staggerSize")]
    stagger_load: Option<i64>,
    #[serde(alias = "max-children", alias = "maxAttachedChildren")]
    max_children: Option<usize>,
    #[serde(alias = "node-template")]
    node_template: Option<String>,
    #[serde(alias = "children-node-template")]
    children_node_template: Option<String>,
    background: Option<String>,
    initial_delay_ms: Option<u64>,
    step_delay_ms: Option<u64>,
}

pub fn load_config(path: Option<&Path>) -> Result<Config, LineageError> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path).map_err(|source| LineageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> Result<Config, LineageError> {
    let parsed: ConfigFile =
        serde_json::from_str(contents).map_err(|err| LineageError::Config {
            message: err.to_string(),
        })?;
    apply_config_file(Config::default(), parsed)
}

pub(crate) fn apply_config_file(
    mut config: Config,
    parsed: ConfigFile,
) -> Result<Config, LineageError> {
    if let Some(theme_name) = parsed.theme.as_deref() {
        match theme_name {
            "modern" => config.theme = Theme::modern(),
            "flow" | "default" => config.theme = Theme::flow(),
            other => warn!(theme = other, "unknown theme; keeping current"),
        }
    }

    if let Some(vars) = parsed.theme_variables {
        if let Some(v) = vars.font_family {
            config.theme.font_family = v;
        }
        if let Some(v) = vars.font_size {
            config.theme.font_size = v;
        }
        if let Some(v) = vars.node_fill {
            config.theme.node_fill = v;
        }
        if let Some(v) = vars.node_border {
            config.theme.node_border = v;
        }
        if let Some(v) = vars.node_text {
            config.theme.node_text = v;
        }
        if let Some(v) = vars.attached_fill {
            config.theme.attached_fill = v;
        }
        if let Some(v) = vars.attached_text {
            config.theme.attached_text = v;
        }
        if let Some(v) = vars.link_color {
            config.theme.link_color = v;
        }
        if let Some(v) = vars.overlay_link_color {
            config.theme.overlay_link_color = v;
        }
        if let Some(v) = vars.bidirectional_link_color {
            config.theme.bidirectional_link_color = v;
        }
        if let Some(v) = vars.highlight_color {
            config.theme.highlight_color = v;
        }
        if let Some(v) = vars.error_text {
            config.theme.error_text = v;
        }
        if let Some(v) = vars.background {
            config.theme.background = v;
        }
        if let Some(v) = vars.dim_opacity {
            config.theme.dim_opacity = v.clamp(0.0, 1.0);
        }
    }
    config.render.background = config.theme.background.clone();
    if let Some(v) = parsed.background {
        config.render.background = v;
    }

    if let Some(raw) = parsed.direction.as_deref() {
        config.layout.direction =
            Direction::from_token(raw).ok_or_else(|| LineageError::Config {
                message: format!("unknown direction `{raw}`"),
            })?;
    }
    if let Some(v) = parsed.node_size {
        config.layout.node_size = v;
    }
    if let Some(v) = parsed.children_node_size {
        config.layout.children_node_size = v;
    }
    if let Some(v) = parsed.padding {
        config.layout.padding = v.max(0.0);
    }
    if let Some(v) = parsed.gap {
        config.layout.gap = v.max(0.0);
    }
    if let Some(v) = parsed.max_children {
        config.layout.max_children = v;
    }

    if let Some(v) = parsed.stagger_load {
        if v < 1 {
            warn!(stagger_load = v, "stagger load must be at least 1; clamped");
        }
        config.pagination.stagger_load = v.max(1) as usize;
    }
    if parsed.center_node.is_some() {
        config.pagination.center_node = parsed.center_node;
    }
    if let Some(v) = parsed.initial_delay_ms {
        config.pagination.initial_delay_ms = v;
    }
    if let Some(v) = parsed.step_delay_ms {
        config.pagination.step_delay_ms = v;
    }

    if let Some(v) = parsed.node_template {
        config.templates.node_template = v;
    }
    if let Some(v) = parsed.children_node_template {
        config.templates.children_node_template = v;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_component_defaults() {
        let config = Config::default();
        assert_eq!(config.layout.node_size, NodeSize::new(200.0, 52.0));
        assert_eq!(config.layout.max_attached_height(), 8.0 * 32.0);
        assert_eq!(config.pagination.stagger(), 10);
    }

    #[test]
    fn kebab_attributes_are_accepted() {
        let config = parse_config(
            r##"{
                "direction": "vertical",
                "node-size": { "width": 120, "height": 40 },
                "center-node": "orders",
                "stagger-load": 3,
                "max-children": 4,
                "themeVariables": { "nodeFill": "#000000", "dimOpacity": 2.0 }
            }"##,
        )
        .expect("config parse failed");
        assert_eq!(config.layout.direction, Direction::Vertical);
        assert_eq!(config.layout.node_size.width, 120.0);
        assert_eq!(config.pagination.center_node.as_deref(), Some("orders"));
        assert_eq!(config.pagination.stagger_load, 3);
        assert_eq!(config.layout.max_children, 4);
        assert_eq!(config.theme.node_fill, "#000000");
        assert_eq!(config.theme.dim_opacity, 1.0);
    }

    #[test]
    fn non_positive_stagger_is_clamped() {
        let config = parse_config(r#"{ "staggerLoad": -4 }"#).unwrap();
        assert_eq!(config.pagination.stagger_load, 1);
        let config = parse_config(r#"{ "staggerSize": 0 }"#).unwrap();
        assert_eq!(config.pagination.stagger(), 1);
    }

    #[test]
    fn unknown_direction_is_an_error() {
        assert!(parse_config(r#"{ "direction": "diagonal" }"#).is_err());
    }
}

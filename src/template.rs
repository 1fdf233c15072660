use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::config::TemplateConfig;
use crate::layout::{NodeKind, PositionedNode};

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{\s*([^{}]*?)\s*\}").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unsupported placeholder `{0}`")]
    Unsupported(String),
    #[error("field `{path}` is missing on node `{node}`")]
    MissingField { node: String, path: String },
    #[error("unterminated placeholder in template")]
    Unterminated,
}

/// Text produced for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeContent {
    pub lines: Vec<String>,
    pub error: bool,
}

impl NodeContent {
    fn text(text: &str) -> Self {
        Self {
            lines: text.split('\n').map(str::to_string).collect(),
            error: false,
        }
    }

    pub fn error_placeholder(id: &str) -> Self {
        Self {
            lines: vec![format!("Error reading node {id}.data")],
            error: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer {
    config: TemplateConfig,
}

impl TemplateRenderer {
    pub fn new(config: TemplateConfig) -> Self {
        Self { config }
    }

    /// Renders a node, replacing any template failure with a visible placeholder.
    pub fn render(&self, node: &PositionedNode, is_attached_child: bool) -> NodeContent {
        if let NodeKind::Overflow { hidden, .. } = node.kind {
            return NodeContent::text(&format!("+{hidden} more"));
        }
        let template = node.template.as_deref().unwrap_or(if is_attached_child {
            self.config.children_node_template.as_str()
        } else {
            self.config.node_template.as_str()
        });
        match render_template(template, node) {
            Ok(text) => NodeContent::text(&text),
            Err(err) => {
                warn!(node = %node.id, error = %err, "template rendering failed");
                NodeContent::error_placeholder(&node.id)
            }
        }
    }
}

/// Substitutes `${node.<path>}` placeholders. Paths resolve against the node's own
/// fields only.
pub fn render_template(template: &str, node: &PositionedNode) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for captures in PLACEHOLDER_RE.captures_iter(template) {
        let (Some(whole), Some(path)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        out.push_str(literal(&template[last..whole.start()])?);
        out.push_str(&resolve(path.as_str(), node)?);
        last = whole.end();
    }
    out.push_str(literal(&template[last..])?);
    Ok(out)
}

fn literal(text: &str) -> Result<&str, TemplateError> {
    if text.contains("${") {
        return Err(TemplateError::Unterminated);
    }
    Ok(text)
}

fn resolve(path: &str, node: &PositionedNode) -> Result<String, TemplateError> {
    let mut segments = path.split('.').map(str::trim);
    if segments.next() != Some("node") {
        return Err(TemplateError::Unsupported(path.to_string()));
    }
    match segments.next() {
        Some("id") => Ok(node.id.clone()),
        Some("level") => Ok(node.level.to_string()),
        Some("hasChildren") | Some("fChildren") => Ok(node.has_children.to_string()),
        Some("childrenHidden") | Some("fHideChildren") => Ok(node.children_hidden.to_string()),
        Some("childrenToggle") => Ok(children_toggle(node).to_string()),
        Some("data") | Some("fData") => {
            let mut value = &node.data;
            for segment in segments {
                let next = match value {
                    Value::Object(map) => map.get(segment),
                    Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                    _ => None,
                };
                value = next.ok_or_else(|| TemplateError::MissingField {
                    node: node.id.clone(),
                    path: path.to_string(),
                })?;
            }
            Ok(value_text(value))
        }
        _ => Err(TemplateError::Unsupported(path.to_string())),
    }
}

fn children_toggle(node: &PositionedNode) -> &'static str {
    if !node.has_children {
        ""
    } else if node.children_hidden {
        " ▾"
    } else {
        " ▴"
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(data: Value) -> PositionedNode {
        PositionedNode {
            id: "orders".to_string(),
            kind: NodeKind::Node,
            level: 2,
            x: 0.0,
            y: 0.0,
            width: 200.0,
            height: 52.0,
            parent: None,
            data,
            template: None,
            has_children: true,
            children_hidden: true,
        }
    }

    #[test]
    fn binds_node_fields() {
        let node = node(json!({ "owner": { "team": "sales" }, "tags": ["pii", "gold"], "rows": 42 }));
        let text = render_template(
            "${node.id} @${ node.level } ${node.data.owner.team} ${node.fData.tags.1} ${node.data.rows}${node.childrenToggle}",
            &node,
        )
        .unwrap();
        assert_eq!(text, "orders @2 sales gold 42 ▾");
    }

    #[test]
    fn rejects_anything_but_field_paths() {
        let node = node(json!({}));
        assert_eq!(
            render_template("${alert(1)}", &node),
            Err(TemplateError::Unsupported("alert(1)".to_string()))
        );
        assert!(matches!(
            render_template("${node.data.missing}", &node),
            Err(TemplateError::MissingField { .. })
        ));
        assert_eq!(
            render_template("${node.id", &node),
            Err(TemplateError::Unterminated)
        );
        assert_eq!(
            render_template("${node.id ${node.level}", &node),
            Err(TemplateError::Unterminated)
        );
    }

    #[test]
    fn renderer_replaces_failures_with_placeholder() {
        let renderer = TemplateRenderer::new(TemplateConfig {
            node_template: "${node.data.name}".to_string(),
            ..TemplateConfig::default()
        });
        let content = renderer.render(&node(json!({})), false);
        assert!(content.error);
        assert_eq!(content.lines, vec!["Error reading node orders.data".to_string()]);

        let content = renderer.render(&node(json!({ "name": "Orders\nfact" })), false);
        assert!(!content.error);
        assert_eq!(content.lines, vec!["Orders".to_string(), "fact".to_string()]);
    }

    #[test]
    fn node_override_wins_and_overflow_is_fixed_text() {
        let renderer = TemplateRenderer::default();
        let mut custom = node(json!({}));
        custom.template = Some("custom ${node.id}".to_string());
        assert_eq!(renderer.render(&custom, false).lines, vec!["custom orders"]);

        let mut more = node(Value::Null);
        more.kind = NodeKind::Overflow {
            owner: "orders".to_string(),
            hidden: 7,
        };
        assert_eq!(renderer.render(&more, true).lines, vec!["+7 more"]);
    }
}

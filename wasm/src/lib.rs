use lineage_renderer::ir::Direction;
use lineage_renderer::{Config, RenderOptions, Theme, materialize, parse_lineage};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LineageRenderOptions {
    theme: Option<String>,
    font_family: Option<String>,
    font_size: Option<f32>,
    direction: Option<String>,
    center_node: Option<String>,
    stagger_load: Option<usize>,
    max_children: Option<usize>,
    node_template: Option<String>,
    max_pages: Option<u32>,
}

fn parse_options(options_json: Option<String>) -> Result<LineageRenderOptions, JsValue> {
    match options_json {
        Some(raw_options) => serde_json::from_str::<LineageRenderOptions>(&raw_options)
            .map_err(|error| JsValue::from_str(&error.to_string())),
        None => Ok(LineageRenderOptions::default()),
    }
}

fn build_render_options(options: LineageRenderOptions) -> Result<RenderOptions, String> {
    let mut config = Config::default();
    if options.theme.as_deref() == Some("modern") {
        config.theme = Theme::modern();
        config.render.background = config.theme.background.clone();
    }
    if let Some(font_family) = options.font_family {
        config.theme.font_family = font_family;
    }
    if let Some(font_size) = options.font_size {
        config.theme.font_size = font_size;
    }
    if let Some(raw) = options.direction {
        config.layout.direction =
            Direction::from_token(&raw).ok_or_else(|| format!("unknown direction `{raw}`"))?;
    }
    if options.center_node.is_some() {
        config.pagination.center_node = options.center_node;
    }
    if let Some(stagger) = options.stagger_load {
        config.pagination.stagger_load = stagger.max(1);
    }
    if let Some(max_children) = options.max_children {
        config.layout.max_children = max_children;
    }
    if let Some(template) = options.node_template {
        config.templates.node_template = template;
    }
    Ok(RenderOptions {
        config,
        max_pages: options.max_pages,
    })
}

/// Renders lineage JSON (or JSON5) to SVG.
#[wasm_bindgen]
pub fn render_lineage_svg(input_json: &str, options_json: Option<String>) -> Result<String, JsValue> {
    let data = parse_lineage(input_json).map_err(|error| JsValue::from_str(&error.to_string()))?;
    let options =
        build_render_options(parse_options(options_json)?).map_err(|error| JsValue::from_str(&error))?;
    let controller = materialize(&data, &options);
    Ok(controller.adapter().to_svg(&options.config.render))
}

/// Same as `render_lineage_svg`, with the path through `clicked` highlighted.
#[wasm_bindgen]
pub fn render_highlighted_svg(
    input_json: &str,
    clicked: &str,
    options_json: Option<String>,
) -> Result<String, JsValue> {
    let data = parse_lineage(input_json).map_err(|error| JsValue::from_str(&error.to_string()))?;
    let options =
        build_render_options(parse_options(options_json)?).map_err(|error| JsValue::from_str(&error))?;
    let mut controller = materialize(&data, &options);
    if let Some(state) = controller.highlight(clicked) {
        controller.adapter_mut().apply_highlight(state);
    }
    Ok(controller.adapter().to_svg(&options.config.render))
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub node_fill: String,
    pub node_border: String,
    pub node_text: String,
    pub attached_fill: String,
    pub attached_text: String,
    pub link_color: String,
    pub overlay_link_color: String,
    pub bidirectional_link_color: String,
    pub highlight_color: String,
    pub error_text: String,
    pub background: String,
    /// Opacity of elements outside a highlighted path.
    pub dim_opacity: f32,
}

impl Theme {
    pub fn flow() -> Self {
        Self {
            font_family: "\"IBM Plex Mono\", Menlo, monospace".to_string(),
            font_size: 14.0,
            node_fill: "#F2F4F8".to_string(),
            node_border: "#C1C7D0".to_string(),
            node_text: "#202124".to_string(),
            attached_fill: "#FFFFFF".to_string(),
            attached_text: "#44474F".to_string(),
            link_color: "#6F7785".to_string(),
            overlay_link_color: "#9AA1AD".to_string(),
            bidirectional_link_color: "#7A5CFA".to_string(),
            highlight_color: "#0F62FE".to_string(),
            error_text: "#DA1E28".to_string(),
            background: "#FFFFFF".to_string(),
            dim_opacity: 0.2,
        }
    }

    pub fn modern() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 13.0,
            node_fill: "#F8FAFF".to_string(),
            node_border: "#C7D2E5".to_string(),
            node_text: "#1C2430".to_string(),
            attached_fill: "#EEF2F8".to_string(),
            attached_text: "#1C2430".to_string(),
            link_color: "#7A8AA6".to_string(),
            overlay_link_color: "#A9B4C8".to_string(),
            bidirectional_link_color: "#9370DB".to_string(),
            highlight_color: "#2F6FEB".to_string(),
            error_text: "#C62828".to_string(),
            background: "#FFFFFF".to_string(),
            dim_opacity: 0.25,
        }
    }
}

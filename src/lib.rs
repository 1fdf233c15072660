#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod hierarchy;
pub mod highlight;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod pagination;
pub mod render;
pub mod template;
pub mod text_metrics;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, LayoutConfig, PaginationConfig, RenderConfig, TemplateConfig};
pub use hierarchy::{Hierarchy, build_hierarchy};
pub use highlight::{HighlightState, Materialized, highlight_path};
pub use ir::{Direction, LineageData, RawLink, RawNode, load_lineage, parse_lineage};
pub use layout::{Layout, compute_layout};
pub use pagination::{
    ManualScheduler, PageDraw, PageTag, PaginationController, PaginationError, RenderingAdapter,
    Scheduler,
};
pub use render::SvgSurface;
pub use theme::Theme;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LineageError {
    #[error("invalid lineage input: {message}")]
    Input { message: String },
    #[error("invalid config: {message}")]
    Config { message: String },
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub config: Config,
    /// Stop after this many pages instead of expanding to the whole graph.
    pub max_pages: Option<PageTag>,
}

impl RenderOptions {
    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            max_pages: None,
        }
    }
}

/// Builds, lays out and fully materializes `data`, returning the SVG document.
pub fn render_lineage(data: &LineageData, config: &Config) -> String {
    render_with_options(data, &RenderOptions::with_config(config.clone()))
}

pub fn render_with_options(data: &LineageData, options: &RenderOptions) -> String {
    let controller = materialize(data, options);
    controller.adapter().to_svg(&options.config.render)
}

/// Runs the paginated load to completion (or `max_pages`) on a manual clock.
pub fn materialize(
    data: &LineageData,
    options: &RenderOptions,
) -> PaginationController<SvgSurface, ManualScheduler> {
    let config = &options.config;
    let hierarchy = build_hierarchy(data);
    let layout = compute_layout(&hierarchy, &config.layout);
    let surface = SvgSurface::new(config.theme.clone(), config.templates.clone());
    let mut controller =
        PaginationController::new(surface, ManualScheduler::new(), config.pagination.clone());
    controller.load(hierarchy, layout);
    controller.run_until_idle(options.max_pages);
    controller
}

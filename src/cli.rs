use crate::config::load_config;
use crate::ir::{Direction, LineageData, parse_lineage};
use crate::layout_dump::write_layout_dump;
use crate::render::write_output_svg;
use crate::{RenderOptions, materialize};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lndr", version, about = "Lineage graph renderer")]
pub struct Args {
    /// Input file (JSON or JSON5 lineage) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file (svg/png). Defaults to stdout for SVG if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Width
    #[arg(short = 'w', long = "width", default_value_t = 1200.0)]
    pub width: f32,

    /// Height
    #[arg(short = 'H', long = "height", default_value_t = 800.0)]
    pub height: f32,

    /// Node id to center the initial page on
    #[arg(long = "center")]
    pub center: Option<String>,

    /// Levels added on each side per page
    #[arg(long = "stagger")]
    pub stagger: Option<usize>,

    /// horizontal or vertical
    #[arg(long = "direction")]
    pub direction: Option<String>,

    /// Stop after this many pages
    #[arg(long = "pages")]
    pub pages: Option<u32>,

    /// Write the computed layout as JSON
    #[arg(long = "dump-layout")]
    pub dump_layout: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Svg,
    Png,
}

pub fn run() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    config.render.width = args.width;
    config.render.height = args.height;
    if let Some(center) = &args.center {
        config.pagination.center_node = Some(center.clone());
    }
    if let Some(stagger) = args.stagger {
        config.pagination.stagger_load = stagger;
    }
    if let Some(raw) = &args.direction {
        config.layout.direction = Direction::from_token(raw)
            .ok_or_else(|| anyhow::anyhow!("Unknown direction '{raw}'"))?;
    }

    let data = read_input(args.input.as_deref())?;
    info!(
        nodes = data.nodes.len(),
        links = data.links.len(),
        "lineage loaded"
    );

    let options = RenderOptions {
        config,
        max_pages: args.pages,
    };
    let controller = materialize(&data, &options);
    if let Some(path) = &args.dump_layout {
        write_layout_dump(
            path,
            controller.layout(),
            controller.hierarchy(),
            controller.page_to_levels(),
        )
        .with_context(|| format!("failed to write layout dump to {}", path.display()))?;
    }

    let svg = controller.adapter().to_svg(&options.config.render);
    match args.output_format {
        OutputFormat::Svg => {
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            write_png(&svg, &output, &options.config.render)?;
        }
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

#[cfg(feature = "png")]
fn write_png(svg: &str, output: &Path, render_cfg: &crate::config::RenderConfig) -> Result<()> {
    crate::render::write_output_png(svg, output, render_cfg)
}

#[cfg(not(feature = "png"))]
fn write_png(_svg: &str, _output: &Path, _render_cfg: &crate::config::RenderConfig) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}

fn read_input(path: Option<&Path>) -> Result<LineageData> {
    let content = match path {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        _ => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    Ok(parse_lineage(&content)?)
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}

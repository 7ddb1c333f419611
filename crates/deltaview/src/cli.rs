use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use viewconfig::{BackendKind, DetectionInput};

#[derive(Parser, Debug)]
#[command(
    name = "deltaview",
    author,
    version,
    about = "Grayscale, motion and edge views of a live frame stream",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Configuration file (defaults to `deltaview.toml` in the config directory).
    #[arg(long, value_name = "FILE", env = "DELTAVIEW_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Render without windows; canvases stay offscreen.
    #[arg(long)]
    pub headless: bool,

    /// Stop after this many ticks (headless runs default to 300).
    #[arg(long, value_name = "N")]
    pub ticks: Option<u64>,

    /// Time between headless ticks (e.g. `16ms`).
    #[arg(long, value_name = "DURATION", value_parser = parse_delay)]
    pub tick_interval: Option<Duration>,

    /// Rendering backend: `gpu` or `software` (software implies --headless).
    #[arg(long, value_name = "BACKEND", value_parser = parse_backend, global = true)]
    pub backend: Option<BackendKind>,

    /// Age of the motion reference frame (`750ms`, `2s`, or milliseconds).
    #[arg(long, value_name = "DURATION", value_parser = parse_delay, global = true)]
    pub delay: Option<Duration>,

    /// Edge detector input: `grayscale` or `difference`.
    #[arg(long, value_name = "MODE", value_parser = parse_input_mode, global = true)]
    pub input_mode: Option<DetectionInput>,

    /// Frame source: `pattern`, `solid`, or `images:<DIR>`.
    #[arg(long, value_name = "SOURCE", value_parser = parse_source, global = true)]
    pub source: Option<SourceArg>,

    /// Frame size for synthetic sources and initial window size (e.g. `640x480`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size, global = true)]
    pub size: Option<FrameSize>,

    /// Present without waiting for vertical sync.
    #[arg(long, global = true)]
    pub no_vsync: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the configuration after defaults, file and flags are merged.
    Config(ConfigArgs),
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Emit JSON instead of TOML.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceArg {
    Pattern,
    Solid,
    Images(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_delay(value: &str) -> Result<Duration, String> {
    viewconfig::parse_duration(value)
}

pub fn parse_backend(value: &str) -> Result<BackendKind, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "gpu" | "wgpu" => Ok(BackendKind::Gpu),
        "software" | "cpu" => Ok(BackendKind::Software),
        "" => Err("backend must not be empty".to_string()),
        other => Err(format!("unknown backend '{other}'; expected gpu or software")),
    }
}

pub fn parse_input_mode(value: &str) -> Result<DetectionInput, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "grayscale" | "gray" | "grey" => Ok(DetectionInput::Grayscale),
        "difference" | "diff" | "motion" => Ok(DetectionInput::Difference),
        "" => Err("input mode must not be empty".to_string()),
        other => Err(format!(
            "unknown input mode '{other}'; expected grayscale or difference"
        )),
    }
}

pub fn parse_source(value: &str) -> Result<SourceArg, String> {
    let trimmed = value.trim();
    if let Some(dir) = trimmed.strip_prefix("images:") {
        if dir.is_empty() {
            return Err("images source needs a directory (images:<DIR>)".to_string());
        }
        return Ok(SourceArg::Images(PathBuf::from(dir)));
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "pattern" => Ok(SourceArg::Pattern),
        "solid" => Ok(SourceArg::Solid),
        "" => Err("source must not be empty".to_string()),
        other => Err(format!(
            "unknown source '{other}'; expected pattern, solid, or images:<DIR>"
        )),
    }
}

pub fn parse_size(value: &str) -> Result<FrameSize, String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid width in size".to_string())?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid height in size".to_string())?;
    if width == 0 || height == 0 {
        return Err("size must be greater than zero".into());
    }
    Ok(FrameSize { width, height })
}

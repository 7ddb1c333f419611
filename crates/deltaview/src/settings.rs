use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use viewconfig::{BackendKind, SourceKind, ViewConfig};

use crate::cli::{RunArgs, SourceArg};
use crate::paths::AppPaths;

/// Ticks a headless run performs when `--ticks` is absent.
pub const DEFAULT_HEADLESS_TICKS: u64 = 300;

/// Everything a run needs: the merged file config plus CLI-only switches.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: ViewConfig,
    /// File the config was read from, if any.
    pub config_path: Option<PathBuf>,
    pub headless: bool,
    pub ticks: Option<u64>,
    pub tick_interval: Duration,
}

impl Settings {
    /// Defaults < config file < command-line flags.
    pub fn resolve(args: &RunArgs) -> Result<Self> {
        let (mut config, config_path) = load_config(args)?;
        apply_overrides(&mut config, args);
        config
            .validate()
            .context("configuration is invalid after applying command-line flags")?;

        let headless = args.headless || config.backend == BackendKind::Software;
        if config.backend == BackendKind::Software && !args.headless {
            tracing::info!("software backend renders offscreen; running headless");
        }
        let ticks = match (args.ticks, headless) {
            (Some(ticks), _) => Some(ticks),
            (None, true) => Some(DEFAULT_HEADLESS_TICKS),
            (None, false) => None,
        };

        Ok(Self {
            tick_interval: args.tick_interval.unwrap_or(config.source.frame_interval),
            config,
            config_path,
            headless,
            ticks,
        })
    }
}

fn load_config(args: &RunArgs) -> Result<(ViewConfig, Option<PathBuf>)> {
    if let Some(path) = &args.config {
        let config = ViewConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?;
        return Ok((config, Some(path.clone())));
    }

    let paths = AppPaths::discover()?;
    let candidate = paths.config_file();
    if candidate.is_file() {
        let config = ViewConfig::load(&candidate)
            .with_context(|| format!("failed to load config {}", candidate.display()))?;
        tracing::debug!(path = %candidate.display(), "loaded configuration");
        return Ok((config, Some(candidate)));
    }

    tracing::debug!(
        searched = %candidate.display(),
        "no configuration file; using built-in defaults"
    );
    Ok((ViewConfig::default(), None))
}

pub fn apply_overrides(config: &mut ViewConfig, args: &RunArgs) {
    if let Some(delay) = args.delay {
        config.delay = delay;
    }
    if let Some(mode) = args.input_mode {
        config.input_mode = mode;
    }
    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    match &args.source {
        Some(SourceArg::Pattern) => config.source.kind = SourceKind::Pattern,
        Some(SourceArg::Solid) => config.source.kind = SourceKind::Solid,
        Some(SourceArg::Images(dir)) => {
            config.source.kind = SourceKind::Images;
            config.source.directory = Some(dir.clone());
        }
        None => {}
    }
    if let Some(size) = args.size {
        config.source.width = size.width;
        config.source.height = size.height;
        config.window.width = size.width;
        config.window.height = size.height;
    }
    if args.no_vsync {
        config.window.vsync = false;
    }
}

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use renderer::{GpuCompositor, GpuOptions, SoftwareCompositor, WindowOptions};
use scheduler::{Compositor, FrameScheduler, FrameSource, SchedulerSettings, TickTotals};
use tracing_subscriber::EnvFilter;
use viewconfig::BackendKind;

use crate::cli::RunArgs;
use crate::settings::Settings;
use crate::sources;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run(args: RunArgs) -> Result<()> {
    let settings = Settings::resolve(&args)?;
    let config = &settings.config;
    let config_source = settings
        .config_path
        .as_deref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<defaults>".into());
    tracing::info!(
        backend = ?config.backend,
        source = ?config.source.kind,
        delay_ms = config.delay.as_millis() as u64,
        input_mode = ?config.input_mode,
        headless = settings.headless,
        config = %config_source,
        "starting deltaview"
    );

    let source = sources::from_config(config)?;
    let scheduler_settings = SchedulerSettings::from_config(config);
    let gpu = GpuOptions::from_config(config);

    let totals = if settings.headless {
        let ticks = settings.ticks.unwrap_or(crate::settings::DEFAULT_HEADLESS_TICKS);
        match config.backend {
            BackendKind::Gpu => {
                let compositor = GpuCompositor::headless(&gpu)
                    .context("failed to create headless GPU compositor")?;
                let profile = compositor.adapter_profile();
                tracing::info!(
                    adapter = %profile.name,
                    backend = ?profile.backend,
                    software = profile.is_software(),
                    "rendering offscreen"
                );
                run_headless(compositor, source, scheduler_settings, ticks, settings.tick_interval)?
            }
            BackendKind::Software => run_headless(
                SoftwareCompositor::new(),
                source,
                scheduler_settings,
                ticks,
                settings.tick_interval,
            )?,
        }
    } else {
        if settings.ticks.is_some() {
            tracing::warn!("--ticks only applies to headless runs; ignoring");
        }
        renderer::run_windowed(
            source,
            scheduler_settings,
            WindowOptions {
                gpu,
                width: config.window.width,
                height: config.window.height,
            },
        )?
    };

    println!(
        "rendered {} ticks ({} idle, {} reference refreshes, {} resizes)",
        totals.rendered, totals.idle, totals.refreshes, totals.resizes
    );
    Ok(())
}

/// Ticks `ticks` times at a fixed wall-clock cadence without any window.
pub fn run_headless<C, S>(
    compositor: C,
    source: S,
    settings: SchedulerSettings,
    ticks: u64,
    interval: Duration,
) -> Result<TickTotals>
where
    C: Compositor,
    S: FrameSource,
{
    let mut scheduler = FrameScheduler::new(compositor, source, settings);
    scheduler.start();

    let mut deadline = Instant::now();
    for tick in 0..ticks {
        scheduler
            .tick(Instant::now())
            .with_context(|| format!("pipeline stopped on tick {tick}"))?;
        deadline += interval;
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        }
    }
    Ok(scheduler.totals())
}

//! Per-tick driver for the three-target motion/edge pipeline.
//!
//! This crate knows nothing about GPUs. It owns the timing state of the
//! delayed reference frame, the edge-detector input mode, and the order in
//! which a [`Compositor`] is asked to do its work:
//!
//! ```text
//!   controls ─▶ poll source ─▶ resize? ─▶ upload ─▶ grayscale
//!                                                     │
//!          ┌──────────── mode fork ───────────────────┘
//!          ▼                                   ▼
//!   read grayscale                 difference ─▶ read motion
//!          └─────────────▶ edges ◀─────────────┘
//!                            │
//!        (grayscale mode) difference ─▶ refresh reference? ─▶ present
//! ```

mod compositor;
mod control;
mod delay;
mod error;
mod frame;
mod mode;

use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use tracing::{debug, error, info, warn};
use viewconfig::ViewConfig;

pub use compositor::Compositor;
pub use control::{Control, ControlHandle};
pub use delay::DelayBuffer;
pub use error::PipelineError;
pub use frame::{Dimensions, Frame, FrameError, FrameSource, Readiness};
pub use mode::{InputMode, TargetKind};

const STATS_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub delay: Duration,
    pub input_mode: InputMode,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(1000),
            input_mode: InputMode::Grayscale,
        }
    }
}

impl SchedulerSettings {
    pub fn from_config(config: &ViewConfig) -> Self {
        Self {
            delay: config.delay,
            input_mode: config.input_mode.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Created,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub mode: InputMode,
    pub resized: bool,
    pub reference_refreshed: bool,
    pub presented: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// `start` has not been called, or a fatal error stopped the loop.
    NotRunning,
    /// The producer had no frame ready; nothing was drawn.
    Idle,
    Rendered(TickReport),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickTotals {
    pub rendered: u64,
    pub idle: u64,
    pub refreshes: u64,
    pub resizes: u64,
}

#[derive(Debug, Default)]
struct TickStats {
    totals: TickTotals,
    window_start: Option<Instant>,
    window: TickTotals,
}

impl TickStats {
    fn record(&mut self, outcome: &TickOutcome) {
        for totals in [&mut self.totals, &mut self.window] {
            match outcome {
                TickOutcome::NotRunning => {}
                TickOutcome::Idle => totals.idle += 1,
                TickOutcome::Rendered(report) => {
                    totals.rendered += 1;
                    if report.reference_refreshed {
                        totals.refreshes += 1;
                    }
                    if report.resized {
                        totals.resizes += 1;
                    }
                }
            }
        }
    }

    fn maybe_log(&mut self, now: Instant, mode: InputMode, delay: Duration) {
        let start = *self.window_start.get_or_insert(now);
        if now.saturating_duration_since(start) < STATS_INTERVAL {
            return;
        }
        debug!(
            rendered = self.window.rendered,
            idle = self.window.idle,
            refreshes = self.window.refreshes,
            %mode,
            delay_ms = delay.as_millis() as u64,
            "tick stats"
        );
        self.window = TickTotals::default();
        self.window_start = Some(now);
    }
}

/// Drives one [`Compositor`] from one [`FrameSource`].
pub struct FrameScheduler<C, S> {
    compositor: C,
    source: S,
    mode: InputMode,
    delay: DelayBuffer,
    state: SchedulerState,
    controls: ControlHandle,
    control_rx: Receiver<Control>,
    stats: TickStats,
}

impl<C: Compositor, S: FrameSource> FrameScheduler<C, S> {
    pub fn new(compositor: C, source: S, settings: SchedulerSettings) -> Self {
        let (controls, control_rx) = control::control_channel();
        Self {
            compositor,
            source,
            mode: settings.input_mode,
            delay: DelayBuffer::new(settings.delay),
            state: SchedulerState::Created,
            controls,
            control_rx,
            stats: TickStats::default(),
        }
    }

    /// Arms the loop. Returns `false` if it was already started or has stopped.
    pub fn start(&mut self) -> bool {
        match self.state {
            SchedulerState::Created => {
                info!(
                    mode = %self.mode,
                    delay_ms = self.delay.interval().as_millis() as u64,
                    "frame scheduler started"
                );
                self.state = SchedulerState::Running;
                true
            }
            SchedulerState::Running => {
                debug!("frame scheduler already started");
                false
            }
            SchedulerState::Stopped => false,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn controls(&self) -> ControlHandle {
        self.controls.clone()
    }

    pub fn input_mode(&self) -> InputMode {
        self.mode
    }

    pub fn delay(&self) -> Duration {
        self.delay.interval()
    }

    pub fn delay_buffer(&self) -> &DelayBuffer {
        &self.delay
    }

    pub fn totals(&self) -> TickTotals {
        self.stats.totals
    }

    pub fn compositor(&self) -> &C {
        &self.compositor
    }

    pub fn compositor_mut(&mut self) -> &mut C {
        &mut self.compositor
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn set_input_mode(&mut self, mode: InputMode) {
        if mode != self.mode {
            info!(from = %self.mode, to = %mode, "edge detector input changed");
            self.mode = mode;
        }
    }

    pub fn set_delay(&mut self, delay: Duration) {
        if delay != self.delay.interval() {
            info!(delay_ms = delay.as_millis() as u64, "reference delay changed");
            self.delay.set_interval(delay);
        }
    }

    /// Runs one iteration of the pipeline.
    ///
    /// Fatal errors stop the scheduler and are returned; every later call
    /// yields [`TickOutcome::NotRunning`].
    pub fn tick(&mut self, now: Instant) -> Result<TickOutcome, PipelineError> {
        if self.state != SchedulerState::Running {
            return Ok(TickOutcome::NotRunning);
        }

        self.apply_controls();
        self.source.poll(now);

        let mode = self.mode;
        let result = match self.source.current_frame() {
            Some(frame) if self.source.readiness().can_render() => {
                run_pipeline(&mut self.compositor, &mut self.delay, frame, mode, now)
                    .map(TickOutcome::Rendered)
            }
            _ => Ok(TickOutcome::Idle),
        };

        match result {
            Ok(outcome) => {
                self.stats.record(&outcome);
                self.stats.maybe_log(now, self.mode, self.delay.interval());
                Ok(outcome)
            }
            Err(err) => {
                error!(error = %err, "pipeline failed; stopping frame scheduler");
                self.state = SchedulerState::Stopped;
                Err(err)
            }
        }
    }

    fn apply_controls(&mut self) {
        while let Ok(control) = self.control_rx.try_recv() {
            match control {
                Control::SetDelay(delay) => self.set_delay(delay),
                Control::NudgeDelay(millis) => {
                    let delay = control::nudge(self.delay.interval(), millis);
                    self.set_delay(delay);
                }
                Control::SetInputMode(mode) => self.set_input_mode(mode),
                Control::ToggleInputMode => self.set_input_mode(self.mode.toggled()),
            }
        }
    }
}

fn run_pipeline<C: Compositor>(
    compositor: &mut C,
    delay: &mut DelayBuffer,
    frame: &Frame,
    mode: InputMode,
    now: Instant,
) -> Result<TickReport, PipelineError> {
    let dims = frame.dimensions();
    let resized = dims != compositor.dimensions();
    if resized {
        debug!(from = %compositor.dimensions(), to = %dims, "resizing render targets");
        compositor.resize(dims)?;
        delay.reset();
    }

    compositor.upload_frame(frame)?;
    compositor.render_grayscale()?;

    if mode == InputMode::Difference {
        compositor.render_difference()?;
    }
    let detection_input = compositor.read_pixels(mode.source_target())?;
    compositor.render_edges(&detection_input)?;
    if mode == InputMode::Grayscale {
        compositor.render_difference()?;
    }

    let mut reference_refreshed = false;
    if delay.is_due(now) {
        match compositor.refresh_reference() {
            Ok(()) => {
                delay.mark_refreshed(now);
                reference_refreshed = true;
            }
            Err(err) if !err.is_fatal() => {
                warn!(error = %err, "reference refresh skipped; retrying next tick");
            }
            Err(err) => return Err(err),
        }
    }

    let presented = match compositor.present() {
        Ok(()) => true,
        Err(err) if !err.is_fatal() => {
            warn!(error = %err, "present skipped");
            false
        }
        Err(err) => return Err(err),
    };

    Ok(TickReport {
        mode,
        resized,
        reference_refreshed,
        presented,
    })
}

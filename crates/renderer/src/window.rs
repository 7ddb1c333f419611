use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use scheduler::{
    FrameScheduler, FrameSource, PipelineError, SchedulerSettings, TargetKind, TickTotals,
};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::EventLoop;
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::gpu::{GpuCompositor, GpuOptions};

const DELAY_STEP_MS: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowOptions {
    pub gpu: GpuOptions,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyAction {
    ToggleMode,
    NudgeDelay(i64),
    ResetDelay,
    Exit,
}

pub(crate) fn key_action(key: &Key) -> Option<KeyAction> {
    match key {
        Key::Named(NamedKey::Space) => Some(KeyAction::ToggleMode),
        Key::Named(NamedKey::Escape) => Some(KeyAction::Exit),
        Key::Character(value) => match value.as_str() {
            "m" | "M" | " " => Some(KeyAction::ToggleMode),
            "+" | "=" => Some(KeyAction::NudgeDelay(DELAY_STEP_MS)),
            "-" | "_" => Some(KeyAction::NudgeDelay(-DELAY_STEP_MS)),
            "0" => Some(KeyAction::ResetDelay),
            _ => None,
        },
        _ => None,
    }
}

/// Opens one window per target and drives the scheduler from the grayscale
/// window's redraws until a window closes or the pipeline stops.
pub fn run_windowed<S>(
    source: S,
    settings: SchedulerSettings,
    options: WindowOptions,
) -> Result<TickTotals>
where
    S: FrameSource + 'static,
{
    let event_loop =
        EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let size = PhysicalSize::new(options.width, options.height);
    let mut windows: Vec<Arc<Window>> = Vec::with_capacity(TargetKind::ALL.len());
    for kind in TargetKind::ALL {
        let window = WindowBuilder::new()
            .with_title(format!("deltaview - {kind}"))
            .with_inner_size(size)
            .build(&event_loop)
            .map_err(|err| anyhow!("failed to create {kind} window: {err}"))?;
        windows.push(Arc::new(window));
    }
    let window_ids: Vec<_> = windows.iter().map(|window| window.id()).collect();
    let primary = windows[0].clone();
    let windows: [Arc<Window>; 3] = windows
        .try_into()
        .map_err(|_| anyhow!("expected one window per target"))?;

    let compositor = GpuCompositor::windowed(&options.gpu, windows)
        .context("failed to initialise GPU compositor")?;
    let mut scheduler = FrameScheduler::new(compositor, source, settings);
    scheduler.start();
    let controls = scheduler.controls();
    primary.request_redraw();

    let totals = Rc::new(Cell::new(TickTotals::default()));
    let failure: Rc<RefCell<Option<PipelineError>>> = Rc::new(RefCell::new(None));
    let loop_totals = Rc::clone(&totals);
    let loop_failure = Rc::clone(&failure);

    let run_result = event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, event } => {
            let Some(kind) = window_ids
                .iter()
                .position(|id| *id == window_id)
                .map(|index| TargetKind::ALL[index])
            else {
                return;
            };
            match event {
                WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
                WindowEvent::KeyboardInput { event, .. }
                    if event.state == ElementState::Pressed && !event.repeat =>
                {
                    match key_action(&event.logical_key) {
                        Some(KeyAction::ToggleMode) => controls.toggle_input_mode(),
                        Some(KeyAction::NudgeDelay(millis)) => controls.nudge_delay(millis),
                        Some(KeyAction::ResetDelay) => controls.set_delay(Duration::ZERO),
                        Some(KeyAction::Exit) => elwt.exit(),
                        None => {}
                    }
                }
                WindowEvent::Resized(new_size) => {
                    scheduler.compositor_mut().resize_surface(kind, new_size);
                }
                WindowEvent::RedrawRequested if kind == TargetKind::Grayscale => {
                    match scheduler.tick(Instant::now()) {
                        Ok(_) => loop_totals.set(scheduler.totals()),
                        Err(err) => {
                            loop_failure.borrow_mut().replace(err);
                            elwt.exit();
                        }
                    }
                }
                _ => {}
            }
        }
        Event::AboutToWait => primary.request_redraw(),
        _ => {}
    });
    run_result.map_err(|err| anyhow!("window event loop error: {err}"))?;

    if let Some(err) = failure.borrow_mut().take() {
        return Err(anyhow::Error::new(err).context("pipeline stopped"));
    }
    Ok(totals.get())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_keys_toggle() {
        assert_eq!(
            key_action(&Key::Named(NamedKey::Space)),
            Some(KeyAction::ToggleMode)
        );
        assert_eq!(
            key_action(&Key::Character("m".into())),
            Some(KeyAction::ToggleMode)
        );
        assert_eq!(
            key_action(&Key::Character("M".into())),
            Some(KeyAction::ToggleMode)
        );
    }

    #[test]
    fn delay_keys_step_by_100ms() {
        assert_eq!(
            key_action(&Key::Character("+".into())),
            Some(KeyAction::NudgeDelay(100))
        );
        assert_eq!(
            key_action(&Key::Character("-".into())),
            Some(KeyAction::NudgeDelay(-100))
        );
        assert_eq!(
            key_action(&Key::Character("0".into())),
            Some(KeyAction::ResetDelay)
        );
    }

    #[test]
    fn escape_exits_and_other_keys_are_ignored() {
        assert_eq!(
            key_action(&Key::Named(NamedKey::Escape)),
            Some(KeyAction::Exit)
        );
        assert_eq!(key_action(&Key::Character("q".into())), None);
        assert_eq!(key_action(&Key::Named(NamedKey::Enter)), None);
    }
}

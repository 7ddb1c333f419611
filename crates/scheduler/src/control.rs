use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::mode::InputMode;

/// Runtime parameter changes. Applied at the start of the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    SetDelay(Duration),
    /// Relative adjustment in milliseconds, saturating at zero.
    NudgeDelay(i64),
    SetInputMode(InputMode),
    ToggleInputMode,
}

/// Cloneable sender side handed to keyboard handlers and tests.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: Sender<Control>,
}

impl ControlHandle {
    pub fn send(&self, control: Control) {
        // The scheduler owns the receiver; once it is gone nobody cares.
        let _ = self.tx.send(control);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.send(Control::SetDelay(delay));
    }

    pub fn nudge_delay(&self, millis: i64) {
        self.send(Control::NudgeDelay(millis));
    }

    pub fn set_input_mode(&self, mode: InputMode) {
        self.send(Control::SetInputMode(mode));
    }

    pub fn toggle_input_mode(&self) {
        self.send(Control::ToggleInputMode);
    }
}

pub(crate) fn control_channel() -> (ControlHandle, Receiver<Control>) {
    let (tx, rx) = unbounded();
    (ControlHandle { tx }, rx)
}

pub(crate) fn nudge(delay: Duration, millis: i64) -> Duration {
    let current = delay.as_millis().min(i64::MAX as u128) as i64;
    Duration::from_millis(current.saturating_add(millis).max(0) as u64)
}

use std::fmt;

use viewconfig::DetectionInput;

/// The three outputs, each backed by its own graphics context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetKind {
    Grayscale,
    Motion,
    Edge,
}

impl TargetKind {
    pub const ALL: [TargetKind; 3] = [TargetKind::Grayscale, TargetKind::Motion, TargetKind::Edge];

    pub fn label(self) -> &'static str {
        match self {
            TargetKind::Grayscale => "grayscale",
            TargetKind::Motion => "motion",
            TargetKind::Edge => "edge",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Chooses which signal the edge detector consumes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputMode {
    #[default]
    Grayscale,
    Difference,
}

impl InputMode {
    pub fn toggled(self) -> Self {
        match self {
            InputMode::Grayscale => InputMode::Difference,
            InputMode::Difference => InputMode::Grayscale,
        }
    }

    /// Render target whose canvas is read back for the edge pass.
    pub fn source_target(self) -> TargetKind {
        match self {
            InputMode::Grayscale => TargetKind::Grayscale,
            InputMode::Difference => TargetKind::Motion,
        }
    }
}

impl fmt::Display for InputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputMode::Grayscale => f.write_str("grayscale"),
            InputMode::Difference => f.write_str("difference"),
        }
    }
}

impl From<DetectionInput> for InputMode {
    fn from(value: DetectionInput) -> Self {
        match value {
            DetectionInput::Grayscale => InputMode::Grayscale,
            DetectionInput::Difference => InputMode::Difference,
        }
    }
}

impl From<InputMode> for DetectionInput {
    fn from(value: InputMode) -> Self {
        match value {
            InputMode::Grayscale => DetectionInput::Grayscale,
            InputMode::Difference => DetectionInput::Difference,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_flips_between_modes() {
        assert_eq!(InputMode::Grayscale.toggled(), InputMode::Difference);
        assert_eq!(InputMode::Grayscale.toggled().toggled(), InputMode::Grayscale);
    }

    #[test]
    fn difference_mode_reads_motion_canvas() {
        assert_eq!(InputMode::Difference.source_target(), TargetKind::Motion);
        assert_eq!(InputMode::Grayscale.source_target(), TargetKind::Grayscale);
    }
}

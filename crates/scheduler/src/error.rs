use crate::frame::Dimensions;
use crate::mode::TargetKind;

/// Failure taxonomy shared by every compositor implementation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    #[error("graphics context unavailable for {context}: {reason}")]
    ContextUnavailable { context: String, reason: String },
    #[error("failed to build {program} program:\n{log}")]
    ShaderBuild { program: String, log: String },
    #[error("framebuffer incomplete: {reason}")]
    FramebufferIncomplete { reason: String },
    #[error("{target} target ran out of resources: {reason}")]
    ResourceExhausted { target: TargetKind, reason: String },
    #[error("{target} target rejected a {frame} frame; textures are {expected}")]
    FrameSizeMismatch {
        target: TargetKind,
        frame: Dimensions,
        expected: Dimensions,
    },
    #[error("pixel readback from {target} target failed: {reason}")]
    Readback { target: TargetKind, reason: String },
    #[error("presenting {target} target failed: {reason}")]
    Surface { target: TargetKind, reason: String },
}

impl PipelineError {
    /// Fatal errors stop the scheduler; the rest are retried next tick.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            PipelineError::FramebufferIncomplete { .. } | PipelineError::Surface { .. }
        )
    }
}

//! Renderers for the deltaview pipeline.
//!
//! Two [`scheduler::Compositor`] implementations live here:
//!
//! ```text
//!   FrameScheduler ──▶ GpuCompositor ──▶ grayscale target ──▶ window / canvas
//!                          │           ├─▶ motion target (+ delayed reference)
//!                          │           └─▶ edge target
//!                          └── readback ──▶ upload (crosses contexts)
//!
//!   FrameScheduler ──▶ SoftwareCompositor ──▶ filters (CPU)
//! ```
//!
//! [`GpuCompositor`] gives every target its own wgpu device, so the pixels
//! the edge filter consumes travel through a CPU readback each tick.
//! [`SoftwareCompositor`] runs the same filters on the CPU and doubles as the
//! oracle the GPU path is tested against.

mod compile;
pub mod filters;
mod gpu;
pub mod software;
mod window;

pub use gpu::{AdapterProfile, GpuCompositor, GpuOptions};
pub use software::SoftwareCompositor;
pub use window::{run_windowed, WindowOptions};

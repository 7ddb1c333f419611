//! wgpu side of the pipeline.
//!
//! - `context` picks the adapter and opens one device (plus optional window
//!   surface) per render target.
//! - `resources` allocates textures, the offscreen framebuffer and the quad.
//! - `programs` compiles and links the four filter programs and caches their
//!   uniform locations.
//! - `uniforms` mirrors the resolution block read by the edge filter.
//! - `blit` uploads frames and reads canvases back, which is how pixels cross
//!   between contexts.
//! - `target` is one output: context, programs, textures and draws.
//! - `compositor` wires three targets into a [`scheduler::Compositor`].

mod blit;
mod compositor;
mod context;
mod programs;
mod resources;
mod target;
mod uniforms;

pub use compositor::GpuCompositor;
pub use context::{AdapterProfile, GpuOptions};

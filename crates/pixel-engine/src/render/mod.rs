//! GPU rendering subsystem.
//!
//! Renderers own their GPU resources (pipelines, buffers, textures) and create
//! them lazily from the first `RenderCtx` they see.
//!
//! Convention:
//! - the grid is drawn in device pixels, top-left origin, +Y down
//! - the vertex shader applies `projection * pan_zoom` to scene positions
//! - a second, integer color target receives the cell coordinates for picking

mod common;
mod ctx;

pub mod grid;
pub mod pick;

pub use ctx::{RenderCtx, RenderTarget};
pub use grid::{GridRenderer, GridStyle, GridView};
pub use pick::PickReadback;

#[cfg(test)]
mod wgsl_tests;

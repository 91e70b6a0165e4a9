//! Pixel grid view core.
//!
//! GPU-free half of the grid viewport:
//! - `math`: 4x4 affine matrices (column-major, `f32`)
//! - `pan_zoom`: input → transform state machine with debounced settle detection
//! - `grid`: sparse fill storage and the visible-window instance streamer
//! - `pick`: decoding of picking-target readbacks into hovered grid cells
//!
//! The engine crate owns the window, the GPU and the actual draw calls; it feeds
//! this crate platform-agnostic input and consumes its buffers.

pub mod error;
pub mod grid;
pub mod math;
pub mod pan_zoom;
pub mod pick;

pub use error::ViewError;

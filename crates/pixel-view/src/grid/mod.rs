//! Sparse cell storage and the visible-window instance streamer.

mod sparse;
mod streamer;

pub use sparse::{FillId, FillLookup, SparseGrid};
pub use streamer::{GridConfig, GridStreamer, GridViewport, InstanceBuffer};

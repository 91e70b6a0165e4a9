//! Pixel engine crate.
//!
//! Platform + GPU runtime for the grid editor: window and event loop, GPU device,
//! input translation, frame timing, and the grid / picking renderers that consume
//! `pixel-view` buffers.

pub mod device;
pub mod window;
pub mod input;
pub mod time;
pub mod core;

pub mod logging;
pub mod render;
pub mod paint;

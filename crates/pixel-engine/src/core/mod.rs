//! Contracts between the runtime loop and the application.
//!
//! The runtime owns windows, GPU state and input bookkeeping; applications only
//! see the callbacks in [`App`] and the per-frame [`FrameCtx`].

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::{FrameCtx, WindowCtx};

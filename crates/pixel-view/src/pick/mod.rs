//! GPU picking: decoding readbacks of the integer picking target.

mod buffer;
mod controller;

pub use buffer::{BYTES_PER_PIXEL, PickBuffer, PickSample, RowOrder};
pub use controller::{CellActivated, HoverChanged, PickController};

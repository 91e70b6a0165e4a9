use std::fmt;

use crate::math::InvalidTransform;

/// Errors raised by the view core.
///
/// Setup-time failures (`InvalidViewport`) are meant to be surfaced to the caller.
/// Per-frame problems are logged and skipped instead of being returned.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewError {
    /// A transform could not be inverted (zero or non-finite determinant).
    InvalidTransform,
    /// Viewport extents must be finite and strictly positive.
    InvalidViewport { width: f32, height: f32 },
    /// A pick readback does not match the size implied by its dimensions.
    PickBufferSize { expected: usize, actual: usize },
}

impl fmt::Display for ViewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewError::InvalidTransform => write!(f, "transform is not invertible"),
            ViewError::InvalidViewport { width, height } => {
                write!(f, "invalid viewport extents {width}x{height}")
            }
            ViewError::PickBufferSize { expected, actual } => {
                write!(f, "pick buffer holds {actual} bytes, expected {expected}")
            }
        }
    }
}

impl std::error::Error for ViewError {}

impl From<InvalidTransform> for ViewError {
    fn from(_: InvalidTransform) -> Self {
        ViewError::InvalidTransform
    }
}

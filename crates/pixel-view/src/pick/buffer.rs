use crate::error::ViewError;

/// Bytes per pixel of an `RGBA32 signed-integer` picking target.
pub const BYTES_PER_PIXEL: usize = 16;

/// Which way rows are stored in a readback.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RowOrder {
    /// Row 0 is the top of the screen (wgpu texture copies).
    TopDown,
    /// Row 0 is the bottom of the screen (GL-style `readPixels`).
    BottomUp,
}

/// One decoded picking-target pixel.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PickSample {
    /// A drawn cell `(x, y)`.
    Cell(i32, i32),
    /// Nothing was drawn here.
    Background,
}

/// CPU copy of the picking target.
///
/// Each pixel holds four little-endian `i32`: grid x, grid y, fill id, coverage.
/// Coverage 0 marks background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
    row_order: RowOrder,
}

impl PickBuffer {
    /// Wraps tightly packed pixel rows. The length must be `width * height * 16`.
    pub fn new(data: Vec<u8>, width: u32, height: u32, row_order: RowOrder) -> Result<Self, ViewError> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if data.len() != expected {
            return Err(ViewError::PickBufferSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            row_order,
        })
    }

    /// All-zero buffer.
    pub fn zeroed(width: u32, height: u32, row_order: RowOrder) -> Self {
        Self {
            data: vec![0; width as usize * height as usize * BYTES_PER_PIXEL],
            width,
            height,
            row_order,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn row_order(&self) -> RowOrder {
        self.row_order
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    fn row_bytes(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    fn offset(&self, px: u32, row: u32) -> usize {
        row as usize * self.row_bytes() + px as usize * BYTES_PER_PIXEL
    }

    /// What the picking target holds under a device pixel, `py` measured from
    /// the top of the screen. `None` outside the buffer.
    pub fn sample(&self, px: u32, py: u32) -> Option<PickSample> {
        if px >= self.width || py >= self.height {
            return None;
        }
        let row = match self.row_order {
            RowOrder::TopDown => py,
            RowOrder::BottomUp => self.height - 1 - py,
        };
        let o = self.offset(px, row);
        let lane = |i: usize| -> Option<i32> {
            let at = o + i * 4;
            Some(i32::from_le_bytes(self.data[at..at + 4].try_into().ok()?))
        };

        // Lane 3 is coverage; the target is cleared to zero.
        if lane(3)? == 0 {
            return Some(PickSample::Background);
        }
        Some(PickSample::Cell(lane(0)?, lane(1)?))
    }

    /// Grid cell under a device pixel. `None` outside the buffer or over background.
    pub fn cell_at(&self, px: u32, py: u32) -> Option<(i32, i32)> {
        match self.sample(px, py)? {
            PickSample::Cell(x, y) => Some((x, y)),
            PickSample::Background => None,
        }
    }

    /// Writes a covered cell at a raw storage row (no flip).
    #[cfg(test)]
    pub(crate) fn write_raw(&mut self, px: u32, row: u32, x: i32, y: i32) {
        let o = self.offset(px, row);
        self.data[o..o + 4].copy_from_slice(&x.to_le_bytes());
        self.data[o + 4..o + 8].copy_from_slice(&y.to_le_bytes());
        self.data[o + 12..o + 16].copy_from_slice(&1i32.to_le_bytes());
    }
}

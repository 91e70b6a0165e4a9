//! Asynchronous readback of the picking target.
//!
//! Flow per request:
//! 1. `encode_copy` records a texture → staging-buffer copy into the frame encoder
//! 2. the frame is submitted
//! 3. `submit_map` starts `map_async` on the staging buffer
//! 4. `try_read` polls the device on later frames and hands back the newest result
//!
//! Nothing here blocks. Readbacks that finish out of order are dropped if a newer
//! one has already been delivered.

use std::sync::mpsc::{self, Receiver, TryRecvError};

use pixel_view::pick::{PickBuffer, RowOrder, BYTES_PER_PIXEL};

use super::common::aligned_bytes_per_row;

struct Staged {
    buffer: wgpu::Buffer,
    capacity: u64,
    width: u32,
    height: u32,
    padded_row: u32,
}

impl Staged {
    fn mapped_len(&self) -> u64 {
        self.padded_row as u64 * self.height as u64
    }
}

struct InFlight {
    staged: Staged,
    rx: Receiver<Result<(), wgpu::BufferAsyncError>>,
    seq: u64,
}

#[derive(Default)]
pub struct PickReadback {
    free: Vec<(wgpu::Buffer, u64)>,
    staged: Option<Staged>,
    in_flight: Vec<InFlight>,
    next_seq: u64,
    delivered: Option<u64>,
}

impl PickReadback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a full copy of `texture` into a staging buffer.
    ///
    /// Call once per requested readback, before the encoder is submitted.
    pub fn encode_copy(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        texture: &wgpu::Texture,
        (width, height): (u32, u32),
    ) {
        if width == 0 || height == 0 {
            return;
        }
        if let Some(prev) = self.staged.take() {
            // Never submitted for mapping; reuse it.
            self.free.push((prev.buffer, prev.capacity));
        }

        let padded_row = aligned_bytes_per_row(width * BYTES_PER_PIXEL as u32);
        let size = padded_row as u64 * height as u64;
        let (buffer, capacity) = self.take_buffer(device, size);

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        self.staged = Some(Staged {
            buffer,
            capacity,
            width,
            height,
            padded_row,
        });
    }

    /// True between `encode_copy` and `submit_map`.
    pub fn has_staged(&self) -> bool {
        self.staged.is_some()
    }

    /// Number of readbacks waiting for the GPU.
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    /// Starts mapping the staged copy. Must run after the queue submit that
    /// contains the copy.
    pub fn submit_map(&mut self) {
        let Some(staged) = self.staged.take() else { return };

        let (tx, rx) = mpsc::channel();
        staged
            .buffer
            .slice(..staged.mapped_len())
            .map_async(wgpu::MapMode::Read, move |result| {
                let _ = tx.send(result);
            });

        let seq = self.next_seq;
        self.next_seq += 1;
        if !self.in_flight.is_empty() {
            log::trace!("pick readback #{seq} queued behind {}", self.in_flight.len());
        }
        self.in_flight.push(InFlight { staged, rx, seq });
    }

    /// Polls the device once and returns the newest completed readback, if any.
    pub fn try_read(&mut self, device: &wgpu::Device) -> Option<PickBuffer> {
        if self.in_flight.is_empty() {
            return None;
        }
        let _ = device.poll(wgpu::PollType::Poll);

        let mut newest = None;
        let mut i = 0;
        while i < self.in_flight.len() {
            match self.in_flight[i].rx.try_recv() {
                Err(TryRecvError::Empty) => i += 1,
                Ok(Ok(())) => {
                    let done = self.in_flight.remove(i);
                    let stale = self.delivered.is_some_and(|d| done.seq < d);
                    if !stale {
                        if let Some(buffer) = read_mapped(&done.staged) {
                            self.delivered = Some(done.seq);
                            newest = Some(buffer);
                        }
                    } else {
                        log::trace!("dropping stale pick readback #{}", done.seq);
                    }
                    done.staged.buffer.unmap();
                    self.free.push((done.staged.buffer, done.staged.capacity));
                }
                Ok(Err(err)) => {
                    let done = self.in_flight.remove(i);
                    log::warn!("pick readback #{} failed: {err}", done.seq);
                    self.free.push((done.staged.buffer, done.staged.capacity));
                }
                Err(TryRecvError::Disconnected) => {
                    let done = self.in_flight.remove(i);
                    log::warn!("pick readback #{} lost its map callback", done.seq);
                }
            }
        }
        newest
    }

    fn take_buffer(&mut self, device: &wgpu::Device, size: u64) -> (wgpu::Buffer, u64) {
        if let Some(pos) = self.free.iter().position(|(_, cap)| *cap >= size) {
            return self.free.swap_remove(pos);
        }
        // Anything smaller than the current surface is useless from here on.
        self.free.clear();

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pixel pick staging"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        (buffer, size)
    }
}

fn read_mapped(staged: &Staged) -> Option<PickBuffer> {
    let view = staged.buffer.slice(..staged.mapped_len()).get_mapped_range();
    let tight = staged.width as usize * BYTES_PER_PIXEL;
    let data = strip_row_padding(&view, tight, staged.padded_row as usize, staged.height as usize);
    drop(view);

    match PickBuffer::new(data, staged.width, staged.height, RowOrder::TopDown) {
        Ok(buffer) => Some(buffer),
        Err(err) => {
            log::warn!("discarding pick readback: {err}");
            None
        }
    }
}

/// Copies `height` rows of `row_bytes` out of a buffer laid out with `padded_row` stride.
fn strip_row_padding(src: &[u8], row_bytes: usize, padded_row: usize, height: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(row_bytes * height);
    for row in src.chunks(padded_row).take(height) {
        out.extend_from_slice(&row[..row_bytes.min(row.len())]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixel_view::pick::PickSample;

    #[test]
    fn padding_is_dropped_per_row() {
        // 2 rows, 3 payload bytes, stride 5
        let src = [1, 2, 3, 0, 0, 4, 5, 6, 0, 0];
        assert_eq!(strip_row_padding(&src, 3, 5, 2), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn stripped_rows_decode_as_top_down() {
        let width = 3usize;
        let padded = aligned_bytes_per_row((width * BYTES_PER_PIXEL) as u32) as usize;
        let mut src = vec![0u8; padded * 2];
        // pixel (2, 1) holds covered cell (5, -3)
        let o = padded + 2 * BYTES_PER_PIXEL;
        src[o..o + 4].copy_from_slice(&5i32.to_le_bytes());
        src[o + 4..o + 8].copy_from_slice(&(-3i32).to_le_bytes());
        src[o + 12..o + 16].copy_from_slice(&1i32.to_le_bytes());

        let data = strip_row_padding(&src, width * BYTES_PER_PIXEL, padded, 2);
        let buffer = PickBuffer::new(data, 3, 2, RowOrder::TopDown).unwrap();
        assert_eq!(buffer.cell_at(2, 1), Some((5, -3)));
        assert_eq!(buffer.sample(2, 0), Some(PickSample::Background));
    }

    #[test]
    fn nothing_pending_by_default() {
        let r = PickReadback::new();
        assert!(!r.has_staged());
        assert_eq!(r.pending(), 0);
    }
}

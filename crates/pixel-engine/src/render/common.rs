//! Shared GPU types and helpers for the grid renderers.

use bytemuck::{Pod, Zeroable};

// ── quad vertex ───────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct QuadVertex {
    pub pos: [f32; 2], // 0..1
}

impl QuadVertex {
    const ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

    pub(super) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

pub(super) const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex { pos: [0.0, 0.0] },
    QuadVertex { pos: [1.0, 0.0] },
    QuadVertex { pos: [1.0, 1.0] },
    QuadVertex { pos: [0.0, 1.0] },
];

/// Two triangles per cell.
pub(super) const QUAD_FILL_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

/// Closed outline as a line strip.
pub(super) const QUAD_LINE_INDICES: [u16; 5] = [0, 1, 2, 3, 0];

// ── formats ───────────────────────────────────────────────────────────────

/// Picking target: grid x, grid y, fill id, coverage.
pub(super) const PICK_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Sint;

// ── blend ─────────────────────────────────────────────────────────────────

pub(super) fn premul_alpha_blend() -> wgpu::BlendState {
    let component = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState {
        color: component,
        alpha: component,
    }
}

// ── buffers ───────────────────────────────────────────────────────────────

/// Minimum binding size for a uniform struct `T`.
pub(super) fn min_binding_size<T>() -> Option<std::num::NonZeroU64> {
    std::num::NonZeroU64::new(std::mem::size_of::<T>() as u64)
}

/// `bytes_per_row` padded to `COPY_BYTES_PER_ROW_ALIGNMENT` (256).
pub(super) fn aligned_bytes_per_row(unpadded: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_pad_to_256() {
        assert_eq!(aligned_bytes_per_row(16), 256);
        assert_eq!(aligned_bytes_per_row(256), 256);
        assert_eq!(aligned_bytes_per_row(16 * 17), 512);
    }

    #[test]
    fn outline_closes_the_quad() {
        assert_eq!(QUAD_LINE_INDICES.first(), QUAD_LINE_INDICES.last());
    }
}

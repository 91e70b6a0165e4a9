use crate::error::ViewError;
use crate::pan_zoom::PanZoomState;

use super::sparse::{FillId, FillLookup};

/// Grid geometry.
#[derive(Debug, Clone)]
pub struct GridConfig {
    /// Cell edge in logical pixels at zoom 1.
    pub cell_size: f32,
    /// Extra columns / rows streamed around the visible window.
    pub padding: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_size: 12.0,
            padding: 2,
        }
    }
}

/// Drawable extents in device pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GridViewport {
    pub dpr: f32,
    pub width: f32,
    pub height: f32,
}

impl GridViewport {
    pub fn validate(&self) -> Result<(), ViewError> {
        let ok = |v: f32| v.is_finite() && v > 0.0;
        if ok(self.width) && ok(self.height) && ok(self.dpr) {
            Ok(())
        } else {
            Err(ViewError::InvalidViewport {
                width: self.width,
                height: self.height,
            })
        }
    }
}

/// Per-instance triples `(scene_x, scene_y, fill_id)`, row-major over the window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceBuffer {
    data: Vec<i16>,
}

impl InstanceBuffer {
    /// `i16` values per instance.
    pub const STRIDE: usize = 3;

    fn with_count(count: usize) -> Self {
        Self {
            data: vec![0; count * Self::STRIDE],
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[i16] {
        &self.data
    }

    /// Instance count.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len() / Self::STRIDE
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<[i16; 3]> {
        let s = index * Self::STRIDE;
        let t = self.data.get(s..s + Self::STRIDE)?;
        Some([t[0], t[1], t[2]])
    }

    pub fn iter(&self) -> impl Iterator<Item = [i16; 3]> + '_ {
        self.data.chunks_exact(Self::STRIDE).map(|t| [t[0], t[1], t[2]])
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
struct FillMemo {
    scene_delta: [i32; 2],
    scaled_size: f32,
}

/// Streams the visible window of an unbounded grid into a fixed instance buffer.
///
/// The buffer covers `cols * rows` slots sized to the viewport (plus padding).
/// Each fill maps slots to scene cells from the current origin; it only runs when
/// the window moved by a whole cell, the zoom changed, or [`Self::invalidate`]
/// was called.
#[derive(Debug)]
pub struct GridStreamer {
    config: GridConfig,
    viewport: Option<GridViewport>,
    cols: u32,
    rows: u32,
    dpr_size: f32,
    scene_delta: [i32; 2],
    instances: InstanceBuffer,
    memo: Option<FillMemo>,
    needs_update: bool,
    refills: u64,
}

impl GridStreamer {
    pub fn new(config: GridConfig) -> Self {
        Self {
            config,
            viewport: None,
            cols: 0,
            rows: 0,
            dpr_size: 0.0,
            scene_delta: [0, 0],
            instances: InstanceBuffer::default(),
            memo: None,
            needs_update: true,
            refills: 0,
        }
    }

    pub fn initialize(&mut self, viewport: GridViewport) -> Result<(), ViewError> {
        viewport.validate()?;
        self.apply_viewport(viewport);
        Ok(())
    }

    /// Like [`Self::initialize`], but an invalid viewport keeps the current buffers.
    pub fn resize(&mut self, viewport: GridViewport) {
        if let Err(e) = viewport.validate() {
            log::warn!("grid resize ignored: {e}");
            return;
        }
        self.apply_viewport(viewport);
    }

    fn apply_viewport(&mut self, vp: GridViewport) {
        let size = self.config.cell_size;
        let pad = self.config.padding;

        self.cols = (vp.width / (size * vp.dpr)).ceil() as u32 + pad;
        self.rows = (vp.height / vp.dpr / size).ceil() as u32 + pad;
        self.dpr_size = size * vp.dpr;
        self.instances = InstanceBuffer::with_count(self.cols as usize * self.rows as usize);
        self.viewport = Some(vp);
        self.needs_update = true;

        log::debug!(
            "grid window {}x{} cells ({} instances, cell {}px)",
            self.cols,
            self.rows,
            self.instance_count(),
            self.dpr_size
        );
    }

    /// Forces the next [`Self::fill`] to rewrite the buffer.
    pub fn invalidate(&mut self) {
        self.needs_update = true;
    }

    /// Refills the instance buffer for the current transform.
    ///
    /// Returns `true` when the buffer was rewritten and should be uploaded.
    pub fn fill(&mut self, state: &PanZoomState, grid: &impl FillLookup) -> bool {
        if self.viewport.is_none() {
            log::trace!("grid fill before initialize");
            return false;
        }

        let [ox, oy, zoom] = state.origin_at();
        let scaled_size = self.dpr_size * zoom;
        if !ox.is_finite() || !oy.is_finite() || !scaled_size.is_finite() || scaled_size <= 0.0 {
            log::warn!("grid fill skipped: origin {:?} is not usable", state.origin_at());
            return false;
        }

        let half = (self.config.padding / 2) as i32;
        let scene_delta = [
            ((ox / scaled_size).floor() as i32).saturating_add(half),
            ((oy / scaled_size).floor() as i32).saturating_add(half),
        ];

        let memo = FillMemo {
            scene_delta,
            scaled_size,
        };
        if !self.needs_update && self.memo == Some(memo) {
            return false;
        }

        let cols = self.cols as usize;
        for (i, slot) in self.instances.data.chunks_exact_mut(InstanceBuffer::STRIDE).enumerate() {
            let x = ((i % cols) as i32).saturating_sub(scene_delta[0]);
            let y = ((i / cols) as i32).saturating_sub(scene_delta[1]);
            let fill = grid.fill_at(x, y).unwrap_or(0);

            slot[0] = saturate(x);
            slot[1] = saturate(y);
            slot[2] = fill_to_i16(fill);
        }

        self.scene_delta = scene_delta;
        self.memo = Some(memo);
        self.needs_update = false;
        self.refills += 1;
        true
    }

    #[inline]
    pub fn instances(&self) -> &InstanceBuffer {
        &self.instances
    }

    #[inline]
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    #[inline]
    pub fn cols(&self) -> u32 {
        self.cols
    }

    #[inline]
    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Cell edge in device pixels at zoom 1.
    #[inline]
    pub fn dpr_size(&self) -> f32 {
        self.dpr_size
    }

    /// Scene offset of the last fill: slot `(col, row)` shows cell `(col, row) - scene_delta`.
    #[inline]
    pub fn scene_delta(&self) -> [i32; 2] {
        self.scene_delta
    }

    #[inline]
    pub fn viewport(&self) -> Option<GridViewport> {
        self.viewport
    }

    #[inline]
    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Number of buffer rewrites so far.
    #[inline]
    pub fn refills(&self) -> u64 {
        self.refills
    }
}

#[inline]
fn saturate(v: i32) -> i16 {
    v.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

#[inline]
fn fill_to_i16(fill: FillId) -> i16 {
    fill.min(i16::MAX as u16) as i16
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use std::time::Instant;

    use super::*;
    use crate::grid::SparseGrid;
    use crate::pan_zoom::{PanZoomConfig, PanZoomController};

    fn state_at(origin: [f32; 3]) -> PanZoomState {
        let mut s = PanZoomState::new(Duration::from_millis(60));
        s.set_origin_at(origin);
        s
    }

    fn streamer(dpr: f32, width: f32, height: f32) -> GridStreamer {
        let mut g = GridStreamer::new(GridConfig::default());
        g.initialize(GridViewport { dpr, width, height }).unwrap();
        g
    }

    // ── sizing ────────────────────────────────────────────────────────────

    #[test]
    fn window_size_follows_viewport_and_dpr() {
        let g = streamer(2.0, 800.0, 600.0);
        assert_eq!(g.cols(), 36);
        assert_eq!(g.rows(), 27);
        assert_eq!(g.instance_count(), 36 * 27);
        assert_eq!(g.instances().as_slice().len(), 36 * 27 * 3);
        assert_eq!(g.dpr_size(), 24.0);
    }

    #[test]
    fn invalid_viewport_is_rejected() {
        let mut g = GridStreamer::new(GridConfig::default());
        let err = g.initialize(GridViewport {
            dpr: 1.0,
            width: 0.0,
            height: 100.0,
        });
        assert_eq!(
            err,
            Err(ViewError::InvalidViewport {
                width: 0.0,
                height: 100.0
            })
        );
        assert!(g.viewport().is_none());
    }

    #[test]
    fn invalid_resize_keeps_buffers() {
        let mut g = streamer(1.0, 120.0, 72.0);
        g.resize(GridViewport {
            dpr: 1.0,
            width: f32::NAN,
            height: 72.0,
        });
        assert_eq!(g.cols(), 12);
        assert_eq!(g.instance_count(), 12 * 8);
    }

    // ── fill ──────────────────────────────────────────────────────────────

    #[test]
    fn fill_maps_slots_to_scene_cells() {
        let grid: SparseGrid = [((-1, -1), 3), ((0, 0), 5)].into_iter().collect();
        let mut g = streamer(1.0, 120.0, 72.0);

        assert!(g.fill(&state_at([0.0, 0.0, 3.0]), &grid));
        assert_eq!(g.scene_delta(), [1, 1]);
        assert_eq!(g.instances().get(0), Some([-1, -1, 3]));
        assert_eq!(g.instances().get(1), Some([0, -1, 0]));
        assert_eq!(g.instances().get(13), Some([0, 0, 5]));
        assert_eq!(g.instances().get(12 * 8), None);
    }

    #[test]
    fn panning_by_whole_cells_shifts_window() {
        let grid = SparseGrid::new();
        let mut g = streamer(1.0, 120.0, 72.0);

        g.fill(&state_at([-40.0, 0.0, 3.0]), &grid);
        assert_eq!(g.scene_delta(), [-1, 1]);
        assert_eq!(g.instances().get(0), Some([1, -1, 0]));
    }

    #[test]
    fn unchanged_window_skips_refill() {
        let grid = SparseGrid::new();
        let mut g = streamer(1.0, 120.0, 72.0);

        assert!(g.fill(&state_at([0.0, 0.0, 3.0]), &grid));
        // Sub-cell movement keeps the same scene delta.
        assert!(!g.fill(&state_at([10.0, 5.0, 3.0]), &grid));
        assert_eq!(g.refills(), 1);

        g.invalidate();
        assert!(g.fill(&state_at([10.0, 5.0, 3.0]), &grid));
        assert_eq!(g.refills(), 2);

        // Zoom change alone forces a refill.
        assert!(g.fill(&state_at([10.0, 5.0, 3.5]), &grid));
        assert_eq!(g.refills(), 3);
    }

    #[test]
    fn idle_controller_ticks_refill_once() {
        let grid: SparseGrid = [((0, 0), 1)].into_iter().collect();
        let mut g = streamer(1.0, 120.0, 72.0);
        let mut c = PanZoomController::new(PanZoomConfig::default());
        c.initialize(1.0);
        c.start_event_listeners();

        let t0 = Instant::now();
        assert!(c.on_frame(t0).updated);
        assert!(g.fill(c.state(), &grid));

        assert!(!c.on_frame(t0 + Duration::from_millis(16)).updated);
        assert!(!g.fill(c.state(), &grid));
        assert_eq!(g.refills(), 1);
    }

    #[test]
    fn resize_forces_refill() {
        let grid = SparseGrid::new();
        let mut g = streamer(1.0, 120.0, 72.0);
        let s = state_at([0.0, 0.0, 3.0]);
        assert!(g.fill(&s, &grid));

        g.resize(GridViewport {
            dpr: 1.0,
            width: 240.0,
            height: 72.0,
        });
        assert!(g.fill(&s, &grid));
        assert_eq!(g.instance_count(), 22 * 8);
    }

    #[test]
    fn unusable_origin_skips_frame() {
        let grid = SparseGrid::new();
        let mut g = streamer(1.0, 120.0, 72.0);
        assert!(!g.fill(&state_at([f32::NAN, 0.0, 3.0]), &grid));
        assert!(!g.fill(&state_at([0.0, 0.0, 0.0]), &grid));
        assert_eq!(g.refills(), 0);

        assert!(g.fill(&state_at([0.0, 0.0, 3.0]), &grid));
    }

    #[test]
    fn fill_before_initialize_is_noop() {
        let mut g = GridStreamer::new(GridConfig::default());
        assert!(!g.fill(&state_at([0.0, 0.0, 3.0]), &SparseGrid::new()));
    }

    #[test]
    fn far_scene_coordinates_saturate() {
        let grid = SparseGrid::new();
        let mut g = streamer(1.0, 120.0, 72.0);
        g.fill(&state_at([-36.0 * 40_000.0, 36.0 * 40_000.0, 3.0]), &grid);

        let [x, y, _] = g.instances().get(0).unwrap();
        assert_eq!(x, i16::MAX);
        assert_eq!(y, i16::MIN);
    }

    #[test]
    fn huge_finite_origin_saturates_without_overflow() {
        let grid = SparseGrid::new();
        let mut g = streamer(1.0, 120.0, 72.0);
        assert!(g.fill(&state_at([1e30, -1e30, 3.0]), &grid));
        assert_eq!(g.scene_delta(), [i32::MAX, i32::MIN + 1]);

        let [x, y, _] = g.instances().get(0).unwrap();
        assert_eq!((x, y), (i16::MIN, i16::MAX));
        let [x, y, _] = g.instances().get(g.instance_count() - 1).unwrap();
        assert_eq!((x, y), (i16::MIN, i16::MAX));
    }
}

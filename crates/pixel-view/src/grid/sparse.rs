use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// Palette index of a cell. `0` means empty.
pub type FillId = u16;

/// Read-only view of a document's cell fills.
pub trait FillLookup {
    fn fill_at(&self, x: i32, y: i32) -> Option<FillId>;
}

/// Sparse two-level map `x → y → fill`.
///
/// Only non-empty cells are stored. Removing the last cell of a column drops the
/// column, so `columns()` always counts populated columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SparseGrid {
    columns: HashMap<i32, HashMap<i32, FillId>>,
    len: usize,
}

impl SparseGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, x: i32, y: i32) -> Option<FillId> {
        self.columns.get(&x).and_then(|col| col.get(&y)).copied()
    }

    /// Sets a cell and returns the previous fill. A fill of `0` deletes the cell.
    pub fn set(&mut self, x: i32, y: i32, fill: FillId) -> Option<FillId> {
        if fill == 0 {
            return self.delete(x, y);
        }
        let prev = self.columns.entry(x).or_default().insert(y, fill);
        if prev.is_none() {
            self.len += 1;
        }
        prev
    }

    pub fn delete(&mut self, x: i32, y: i32) -> Option<FillId> {
        let Entry::Occupied(mut col) = self.columns.entry(x) else {
            return None;
        };
        let prev = col.get_mut().remove(&y);
        if col.get().is_empty() {
            col.remove();
        }
        if prev.is_some() {
            self.len -= 1;
        }
        prev
    }

    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.get(x, y).is_some()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of populated columns (outer keys).
    #[inline]
    pub fn columns(&self) -> usize {
        self.columns.len()
    }

    /// All stored cells, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = ((i32, i32), FillId)> + '_ {
        self.columns
            .iter()
            .flat_map(|(&x, col)| col.iter().map(move |(&y, &fill)| ((x, y), fill)))
    }

    pub fn clear(&mut self) {
        self.columns.clear();
        self.len = 0;
    }
}

impl FillLookup for SparseGrid {
    #[inline]
    fn fill_at(&self, x: i32, y: i32) -> Option<FillId> {
        self.get(x, y)
    }
}

impl FromIterator<((i32, i32), FillId)> for SparseGrid {
    fn from_iter<I: IntoIterator<Item = ((i32, i32), FillId)>>(iter: I) -> Self {
        let mut grid = SparseGrid::new();
        for ((x, y), fill) in iter {
            grid.set(x, y, fill);
        }
        grid
    }
}

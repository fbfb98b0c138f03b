// THEORY:
// The `GridMapper` coarsens blob positions into a fixed 5x3 grid so the decision
// rules can reason about "left of centre, near the floor" instead of raw pixels.
//
// |=================================================================|
// |     (0,0)     |              |  |               |               |
// |---------------|--------------|--|---------------|---------------|
// |               |              |  |               |               |
// |---------------|--------------|--|---------------|---------------|
// |               |              |  |               |     (4,2)     |
// |=================================================================|
//
// Key architectural principles:
// 1.  **Asymmetric Columns**: The outer columns each take a third of the width; the
//     middle third is split into two shoulders and a narrow centre band of W/6 so
//     that "dead ahead" is a tight target.
// 2.  **Fixed Boundaries**: All cut points are fractions of the frame size computed
//     once in `new`. They are real-valued and never recomputed mid-run.
// 3.  **Deduplication**: Several blobs in the same cell count once; the first
//     appearance fixes the order.
// 4.  **Fail-Fast Batches**: A missing centroid anywhere in the batch empties the
//     whole result for that cycle rather than being skipped on its own.

use crate::core_modules::blob_locator::Centroid;

pub const GRID_COLUMNS: u8 = 5;
pub const GRID_ROWS: u8 = 3;

/// One cell of the 5x3 quantization grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridCell {
    /// 0 (far left) to 4 (far right).
    pub column: u8,
    /// 0 (top) to 2 (bottom).
    pub row: u8,
}

impl GridCell {
    pub fn new(column: u8, row: u8) -> Self {
        Self { column, row }
    }
}

/// Quantizes centroids for frames of one fixed size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridMapper {
    width: u32,
    height: u32,
    /// W/3
    left_edge: f64,
    /// W/2 - W/12
    centre_left: f64,
    /// W/2 + W/12
    centre_right: f64,
    /// 2W/3
    right_edge: f64,
    /// H/3
    upper_edge: f64,
    /// 2H/3
    lower_edge: f64,
}

impl GridMapper {
    /// Creates a mapper for a given frame dimension.
    pub fn new(width: u32, height: u32) -> Self {
        let w = width as f64;
        let h = height as f64;
        Self {
            width,
            height,
            left_edge: w / 3.0,
            centre_left: w / 2.0 - w / 12.0,
            centre_right: w / 2.0 + w / 12.0,
            right_edge: w * 2.0 / 3.0,
            upper_edge: h / 3.0,
            lower_edge: h * 2.0 / 3.0,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn column_of(&self, x: u32) -> u8 {
        let x = x as f64;
        if x < self.left_edge {
            0
        } else if x < self.centre_left {
            1
        } else if x <= self.centre_right {
            2
        } else if x <= self.right_edge {
            3
        } else {
            4
        }
    }

    pub fn row_of(&self, y: u32) -> u8 {
        let y = y as f64;
        if y < self.upper_edge {
            0
        } else if y <= self.lower_edge {
            1
        } else {
            2
        }
    }

    pub fn cell_of(&self, centroid: &Centroid) -> GridCell {
        GridCell::new(self.column_of(centroid.x), self.row_of(centroid.y))
    }

    /// Quantizes a batch in which some detections may be missing.
    ///
    /// Any `None` in the batch empties the whole result. Otherwise the cells are
    /// returned deduplicated, in order of first appearance.
    pub fn quantize(&self, centroids: &[Option<Centroid>]) -> Vec<GridCell> {
        let mut cells: Vec<GridCell> = Vec::with_capacity(centroids.len());
        for centroid in centroids {
            let Some(centroid) = centroid else {
                return Vec::new();
            };
            let cell = self.cell_of(centroid);
            if !cells.contains(&cell) {
                cells.push(cell);
            }
        }
        cells
    }

    /// Quantizes a batch of located centroids.
    pub fn quantize_located(&self, centroids: &[Centroid]) -> Vec<GridCell> {
        let batch: Vec<Option<Centroid>> = centroids.iter().copied().map(Some).collect();
        self.quantize(&batch)
    }
}

/// Free-function form of [`GridMapper::quantize`].
pub fn quantize(width: u32, height: u32, centroids: &[Option<Centroid>]) -> Vec<GridCell> {
    GridMapper::new(width, height).quantize(centroids)
}

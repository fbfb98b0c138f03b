// THEORY:
// The `BlobLocator` is the engine of the Spatial Grouping Layer. It takes the binary
// `Mask` produced by the `ColorSegmenter` and answers one question: *where* is the
// matching color? The answer is a list of `Centroid`s in frame pixel coordinates.
//
// Two strategies are provided behind the same `BlobLocator` trait:
//
// 1.  **Single Centroid (aggregate moment)**: The whole mask is treated as one blob.
//     The zeroth and first image moments are accumulated over every foreground pixel
//     and their ratio is the answer. Cheap, and robust when only one object of the
//     tracked color can be in view. An empty mask (m00 == 0) yields no centroid.
//
// 2.  **Multi Centroid (external contours)**: Every separate blob gets its own
//     centroid. The algorithm steps are:
//     a.  **Component Labelling**: Foreground pixels are grouped into 8-connected
//         components with a breadth-first region grow, in raster discovery order.
//     b.  **Exterior Flood**: Background is flooded (4-connected) from the frame
//         border. A component that neither touches the border nor borders this
//         exterior background sits inside another blob's hole and is not external.
//     c.  **Boundary Tracing**: The outer boundary of each external component is
//         walked with Moore-neighbour tracing, starting at its first raster pixel.
//         The boundary is a closed polygon through pixel centres.
//     d.  **Polygon Moments**: Area and first moments of that polygon come from
//         Green's theorem. Thin blobs (a single pixel, a one-pixel-wide line) enclose
//         no area and are dropped by the minimum-area filter.
//
// Both strategies truncate the moment ratio toward zero to get integer pixels.
// The locator is a stateless utility with no memory of previous frames.

use crate::core_modules::color_segmenter::{Mask, BACKGROUND};

/// Blobs whose contour encloses less than this many square pixels are ignored.
pub const MIN_BLOB_AREA: f64 = 0.5;

/// An integer pixel coordinate of a blob's area-weighted centre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Centroid {
    pub x: u32,
    pub y: u32,
}

impl Centroid {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Extracts blob centroids from a binary mask.
pub trait BlobLocator: Send + Sync {
    fn locate(&self, mask: &Mask) -> Vec<Centroid>;
}

/// Treats the whole mask as a single blob.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleCentroidLocator;

impl BlobLocator for SingleCentroidLocator {
    fn locate(&self, mask: &Mask) -> Vec<Centroid> {
        blob_locator::aggregate_centroid(mask).into_iter().collect()
    }
}

/// One centroid per external contour with at least `min_area` enclosed area.
#[derive(Debug, Clone, Copy)]
pub struct MultiCentroidLocator {
    pub min_area: f64,
}

impl Default for MultiCentroidLocator {
    fn default() -> Self {
        Self {
            min_area: MIN_BLOB_AREA,
        }
    }
}

impl BlobLocator for MultiCentroidLocator {
    fn locate(&self, mask: &Mask) -> Vec<Centroid> {
        blob_locator::contour_centroids(mask, self.min_area)
    }
}

pub mod blob_locator {
    use super::*; // Make structs from parent module available.

    /// Offsets of the 8 neighbours, clockwise on screen (y grows downward),
    /// starting from West.
    const NEIGHBOURS: [(i64, i64); 8] = [
        (-1, 0),
        (-1, -1),
        (0, -1),
        (1, -1),
        (1, 0),
        (1, 1),
        (0, 1),
        (-1, 1),
    ];
    const WEST: usize = 0;

    /// Centroid of all foreground pixels taken together.
    pub fn aggregate_centroid(mask: &Mask) -> Option<Centroid> {
        let mut m00 = 0u64;
        let mut m10 = 0u64;
        let mut m01 = 0u64;
        for (x, y, pixel) in mask.enumerate_pixels() {
            if pixel.0[0] != BACKGROUND {
                m00 += 1;
                m10 += x as u64;
                m01 += y as u64;
            }
        }
        if m00 == 0 {
            return None;
        }
        Some(Centroid::new((m10 / m00) as u32, (m01 / m00) as u32))
    }

    /// The main function of the multi-blob path.
    /// Returns one centroid per external contour whose area reaches `min_area`.
    pub fn contour_centroids(mask: &Mask, min_area: f64) -> Vec<Centroid> {
        let grid = LabelGrid::label(mask);
        let external = grid.external_components(&grid.exterior_background());

        let mut centroids = Vec::new();
        for component in 0..grid.component_count {
            if !external[component] {
                continue;
            }
            let label = component as u32 + 1;
            let start = grid.first_pixels[component];
            let contour = trace_boundary(&grid, label, start);
            let moments = PolygonMoments::of(&contour);
            if moments.area() < min_area || moments.m00 == 0.0 {
                continue;
            }
            centroids.push(moments.centroid());
        }
        centroids
    }

    /// Per-pixel component labels: 0 is background, 1.. are foreground components.
    pub(super) struct LabelGrid {
        width: i64,
        height: i64,
        labels: Vec<u32>,
        component_count: usize,
        /// First pixel of each component in raster order, indexed by `label - 1`.
        first_pixels: Vec<(i64, i64)>,
        /// Pixel count of each component, indexed by `label - 1`.
        sizes: Vec<usize>,
    }

    impl LabelGrid {
        // --- a. Component Labelling ---
        fn label(mask: &Mask) -> Self {
            let width = mask.width() as i64;
            let height = mask.height() as i64;
            let mut labels = vec![0u32; (width * height) as usize];
            let mut first_pixels = Vec::new();
            let mut sizes = Vec::new();

            for y in 0..height {
                for x in 0..width {
                    let index = (y * width + x) as usize;
                    if labels[index] != 0 || mask.get_pixel(x as u32, y as u32).0[0] == BACKGROUND {
                        continue;
                    }

                    first_pixels.push((x, y));
                    let label = first_pixels.len() as u32;
                    labels[index] = label;
                    let mut queue = vec![(x, y)];
                    let mut size = 0usize;

                    while let Some((cx, cy)) = queue.pop() {
                        size += 1;
                        for (dx, dy) in NEIGHBOURS {
                            let (nx, ny) = (cx + dx, cy + dy);
                            if nx < 0 || ny < 0 || nx >= width || ny >= height {
                                continue;
                            }
                            let n_index = (ny * width + nx) as usize;
                            let foreground =
                                mask.get_pixel(nx as u32, ny as u32).0[0] != BACKGROUND;
                            if labels[n_index] == 0 && foreground {
                                labels[n_index] = label;
                                queue.push((nx, ny));
                            }
                        }
                    }
                    sizes.push(size);
                }
            }

            Self {
                width,
                height,
                component_count: first_pixels.len(),
                labels,
                first_pixels,
                sizes,
            }
        }

        fn label_at(&self, x: i64, y: i64) -> u32 {
            if x < 0 || y < 0 || x >= self.width || y >= self.height {
                return 0;
            }
            self.labels[(y * self.width + x) as usize]
        }

        // --- b. Exterior Flood ---
        /// Marks background pixels 4-connected to the frame border.
        fn exterior_background(&self) -> Vec<bool> {
            let mut exterior = vec![false; self.labels.len()];
            let mut queue = Vec::new();

            for y in 0..self.height {
                for x in 0..self.width {
                    let on_border = x == 0 || y == 0 || x == self.width - 1 || y == self.height - 1;
                    let index = (y * self.width + x) as usize;
                    if on_border && self.labels[index] == 0 {
                        exterior[index] = true;
                        queue.push((x, y));
                    }
                }
            }

            while let Some((cx, cy)) = queue.pop() {
                for (dx, dy) in [(0, 1), (0, -1), (1, 0), (-1, 0)] {
                    let (nx, ny) = (cx + dx, cy + dy);
                    if nx < 0 || ny < 0 || nx >= self.width || ny >= self.height {
                        continue;
                    }
                    let index = (ny * self.width + nx) as usize;
                    if !exterior[index] && self.labels[index] == 0 {
                        exterior[index] = true;
                        queue.push((nx, ny));
                    }
                }
            }

            exterior
        }

        /// Flags, indexed by `label - 1`, the components that touch the frame
        /// border or any exterior background pixel.
        fn external_components(&self, exterior: &[bool]) -> Vec<bool> {
            let mut external = vec![false; self.component_count];
            for y in 0..self.height {
                for x in 0..self.width {
                    let label = self.labels[(y * self.width + x) as usize];
                    if label == 0 || external[label as usize - 1] {
                        continue;
                    }
                    let on_border = x == 0 || y == 0 || x == self.width - 1 || y == self.height - 1;
                    let beside_exterior = !on_border
                        && [(0, 1), (0, -1), (1, 0), (-1, 0)]
                            .iter()
                            .any(|(dx, dy)| exterior[((y + dy) * self.width + (x + dx)) as usize]);
                    if on_border || beside_exterior {
                        external[label as usize - 1] = true;
                    }
                }
            }
            external
        }
    }

    // --- c. Boundary Tracing ---
    /// Walks the outer boundary of component `label` clockwise from `start`,
    /// which must be the component's first pixel in raster order.
    pub(super) fn trace_boundary(
        grid: &LabelGrid,
        label: u32,
        start: (i64, i64),
    ) -> Vec<(i64, i64)> {
        let step = |pixel: (i64, i64), backtrack: usize| -> Option<((i64, i64), usize)> {
            for turn in 1..=8 {
                let direction = (backtrack + turn) % 8;
                let (dx, dy) = NEIGHBOURS[direction];
                let candidate = (pixel.0 + dx, pixel.1 + dy);
                if grid.label_at(candidate.0, candidate.1) == label {
                    // The last background pixel examined becomes the new backtrack.
                    let (bx, by) = NEIGHBOURS[(backtrack + turn - 1) % 8];
                    let offset = (pixel.0 + bx - candidate.0, pixel.1 + by - candidate.1);
                    return Some((candidate, direction_of(offset)));
                }
            }
            None
        };

        let mut contour = vec![start];
        let Some((first, first_backtrack)) = step(start, WEST) else {
            return contour;
        };

        // Each boundary pixel can be entered from at most 4 sides.
        let max_steps = 4 * grid.sizes[label as usize - 1] + 4;
        let (mut current, mut backtrack) = (first, first_backtrack);
        for _ in 0..max_steps {
            let Some((next, next_backtrack)) = step(current, backtrack) else {
                break;
            };
            if current == start && next == first {
                break;
            }
            contour.push(current);
            current = next;
            backtrack = next_backtrack;
        }
        contour
    }

    fn direction_of(offset: (i64, i64)) -> usize {
        NEIGHBOURS
            .iter()
            .position(|&n| n == offset)
            .unwrap_or(WEST)
    }

    // --- d. Polygon Moments ---
    /// Spatial moments of a closed polygon, via Green's theorem.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub(super) struct PolygonMoments {
        pub m00: f64,
        pub m10: f64,
        pub m01: f64,
    }

    impl PolygonMoments {
        pub fn of(vertices: &[(i64, i64)]) -> Self {
            if vertices.len() < 3 {
                return Self {
                    m00: 0.0,
                    m10: 0.0,
                    m01: 0.0,
                };
            }

            let mut a00 = 0.0;
            let mut a10 = 0.0;
            let mut a01 = 0.0;
            let mut previous = vertices[vertices.len() - 1];
            for &vertex in vertices {
                let (xp, yp) = (previous.0 as f64, previous.1 as f64);
                let (x, y) = (vertex.0 as f64, vertex.1 as f64);
                let cross = xp * y - x * yp;
                a00 += cross;
                a10 += cross * (xp + x);
                a01 += cross * (yp + y);
                previous = vertex;
            }

            // Orientation only flips the sign of all three.
            let sign = if a00 < 0.0 { -1.0 } else { 1.0 };
            Self {
                m00: sign * a00 / 2.0,
                m10: sign * a10 / 6.0,
                m01: sign * a01 / 6.0,
            }
        }

        pub fn area(&self) -> f64 {
            self.m00.abs()
        }

        pub fn centroid(&self) -> Centroid {
            Centroid::new((self.m10 / self.m00) as u32, (self.m01 / self.m00) as u32)
        }
    }
}

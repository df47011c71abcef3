//! Burns polygons onto a grid and counts overlapping layers.

use geo::{BoundingRect, Line, MultiPolygon, Polygon};

use super::{GridSpec, Raster};

/// Cells whose centre lies inside any of `features`.
///
/// Each polygon is filled with the even-odd rule over its exterior and
/// interior rings, so holes stay empty. Overlapping polygons still give a
/// single `true`.
pub fn burn_presence(grid: &GridSpec, features: &[MultiPolygon<f64>]) -> Vec<bool> {
    let mut cells = vec![false; grid.len()];

    for polygon in features.iter().flat_map(|feature| feature.iter()) {
        fill_polygon(grid, polygon, &mut cells);
    }

    cells
}

fn fill_polygon(grid: &GridSpec, polygon: &Polygon<f64>, cells: &mut [bool]) {
    let Some(window) = polygon.bounding_rect().and_then(|rect| grid.window_for(rect)) else {
        return;
    };

    let edges: Vec<Line<f64>> = std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .flat_map(|ring| ring.lines())
        .collect();
    let mut crossings: Vec<f64> = Vec::new();

    for row in window.row..window.row + window.height {
        let (_, y) = grid.cell_center(0, row);

        crossings.clear();
        for edge in &edges {
            let (a, b) = (edge.start, edge.end);
            // Half-open in y so a vertex shared by two edges counts once.
            if (a.y <= y) != (b.y <= y) {
                crossings.push(a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y));
            }
        }
        crossings.sort_by(f64::total_cmp);

        for span in crossings.chunks_exact(2) {
            let first = first_col_from(grid, span[0]);
            let end = first_col_from(grid, span[1]);
            let offset = row * grid.width;
            for cell in &mut cells[offset + first..offset + end.max(first)] {
                *cell = true;
            }
        }
    }
}

// First column whose centre is at or east of `x`, clamped to the grid.
fn first_col_from(grid: &GridSpec, x: f64) -> usize {
    (grid.col_of(x) - 0.5).ceil().clamp(0.0, grid.width as f64) as usize
}

/// Sums 0/1 presence layers into per-cell counts.
pub struct CountAccumulator {
    grid: GridSpec,
    counts: Vec<i32>,
    layers: usize,
}

impl CountAccumulator {
    pub fn new(grid: GridSpec) -> Self {
        let counts = vec![0; grid.len()];
        CountAccumulator {
            grid,
            counts,
            layers: 0,
        }
    }

    /// Adds one layer. A layer without features leaves the counts untouched
    /// and returns `false`.
    pub fn add_layer(&mut self, features: &[MultiPolygon<f64>]) -> bool {
        if features.is_empty() {
            return false;
        }

        let presence = burn_presence(&self.grid, features);
        for (count, present) in self.counts.iter_mut().zip(presence) {
            *count += i32::from(present);
        }
        self.layers += 1;

        true
    }

    /// Number of layers added so far.
    pub fn layers(&self) -> usize {
        self.layers
    }

    pub fn into_raster(self, nodata: Option<i32>) -> Raster {
        Raster {
            grid: self.grid,
            data: self.counts,
            nodata,
        }
    }
}

// -- Tests -------------------------------------------------------------------

//! Single-band rasters on north-up grids.

pub mod burn;
pub mod geotiff;
pub mod mask;
pub mod mosaic;

use geo::Rect;

pub use burn::{burn_presence, CountAccumulator};
pub use geotiff::{read_grid, read_raster, write_raster, SampleType};
pub use mask::crop_and_mask;
pub use mosaic::mosaic;

#[derive(Debug, Clone, Copy, PartialEq)]
/// North-up affine transform. `pixel_height` is negative: rows run south.
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Coordinate system tags copied verbatim between GeoTIFFs.
pub struct CrsKeys {
    pub key_directory: Option<Vec<u16>>,
    pub double_params: Option<Vec<f64>>,
    pub ascii_params: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// A rectangular block of cells: `col..col + width`, `row..row + height`.
pub struct Window {
    pub col: usize,
    pub row: usize,
    pub width: usize,
    pub height: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridSpec {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub crs: CrsKeys,
}

impl GridSpec {
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    /// Map coordinates of the centre of a cell.
    pub fn cell_center(&self, col: usize, row: usize) -> (f64, f64) {
        let t = &self.transform;
        (
            t.origin_x + (col as f64 + 0.5) * t.pixel_width,
            t.origin_y + (row as f64 + 0.5) * t.pixel_height,
        )
    }

    /// Fractional column of map x.
    pub fn col_of(&self, x: f64) -> f64 {
        (x - self.transform.origin_x) / self.transform.pixel_width
    }

    /// Fractional row of map y.
    pub fn row_of(&self, y: f64) -> f64 {
        (y - self.transform.origin_y) / self.transform.pixel_height
    }

    /// West, south, east, north edges.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let t = &self.transform;
        let east = t.origin_x + self.width as f64 * t.pixel_width;
        let south = t.origin_y + self.height as f64 * t.pixel_height;
        (t.origin_x, south, east, t.origin_y)
    }

    /// Cells touched by `rect`, expanded outward to whole cells and clipped
    /// to the grid. `None` when they do not overlap.
    pub fn window_for(&self, rect: Rect<f64>) -> Option<Window> {
        let col_start = self.col_of(rect.min().x).floor().max(0.0);
        let col_end = self.col_of(rect.max().x).ceil().min(self.width as f64);
        let row_start = self.row_of(rect.max().y).floor().max(0.0);
        let row_end = self.row_of(rect.min().y).ceil().min(self.height as f64);

        if col_end <= col_start || row_end <= row_start {
            return None;
        }

        Some(Window {
            col: col_start as usize,
            row: row_start as usize,
            width: (col_end - col_start) as usize,
            height: (row_end - row_start) as usize,
        })
    }

    /// The grid of a window of this grid.
    pub fn subgrid(&self, window: &Window) -> GridSpec {
        let t = &self.transform;
        GridSpec {
            width: window.width,
            height: window.height,
            transform: GeoTransform {
                origin_x: t.origin_x + window.col as f64 * t.pixel_width,
                origin_y: t.origin_y + window.row as f64 * t.pixel_height,
                ..*t
            },
            crs: self.crs.clone(),
        }
    }

    /// Same dimensions and transform (within a small tolerance).
    pub fn is_aligned_with(&self, other: &GridSpec) -> bool {
        let close = |a: f64, b: f64| (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0);
        let (a, b) = (&self.transform, &other.transform);

        self.width == other.width
            && self.height == other.height
            && close(a.origin_x, b.origin_x)
            && close(a.origin_y, b.origin_y)
            && close(a.pixel_width, b.pixel_width)
            && close(a.pixel_height, b.pixel_height)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Row-major cell values on a grid.
pub struct Raster {
    pub grid: GridSpec,
    pub data: Vec<i32>,
    pub nodata: Option<i32>,
}

impl Raster {
    pub fn filled(grid: GridSpec, value: i32, nodata: Option<i32>) -> Self {
        let data = vec![value; grid.len()];
        Raster { grid, data, nodata }
    }

    pub fn get(&self, col: usize, row: usize) -> i32 {
        self.data[row * self.grid.width + col]
    }

    pub fn is_nodata(&self, value: i32) -> bool {
        self.nodata == Some(value)
    }

    /// Copy of the cells inside `window`.
    pub fn window(&self, window: &Window) -> Raster {
        let mut data = Vec::with_capacity(window.width * window.height);
        for row in window.row..window.row + window.height {
            let start = row * self.grid.width + window.col;
            data.extend_from_slice(&self.data[start..start + window.width]);
        }

        Raster {
            grid: self.grid.subgrid(window),
            data,
            nodata: self.nodata,
        }
    }
}

// -- Test support ------------------------------------------------------------


// -- Tests -------------------------------------------------------------------

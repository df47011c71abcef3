//! Merges rasters that share a cell size into one raster.

use super::{GeoTransform, GridSpec, Raster};
use crate::error::RasterError;

/// Merges `rasters` onto their union extent.
///
/// Inputs must share cell size and coordinate system. Where inputs overlap,
/// the first one with a valid (non no-data) value wins. The result carries
/// the no-data value of the first input. Cells no input covers hold that
/// value, or 0 when the first input has none.
pub fn mosaic(rasters: &[Raster]) -> Result<Raster, RasterError> {
    let first = rasters.first().ok_or(RasterError::EmptyMosaic)?;
    let reference = first.grid.transform;

    for raster in &rasters[1..] {
        let t = &raster.grid.transform;
        if !same(t.pixel_width, reference.pixel_width) || !same(t.pixel_height, reference.pixel_height) {
            return Err(RasterError::IncompatibleGrids(format!(
                "cell size {}x{} differs from {}x{}",
                t.pixel_width, t.pixel_height, reference.pixel_width, reference.pixel_height
            )));
        }
        if raster.grid.crs != first.grid.crs {
            return Err(RasterError::IncompatibleGrids(
                "coordinate systems differ".to_string(),
            ));
        }
    }

    let (mut west, mut south, mut east, mut north) = first.grid.bounds();
    for raster in &rasters[1..] {
        let (w, s, e, n) = raster.grid.bounds();
        west = west.min(w);
        south = south.min(s);
        east = east.max(e);
        north = north.max(n);
    }

    let grid = GridSpec {
        width: ((east - west) / reference.pixel_width).round() as usize,
        height: ((south - north) / reference.pixel_height).round() as usize,
        transform: GeoTransform {
            origin_x: west,
            origin_y: north,
            ..reference
        },
        crs: first.grid.crs.clone(),
    };

    let fill = first.nodata.unwrap_or(0);
    let mut merged = Raster::filled(grid, fill, first.nodata);
    let mut filled = vec![false; merged.grid.len()];

    for raster in rasters {
        let col_offset = merged.grid.col_of(raster.grid.transform.origin_x).round() as usize;
        let row_offset = merged.grid.row_of(raster.grid.transform.origin_y).round() as usize;

        for row in 0..raster.grid.height {
            for col in 0..raster.grid.width {
                let value = raster.get(col, row);
                if raster.is_nodata(value) {
                    continue;
                }

                let (c, r) = (col + col_offset, row + row_offset);
                if c >= merged.grid.width || r >= merged.grid.height {
                    continue;
                }
                let index = r * merged.grid.width + c;
                if !filled[index] {
                    merged.data[index] = value;
                    filled[index] = true;
                }
            }
        }
    }

    Ok(merged)
}

fn same(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs())
}

// -- Tests -------------------------------------------------------------------

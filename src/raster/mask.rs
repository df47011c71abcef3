//! Crops a raster to a boundary and blanks the cells outside it.

use geo::{BoundingRect, MultiPolygon};

use super::{burn_presence, Raster};
use crate::error::RasterError;

/// Crops `raster` to the cells touched by the bounding box of `boundary`,
/// then sets every cell whose centre is outside `boundary` to `nodata`.
///
/// The returned raster carries `nodata` as its no-data value and a grid
/// rewritten to the cropped extent.
pub fn crop_and_mask(
    raster: &Raster,
    boundary: &MultiPolygon<f64>,
    nodata: i32,
) -> Result<Raster, RasterError> {
    let window = boundary
        .bounding_rect()
        .and_then(|rect| raster.grid.window_for(rect))
        .ok_or(RasterError::BoundaryOutsideGrid)?;

    let mut cropped = raster.window(&window);
    let inside = burn_presence(&cropped.grid, std::slice::from_ref(boundary));

    for (value, inside) in cropped.data.iter_mut().zip(inside) {
        if !inside || raster.is_nodata(*value) {
            *value = nodata;
        }
    }
    cropped.nodata = Some(nodata);

    Ok(cropped)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use geo::{polygon, MultiPolygon};

    use super::*;
    use crate::raster::testing::unit_grid;

    #[test]
    fn should_crop_to_boundary_and_blank_outside() {
        let grid = unit_grid(0.0, 6.0, 6, 6);
        let raster = Raster::filled(grid, 1, None);
        // Staircase inside cells (1..5, 1..5).
        let boundary = MultiPolygon::new(vec![polygon![
            (x: 1.0, y: 1.0),
            (x: 5.0, y: 1.0),
            (x: 5.0, y: 1.1),
            (x: 1.1, y: 5.0),
            (x: 1.0, y: 5.0),
        ]]);

        let masked = crop_and_mask(&raster, &boundary, -1).unwrap();

        assert_eq!((masked.grid.width, masked.grid.height), (4, 4));
        assert_eq!(masked.grid.transform.origin_x, 1.0);
        assert_eq!(masked.grid.transform.origin_y, 5.0);
        assert_eq!(masked.nodata, Some(-1));
        assert_eq!(
            masked.data,
            vec![
                1, -1, -1, -1, //
                1, 1, -1, -1, //
                1, 1, 1, -1, //
                1, 1, 1, 1,
            ]
        );
    }

    #[test]
    fn should_keep_existing_nodata_as_nodata() {
        let grid = unit_grid(0.0, 2.0, 2, 2);
        let raster = Raster {
            grid,
            data: vec![-9999, 3, 3, 3],
            nodata: Some(-9999),
        };
        let boundary = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 2.0, y: 0.0),
            (x: 2.0, y: 2.0),
            (x: 0.0, y: 2.0),
        ]]);

        let masked = crop_and_mask(&raster, &boundary, -1).unwrap();

        assert_eq!(masked.data, vec![-1, 3, 3, 3]);
    }

    #[test]
    fn should_fail_when_boundary_misses_raster() {
        let raster = Raster::filled(unit_grid(0.0, 2.0, 2, 2), 0, None);
        let boundary = MultiPolygon::new(vec![polygon![
            (x: 10.0, y: 10.0),
            (x: 11.0, y: 10.0),
            (x: 11.0, y: 11.0),
        ]]);

        assert!(matches!(
            crop_and_mask(&raster, &boundary, -1),
            Err(RasterError::BoundaryOutsideGrid)
        ));
    }
}

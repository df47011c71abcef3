//! Polygon shapefiles as `geo` geometry.

use std::path::Path;

use geo::{LineString, MultiPolygon, Polygon};
use shapefile::{PolygonRing, Shape};

use crate::error::VectorError;

/// Reads the polygon features of a shapefile, one `MultiPolygon` per record.
/// Records of other shape types are skipped.
pub fn read_features(path: &Path) -> Result<Vec<MultiPolygon<f64>>, VectorError> {
    let shapes = shapefile::read_shapes(path).map_err(|source| VectorError::Shapefile {
        path: path.to_path_buf(),
        source,
    })?;

    let features = shapes
        .into_iter()
        .filter_map(|shape| match shape {
            Shape::Polygon(p) => Some(from_rings(p.rings(), |pt| (pt.x, pt.y))),
            Shape::PolygonM(p) => Some(from_rings(p.rings(), |pt| (pt.x, pt.y))),
            Shape::PolygonZ(p) => Some(from_rings(p.rings(), |pt| (pt.x, pt.y))),
            _ => None,
        })
        .filter(|feature| !feature.0.is_empty())
        .collect();

    Ok(features)
}

/// Reads every polygon of a boundary shapefile into a single `MultiPolygon`.
pub fn read_boundary(path: &Path) -> Result<MultiPolygon<f64>, VectorError> {
    let polygons: Vec<Polygon<f64>> = read_features(path)?
        .into_iter()
        .flat_map(|feature| feature.0)
        .collect();

    if polygons.is_empty() {
        return Err(VectorError::NoPolygons(path.to_path_buf()));
    }

    Ok(MultiPolygon::new(polygons))
}

// Outer rings start a polygon; inner rings are holes of the latest outer ring.
fn from_rings<P>(rings: &[PolygonRing<P>], xy: impl Fn(&P) -> (f64, f64)) -> MultiPolygon<f64> {
    let mut parts: Vec<(LineString<f64>, Vec<LineString<f64>>)> = Vec::new();

    for ring in rings {
        let line: LineString<f64> = ring.points().iter().map(&xy).collect::<Vec<_>>().into();
        match ring {
            PolygonRing::Inner(_) if !parts.is_empty() => {
                if let Some((_, holes)) = parts.last_mut() {
                    holes.push(line);
                }
            }
            _ => parts.push((line, Vec::new())),
        }
    }

    MultiPolygon::new(
        parts
            .into_iter()
            .map(|(exterior, holes)| Polygon::new(exterior, holes))
            .collect(),
    )
}

// -- Test support ------------------------------------------------------------

#[cfg(test)]
pub mod testing {
    use std::{fs, path::Path};

    use shapefile::{Point, PolygonRing, ShapeWriter};

    /// Writes axis-aligned rectangles `(x0, y0, x1, y1)` as polygon records.
    pub fn write_rectangles(path: &Path, rectangles: &[(f64, f64, f64, f64)]) {
        let polygons: Vec<shapefile::Polygon> = rectangles
            .iter()
            .map(|&(x0, y0, x1, y1)| {
                shapefile::Polygon::new(PolygonRing::Outer(vec![
                    Point::new(x0, y0),
                    Point::new(x0, y1),
                    Point::new(x1, y1),
                    Point::new(x1, y0),
                    Point::new(x0, y0),
                ]))
            })
            .collect();

        let writer = ShapeWriter::from_path(path).unwrap();
        writer.write_shapes(&polygons).unwrap();
    }

    /// Writes a polygon shapefile header with no records.
    pub fn write_empty(path: &Path) {
        let mut header = Vec::with_capacity(100);
        header.extend_from_slice(&9994i32.to_be_bytes());
        header.extend_from_slice(&[0u8; 20]);
        header.extend_from_slice(&50i32.to_be_bytes());
        header.extend_from_slice(&1000i32.to_le_bytes());
        header.extend_from_slice(&5i32.to_le_bytes());
        header.extend_from_slice(&[0u8; 64]);

        fs::write(path, header).unwrap();
    }
}

// -- Tests -------------------------------------------------------------------

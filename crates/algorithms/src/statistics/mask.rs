//! Raster masking by polygon
//!
//! Crops a raster to the window covering a polygon's bounding box and sets
//! every cell whose centre falls outside the polygon to no-data.

use geo::{BoundingRect, Geometry, Intersects, Point};
use geoagg_core::raster::Raster;
use geoagg_core::{Error, Result};

fn ensure_areal(geometry: &Geometry<f64>) -> Result<()> {
    match geometry {
        Geometry::Polygon(_)
        | Geometry::MultiPolygon(_)
        | Geometry::Rect(_)
        | Geometry::Triangle(_) => Ok(()),
        Geometry::GeometryCollection(gc) => gc.iter().try_for_each(ensure_areal),
        other => Err(Error::InvalidGeometry(format!(
            "cannot mask a raster with a {}",
            geometry_kind(other)
        ))),
    }
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        _ => "geometry",
    }
}

/// Mask `raster` to the footprint of `geometry`, cropped to its bounding window.
///
/// Cells whose centre lies outside the geometry take the raster's no-data
/// value, or `0.0` when it has none. The result keeps the raster's CRS and
/// no-data, with the transform shifted to the window origin.
///
/// # Errors
/// - [`Error::InvalidGeometry`] for empty or non-areal geometries
/// - [`Error::NoOverlap`] when the bounding box misses the raster
pub fn mask_raster(raster: &Raster<f64>, geometry: &Geometry<f64>) -> Result<Raster<f64>> {
    ensure_areal(geometry)?;

    let rect = geometry
        .bounding_rect()
        .ok_or_else(|| Error::InvalidGeometry("empty geometry".to_string()))?;
    let bounds = (rect.min().x, rect.min().y, rect.max().x, rect.max().y);

    let (rows, cols) = raster.shape();
    let window = raster
        .transform()
        .window_for_bounds(bounds, rows, cols)
        .ok_or(Error::NoOverlap)?;

    let mut masked = raster.window(&window)?;
    let fill = raster.nodata().unwrap_or(0.0);
    let transform = *masked.transform();

    for ((row, col), value) in masked.data_mut().indexed_iter_mut() {
        let (x, y) = transform.pixel_to_geo(col, row);
        if !geometry.intersects(&Point::new(x, y)) {
            *value = fill;
        }
    }

    Ok(masked)
}

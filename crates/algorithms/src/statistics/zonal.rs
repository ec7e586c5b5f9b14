//! Zonal statistics of point samples
//!
//! Averages point values over the polygons of a feature collection. A point
//! counts for a polygon when it lies strictly inside it (boundary excluded),
//! each point tested with its own longitude and latitude.

use crate::maybe_rayon::*;
use geo::{Contains, Geometry, Point};
use geoagg_core::vector::read_geojson;
use geoagg_core::{Error, FeatureCollection, Result};
use std::path::Path;
use tracing::debug;

/// A (longitude, latitude, value) sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointSample {
    pub lon: f64,
    pub lat: f64,
    pub value: f64,
}

impl PointSample {
    pub fn new(lon: f64, lat: f64, value: f64) -> Self {
        Self { lon, lat, value }
    }

    fn point(&self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

/// Aggregate of the samples falling inside one polygon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZonalResult {
    /// Position of the polygon in its collection
    pub index: usize,
    pub count: usize,
    pub sum: f64,
    /// `NaN` when no sample falls inside
    pub mean: f64,
}

/// Zip three equal-length sequences into samples.
pub fn samples_from_columns(lon: &[f64], lat: &[f64], values: &[f64]) -> Result<Vec<PointSample>> {
    for other in [lat.len(), values.len()] {
        if other != lon.len() {
            return Err(Error::LengthMismatch {
                expected: lon.len(),
                actual: other,
            });
        }
    }

    Ok(lon
        .iter()
        .zip(lat)
        .zip(values)
        .map(|((&lo, &la), &v)| PointSample::new(lo, la, v))
        .collect())
}

fn zone_of(index: usize, geometry: Option<&Geometry<f64>>, samples: &[PointSample]) -> ZonalResult {
    let (count, sum) = match geometry {
        Some(geometry) => samples
            .iter()
            .filter(|s| geometry.contains(&s.point()))
            .fold((0usize, 0.0f64), |(n, acc), s| (n + 1, acc + s.value)),
        None => (0, 0.0),
    };

    let mean = if count > 0 { sum / count as f64 } else { f64::NAN };

    ZonalResult {
        index,
        count,
        sum,
        mean,
    }
}

/// Count, sum and mean of the samples inside each polygon, in collection order.
pub fn zonal_point_statistics(
    polygons: &FeatureCollection,
    samples: &[PointSample],
) -> Vec<ZonalResult> {
    let geometries = polygons.geometries();

    let results: Vec<ZonalResult> = geometries
        .par_iter()
        .enumerate()
        .map(|(index, geometry)| zone_of(index, *geometry, samples))
        .collect();

    debug!(
        "zonal statistics: {} polygons, {} samples, {} empty zones",
        results.len(),
        samples.len(),
        results.iter().filter(|r| r.count == 0).count()
    );

    results
}

/// Mean of the values whose `(lon, lat)` falls inside each polygon.
///
/// Returns one mean per feature, in collection order. Polygons containing no
/// point, and features without geometry, yield `NaN`.
///
/// # Errors
/// [`Error::LengthMismatch`] when the three sequences differ in length.
pub fn zonal_mean(
    polygons: &FeatureCollection,
    lon: &[f64],
    lat: &[f64],
    values: &[f64],
) -> Result<Vec<f64>> {
    let samples = samples_from_columns(lon, lat, values)?;
    Ok(zonal_point_statistics(polygons, &samples)
        .into_iter()
        .map(|r| r.mean)
        .collect())
}

/// [`zonal_mean`] over the polygons of a GeoJSON file.
pub fn zonal_mean_from_file<P: AsRef<Path>>(
    path: P,
    lon: &[f64],
    lat: &[f64],
    values: &[f64],
) -> Result<Vec<f64>> {
    let polygons = read_geojson(path)?;
    zonal_mean(&polygons, lon, lat, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::polygon;
    use geoagg_core::Feature;

    fn square(x0: f64, y0: f64, size: f64) -> Feature {
        Feature::new(Geometry::Polygon(polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
        ]))
    }

    fn two_squares() -> FeatureCollection {
        let mut fc = FeatureCollection::new();
        fc.push(square(0.0, 0.0, 10.0));
        fc.push(square(20.0, 0.0, 10.0));
        fc
    }

    #[test]
    fn test_mean_per_polygon() {
        let fc = two_squares();
        let lon = [1.0, 2.0, 25.0, 50.0];
        let lat = [1.0, 8.0, 5.0, 5.0];
        let val = [2.0, 4.0, 10.0, 99.0];

        let means = zonal_mean(&fc, &lon, &lat, &val).unwrap();
        assert_eq!(means.len(), 2);
        assert_relative_eq!(means[0], 3.0);
        assert_relative_eq!(means[1], 10.0);
    }

    #[test]
    fn test_empty_polygon_is_nan() {
        let fc = two_squares();
        let means = zonal_mean(&fc, &[5.0], &[5.0], &[1.0]).unwrap();
        assert_relative_eq!(means[0], 1.0);
        assert!(means[1].is_nan());

        let none = zonal_mean(&fc, &[], &[], &[]).unwrap();
        assert!(none.iter().all(|m| m.is_nan()));
    }

    #[test]
    fn test_each_point_uses_its_own_latitude() {
        let fc = two_squares();
        // Same longitude, only the second latitude is inside the first square
        let means = zonal_mean(&fc, &[5.0, 5.0], &[-5.0, 5.0], &[100.0, 1.0]).unwrap();
        assert_relative_eq!(means[0], 1.0);
    }

    #[test]
    fn test_boundary_points_excluded() {
        let fc = two_squares();
        let stats = zonal_point_statistics(
            &fc,
            &[PointSample::new(0.0, 5.0, 7.0), PointSample::new(10.0, 10.0, 7.0)],
        );
        assert_eq!(stats[0].count, 0);
    }

    #[test]
    fn test_feature_without_geometry() {
        let mut fc = two_squares();
        fc.push(Feature::empty());
        let stats = zonal_point_statistics(&fc, &[PointSample::new(5.0, 5.0, 3.0)]);
        assert_eq!(stats.len(), 3);
        assert_eq!(stats[2].index, 2);
        assert_eq!(stats[2].count, 0);
        assert!(stats[2].mean.is_nan());
        assert_eq!(stats[0].sum, 3.0);
    }

    #[test]
    fn test_length_mismatch() {
        let fc = two_squares();
        let err = zonal_mean(&fc, &[1.0, 2.0], &[1.0], &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, Error::LengthMismatch { expected: 2, actual: 1 }));
    }
}

//! Square footprints around lon/lat points

use geo::{Geometry, LineString, Polygon};
use geoagg_core::{Feature, FeatureCollection, CRS};

/// Earth radius used for metre to degree conversion
pub const EARTH_RADIUS_M: f64 = 6_378_000.0;

/// Square of side `d` metres centred on (`lon`, `lat`), in degrees.
///
/// The latitude half-side is `(d / 2) / R` converted to degrees, the
/// longitude half-side is that divided by `cos(lat)`. The ring is closed and
/// runs (min, min), (max, min), (max, max), (min, max). Near the poles the
/// longitude extent grows without bound.
pub fn square_around_point(lon: f64, lat: f64, d: f64) -> Polygon<f64> {
    let half_lat = (d / 2.0) / EARTH_RADIUS_M * (180.0 / std::f64::consts::PI);
    let half_lon = half_lat / lat.to_radians().cos();

    let (min_x, max_x) = (lon - half_lon, lon + half_lon);
    let (min_y, max_y) = (lat - half_lat, lat + half_lat);

    Polygon::new(
        LineString::from(vec![
            (min_x, min_y),
            (max_x, min_y),
            (max_x, max_y),
            (min_x, max_y),
            (min_x, min_y),
        ]),
        vec![],
    )
}

/// [`square_around_point`] wrapped as a single-feature WGS84 collection,
/// ready for GeoJSON output.
pub fn square_feature_collection(lon: f64, lat: f64, d: f64) -> FeatureCollection {
    let mut fc = FeatureCollection::with_crs(CRS::wgs84());
    fc.push(Feature::new(Geometry::Polygon(square_around_point(lon, lat, d))));
    fc
}

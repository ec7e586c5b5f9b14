//! Point reprojection between coordinate reference systems.
//!
//! WGS84, UTM and Web Mercator are handled inline; UTM formulas follow
//! Snyder 1987 (USGS Prof. Paper 1395, pp. 61-64) and every built-in pair is
//! composed through WGS84 geographic coordinates. Any other EPSG code or
//! PROJ string goes through `proj4rs`.

use super::CRS;
use crate::error::{Error, Result};
use geo::{Coord, Geometry, MapCoords};
use proj4rs::proj::Proj;
use std::fmt;

// ── WGS84 ellipsoid constants ────────────────────────────────────────────

const A: f64 = 6_378_137.0; // semi-major axis (m)
const F: f64 = 1.0 / 298.257_223_563; // flattening
const E2: f64 = 2.0 * F - F * F; // eccentricity squared
const E_PRIME2: f64 = E2 / (1.0 - E2); // second eccentricity squared
const K0: f64 = 0.9996; // UTM scale factor
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// A projection this module can convert to and from WGS84.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Projection {
    Geographic,
    Utm { zone: u32, north: bool },
    WebMercator,
}

impl Projection {
    fn from_crs(crs: &CRS) -> Option<Self> {
        match crs.epsg()? {
            4326 => Some(Projection::Geographic),
            3857 | 900913 => Some(Projection::WebMercator),
            code => parse_utm_epsg(code).map(|(zone, north)| Projection::Utm { zone, north }),
        }
    }

    fn to_wgs84(self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Projection::Geographic => (x, y),
            Projection::Utm { zone, north } => utm_to_wgs84(x, y, zone, north),
            Projection::WebMercator => web_mercator_to_wgs84(x, y),
        }
    }

    fn from_wgs84(self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            Projection::Geographic => (lon, lat),
            Projection::Utm { zone, north } => wgs84_to_utm(lon, lat, zone, north),
            Projection::WebMercator => wgs84_to_web_mercator(lon, lat),
        }
    }
}

/// A CRS resolved through `proj4rs`.
struct ProjDef {
    proj: Proj,
    /// Angular coordinates: degrees outside, radians inside proj4rs
    latlong: bool,
    label: String,
}

impl ProjDef {
    fn from_crs(crs: &CRS) -> Option<Self> {
        let (proj, latlong) = match (crs.epsg(), crs.proj()) {
            (Some(code), _) => {
                let proj = Proj::from_epsg_code(u16::try_from(code).ok()?).ok()?;
                (proj, crs.is_geographic())
            }
            (None, Some(text)) => {
                let proj = Proj::from_proj_string(text).ok()?;
                let latlong = text.contains("+proj=longlat") || text.contains("+proj=latlong");
                (proj, latlong)
            }
            (None, None) => return None,
        };
        Some(Self {
            proj,
            latlong,
            label: crs.identifier(),
        })
    }
}

impl fmt::Debug for ProjDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjDef")
            .field("crs", &self.label)
            .field("latlong", &self.latlong)
            .finish_non_exhaustive()
    }
}

/// Source and target definitions of a `proj4rs` transformation.
#[derive(Debug)]
pub struct ProjPair {
    from: ProjDef,
    to: ProjDef,
}

impl ProjPair {
    fn apply(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let mut point = if self.from.latlong {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };

        proj4rs::transform::transform(&self.from.proj, &self.to.proj, &mut point).map_err(|e| {
            Error::Other(format!(
                "cannot reproject ({}, {}) from {} to {}: {:?}",
                x, y, self.from.label, self.to.label, e
            ))
        })?;

        Ok(if self.to.latlong {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        })
    }
}

/// A resolved transformation between two CRSs.
#[derive(Debug)]
pub enum CoordTransform {
    /// Source and target are the same CRS
    Identity,
    /// Convert through WGS84 geographic coordinates
    Via { from: ProjectionHandle, to: ProjectionHandle },
    /// General transformation through `proj4rs`
    Proj(Box<ProjPair>),
}

/// Opaque projection handle, only built by [`CoordTransform::new`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionHandle(Projection);

impl CoordTransform {
    /// Resolve the transformation from `from` to `to`.
    ///
    /// WGS84, Web Mercator and UTM pairs use the built-in formulas; other
    /// EPSG codes and PROJ strings are resolved through `proj4rs`.
    ///
    /// Fails with [`Error::UnsupportedCrs`] when a side is known only by
    /// WKT, or its EPSG code has no PROJ definition.
    pub fn new(from: &CRS, to: &CRS) -> Result<Self> {
        if from.is_equivalent(to) {
            return Ok(CoordTransform::Identity);
        }

        if let (Some(src), Some(dst)) = (Projection::from_crs(from), Projection::from_crs(to)) {
            if src == dst {
                return Ok(CoordTransform::Identity);
            }
            return Ok(CoordTransform::Via {
                from: ProjectionHandle(src),
                to: ProjectionHandle(dst),
            });
        }

        let unsupported = || Error::UnsupportedCrs {
            from: from.identifier(),
            to: to.identifier(),
        };
        let src = ProjDef::from_crs(from).ok_or_else(unsupported)?;
        let dst = ProjDef::from_crs(to).ok_or_else(unsupported)?;

        Ok(CoordTransform::Proj(Box::new(ProjPair { from: src, to: dst })))
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, CoordTransform::Identity)
    }

    /// Transform a single `(x, y)` pair
    pub fn apply(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        match self {
            CoordTransform::Identity => Ok((x, y)),
            CoordTransform::Via { from, to } => {
                let (lon, lat) = from.0.to_wgs84(x, y);
                Ok(to.0.from_wgs84(lon, lat))
            }
            CoordTransform::Proj(pair) => pair.apply(x, y),
        }
    }
}

/// Reproject every coordinate of a geometry.
pub fn reproject_geometry(geometry: &Geometry<f64>, transform: &CoordTransform) -> Result<Geometry<f64>> {
    if transform.is_identity() {
        return Ok(geometry.clone());
    }
    geometry.try_map_coords(|c: Coord<f64>| -> Result<Coord<f64>> {
        let (x, y) = transform.apply(c.x, c.y)?;
        Ok(Coord { x, y })
    })
}

/// Parse an EPSG code into UTM zone info: `Some((zone, is_north))`.
///
/// - EPSG 326xx → zone xx, North hemisphere
/// - EPSG 327xx → zone xx, South hemisphere
pub fn parse_utm_epsg(epsg: u32) -> Option<(u32, bool)> {
    if (32601..=32660).contains(&epsg) {
        Some((epsg - 32600, true))
    } else if (32701..=32760).contains(&epsg) {
        Some((epsg - 32700, false))
    } else {
        None
    }
}

fn central_meridian(zone: u32) -> f64 {
    ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians()
}

// ── Forward UTM (Snyder eq. 8-9, 8-10) ──────────────────────────────────

fn wgs84_to_utm(lon_deg: f64, lat_deg: f64, zone: u32, north: bool) -> (f64, f64) {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    let lon0 = central_meridian(zone);

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let tan_lat = lat.tan();

    let n = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = E_PRIME2 * cos_lat * cos_lat;
    let a_coeff = cos_lat * (lon - lon0);
    let m = meridional_arc(lat);

    let a2 = a_coeff * a_coeff;
    let a4 = a2 * a2;
    let a6 = a4 * a2;

    let easting = K0 * n
        * (a_coeff
            + (1.0 - t + c) * a2 * a_coeff / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * E_PRIME2) * a4 * a_coeff / 120.0)
        + FALSE_EASTING;

    let northing = K0
        * (m + n
            * tan_lat
            * (a2 / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * E_PRIME2) * a6 / 720.0));

    let northing = if north {
        northing
    } else {
        northing + FALSE_NORTHING_SOUTH
    };

    (easting, northing)
}

// ── Inverse UTM (Snyder eq. 8-12 to 8-25) ───────────────────────────────

fn utm_to_wgs84(easting: f64, northing: f64, zone: u32, north: bool) -> (f64, f64) {
    let x = easting - FALSE_EASTING;
    let y = if north {
        northing
    } else {
        northing - FALSE_NORTHING_SOUTH
    };

    let e4 = E2 * E2;
    let e6 = e4 * E2;
    let m = y / K0;
    let mu = m / (A * (1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));

    let sqrt_1me2 = (1.0 - E2).sqrt();
    let e1 = (1.0 - sqrt_1me2) / (1.0 + sqrt_1me2);
    let e1_2 = e1 * e1;
    let e1_3 = e1_2 * e1;
    let e1_4 = e1_3 * e1;

    // Footpoint latitude
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1_3 / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1_2 / 16.0 - 55.0 * e1_4 / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1_3 / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1_4 / 512.0) * (8.0 * mu).sin();

    let sin_phi1 = phi1.sin();
    let cos_phi1 = phi1.cos();
    let tan_phi1 = phi1.tan();

    let c1 = E_PRIME2 * cos_phi1 * cos_phi1;
    let t1 = tan_phi1 * tan_phi1;
    let denom = 1.0 - E2 * sin_phi1 * sin_phi1;
    let n1 = A / denom.sqrt();
    let r1 = A * (1.0 - E2) / denom.powf(1.5);
    let d = x / (n1 * K0);

    let d2 = d * d;
    let d3 = d2 * d;
    let d4 = d3 * d;
    let d5 = d4 * d;
    let d6 = d5 * d;

    let lat = phi1
        - (n1 * tan_phi1 / r1)
            * (d2 / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * E_PRIME2) * d4 / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * E_PRIME2
                    - 3.0 * c1 * c1)
                    * d6
                    / 720.0);

    let lon = central_meridian(zone)
        + (d - (1.0 + 2.0 * t1 + c1) * d3 / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * E_PRIME2 + 24.0 * t1 * t1)
                * d5
                / 120.0)
            / cos_phi1;

    (lon.to_degrees(), lat.to_degrees())
}

/// Meridional arc from equator to latitude `lat` (radians).
/// Snyder eq. 3-21.
fn meridional_arc(lat: f64) -> f64 {
    let e2 = E2;
    let e4 = e2 * e2;
    let e6 = e4 * e2;

    A * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

// ── Spherical Web Mercator ──────────────────────────────────────────────

fn wgs84_to_web_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let x = A * lon.to_radians();
    let y = A * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    (x, y)
}

fn web_mercator_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / A).to_degrees();
    let lat = (2.0 * (y / A).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    (lon, lat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Polygon};

    fn assert_close(a: f64, b: f64, tol: f64, msg: &str) {
        let diff = (a - b).abs();
        assert!(
            diff < tol,
            "{msg}: expected {b}, got {a}, diff {diff} exceeds tolerance {tol}"
        );
    }

    #[test]
    fn parse_utm_codes() {
        assert_eq!(parse_utm_epsg(32630), Some((30, true)));
        assert_eq!(parse_utm_epsg(32721), Some((21, false)));
        assert_eq!(parse_utm_epsg(32600), None);
        assert_eq!(parse_utm_epsg(32661), None);
        assert_eq!(parse_utm_epsg(4326), None);
    }

    // Reference values from pyproj:
    //   Transformer.from_crs(4326, 32630, always_xy=True).transform(-3.7037, 40.4168)
    //   → (440298.94, 4474257.31)
    #[test]
    fn madrid_to_utm30n() {
        let t = CoordTransform::new(&CRS::wgs84(), &CRS::from_epsg(32630)).unwrap();
        let (e, n) = t.apply(-3.7037, 40.4168).unwrap();
        assert_close(e, 440_298.94, 1.0, "easting");
        assert_close(n, 4_474_257.31, 1.0, "northing");
    }

    #[test]
    fn utm_inverse_roundtrip() {
        for &(lon, lat, epsg) in &[
            (-3.7037, 40.4168, 32630),
            (-58.3816, -34.6037, 32721),
            (36.8219, -1.2921, 32737),
            (-3.0, 0.0, 32630),
        ] {
            let fwd = CoordTransform::new(&CRS::wgs84(), &CRS::from_epsg(epsg)).unwrap();
            let inv = CoordTransform::new(&CRS::from_epsg(epsg), &CRS::wgs84()).unwrap();
            let (e, n) = fwd.apply(lon, lat).unwrap();
            let (lon2, lat2) = inv.apply(e, n).unwrap();
            assert_close(lon2, lon, 1e-7, "lon");
            assert_close(lat2, lat, 1e-7, "lat");
        }
    }

    #[test]
    fn web_mercator_roundtrip() {
        let fwd = CoordTransform::new(&CRS::wgs84(), &CRS::web_mercator()).unwrap();
        let (x, y) = fwd.apply(180.0, 0.0).unwrap();
        assert_close(x, 20_037_508.34, 0.01, "x at antimeridian");
        assert_close(y, 0.0, 1e-6, "y at equator");

        let inv = CoordTransform::new(&CRS::web_mercator(), &CRS::wgs84()).unwrap();
        let (x, y) = fwd.apply(12.5, 41.9).unwrap();
        let (lon, lat) = inv.apply(x, y).unwrap();
        assert_close(lon, 12.5, 1e-9, "lon");
        assert_close(lat, 41.9, 1e-9, "lat");
    }

    #[test]
    fn identity_and_unsupported() {
        let t = CoordTransform::new(&CRS::from_epsg(32630), &CRS::from_epsg(32630)).unwrap();
        assert!(t.is_identity());

        let wkt_only = CRS::from_wkt("PROJCS[\"custom\"]");
        let err = CoordTransform::new(&wkt_only, &CRS::wgs84()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedCrs { .. }));

        let err = CoordTransform::new(&CRS::wgs84(), &CRS::from_epsg(99_999)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedCrs { .. }));
    }

    // Projection origins map to the false easting / northing exactly
    #[test]
    fn laea_europe_through_proj4rs() {
        let fwd = CoordTransform::new(&CRS::wgs84(), &CRS::from_epsg(3035)).unwrap();
        assert!(matches!(fwd, CoordTransform::Proj(_)));
        let (x, y) = fwd.apply(10.0, 52.0).unwrap();
        assert_close(x, 4_321_000.0, 0.01, "easting");
        assert_close(y, 3_210_000.0, 0.01, "northing");

        let inv = CoordTransform::new(&CRS::from_epsg(3035), &CRS::wgs84()).unwrap();
        let (lon, lat) = inv.apply(4_400_000.0, 3_100_000.0).unwrap();
        let (x, y) = fwd.apply(lon, lat).unwrap();
        assert_close(x, 4_400_000.0, 1e-3, "x roundtrip");
        assert_close(y, 3_100_000.0, 1e-3, "y roundtrip");
    }

    #[test]
    fn lambert93_and_proj_strings() {
        let t = CoordTransform::new(&CRS::wgs84(), &CRS::from_epsg(2154)).unwrap();
        let (x, y) = t.apply(3.0, 46.5).unwrap();
        assert_close(x, 700_000.0, 0.01, "easting");
        assert_close(y, 6_600_000.0, 0.01, "northing");

        let from = CRS::from_proj("+proj=longlat +datum=WGS84 +no_defs");
        let to = CRS::from_proj("+proj=utm +zone=30 +datum=WGS84 +units=m +no_defs");
        let t = CoordTransform::new(&from, &to).unwrap();
        let (e, n) = t.apply(-3.7037, 40.4168).unwrap();
        assert_close(e, 440_298.94, 1.0, "easting");
        assert_close(n, 4_474_257.31, 1.0, "northing");
    }

    #[test]
    fn reproject_polygon_keeps_ring_shape() {
        let poly: Polygon<f64> = polygon![
            (x: -3.75, y: 40.40),
            (x: -3.70, y: 40.40),
            (x: -3.70, y: 40.45),
            (x: -3.75, y: 40.45),
        ];
        let t = CoordTransform::new(&CRS::wgs84(), &CRS::from_epsg(32630)).unwrap();
        let projected = reproject_geometry(&Geometry::Polygon(poly.clone()), &t).unwrap();

        let Geometry::Polygon(out) = projected else {
            panic!("geometry type changed");
        };
        assert_eq!(out.exterior().0.len(), poly.exterior().0.len());
        assert!(out.exterior().0.iter().all(|c| c.x > 100_000.0 && c.y > 4_000_000.0));
    }
}

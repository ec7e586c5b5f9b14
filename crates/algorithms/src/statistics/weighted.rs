//! Weighted sum of an indicator raster by polygon
//!
//! For each polygon the indicator × weight raster and the weight raster are
//! masked to the polygon and summed. The ratio of the two sums is the
//! weight-averaged indicator (e.g. a population-weighted poverty rate).
//!
//! A polygon that cannot be masked (outside both rasters, missing or
//! non-areal geometry) records `(0.0, 0)` and the remaining polygons are
//! still processed.

use crate::imagery::multiply;
use crate::statistics::mask::mask_raster;
use geo::Geometry;
use geoagg_core::io::{read_geotiff, write_geotiff};
use geoagg_core::raster::Raster;
use geoagg_core::vector::{read_geojson, write_geojson};
use geoagg_core::{Algorithm, AttributeValue, Error, FeatureCollection, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Parameters for the weighted sum by polygon
#[derive(Debug, Clone)]
pub struct WeightedSumParams {
    /// Attribute receiving the weighted average
    pub value_field: String,
    /// Attribute receiving the (truncated) sum of weights
    pub weight_field: String,
    /// Write the indicator × weight raster next to the indicator
    pub keep_intermediate: bool,
}

impl Default for WeightedSumParams {
    fn default() -> Self {
        Self {
            value_field: "indicator".to_string(),
            weight_field: "population".to_string(),
            keep_intermediate: true,
        }
    }
}

/// Outcome for one polygon
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedSumRecord {
    /// Position of the polygon in its collection
    pub index: usize,
    /// Weighted sum divided by the weight sum, `0.0` when the latter is zero
    pub indicator: f64,
    /// Sum of weights inside the polygon, truncated
    pub population: i64,
}

impl WeightedSumRecord {
    fn empty(index: usize) -> Self {
        Self {
            index,
            indicator: 0.0,
            population: 0,
        }
    }
}

/// Weighted sum algorithm
#[derive(Debug, Clone, Default)]
pub struct WeightedSum;

impl Algorithm for WeightedSum {
    /// (polygons, indicator raster, weight raster)
    type Input = (FeatureCollection, Raster<f64>, Raster<f64>);
    type Output = (FeatureCollection, Vec<WeightedSumRecord>);
    type Params = WeightedSumParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "WeightedSum"
    }

    fn description(&self) -> &'static str {
        "Weight-averaged raster indicator per polygon, stored as polygon attributes"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (polygons, indicator, weights) = input;
        let weighted = multiply(&indicator, &weights)?;
        let (mut projected, records) = weighted_sums(&polygons, &weighted, &weights)?;
        apply_records(&mut projected, &records, &params);
        Ok((projected, records))
    }
}

/// Numerator and denominator for one geometry
fn polygon_sums(
    weighted: &Raster<f64>,
    weights: &Raster<f64>,
    geometry: Option<&Geometry<f64>>,
) -> Result<(f64, f64)> {
    let geometry =
        geometry.ok_or_else(|| Error::InvalidGeometry("feature has no geometry".to_string()))?;

    let numerator = mask_raster(weighted, geometry)?.sum_valid();
    let denominator = mask_raster(weights, geometry)?.sum_valid();
    Ok((numerator, denominator))
}

fn polygon_record(
    index: usize,
    weighted: &Raster<f64>,
    weights: &Raster<f64>,
    geometry: Option<&Geometry<f64>>,
) -> WeightedSumRecord {
    match polygon_sums(weighted, weights, geometry) {
        Ok((numerator, denominator)) => {
            let indicator = if denominator == 0.0 {
                0.0
            } else {
                numerator / denominator
            };
            debug!("polygon {}: indicator {}, weight {}", index, indicator, denominator);
            WeightedSumRecord {
                index,
                indicator,
                population: denominator.trunc() as i64,
            }
        }
        Err(e) => {
            warn!("polygon {} skipped: {}", index, e);
            WeightedSumRecord::empty(index)
        }
    }
}

/// Compute one record per polygon.
///
/// `weighted` is the indicator × weight raster. The polygons are first
/// reprojected into its CRS; the returned collection is the reprojected one.
/// Any EPSG code with a PROJ definition, or a PROJ string, can be the
/// raster CRS.
///
/// # Errors
/// Shape mismatch between the rasters, or a CRS known only by WKT
/// ([`Error::UnsupportedCrs`]). Per-polygon failures are not errors.
pub fn weighted_sums(
    polygons: &FeatureCollection,
    weighted: &Raster<f64>,
    weights: &Raster<f64>,
) -> Result<(FeatureCollection, Vec<WeightedSumRecord>)> {
    weighted.ensure_same_shape(weights)?;

    let projected = match weighted.crs() {
        Some(target) => polygons.to_crs(target)?,
        None => {
            warn!("raster has no CRS; polygons are used as-is");
            polygons.clone()
        }
    };

    if let (Some(a), Some(b)) = (weighted.crs(), weights.crs()) {
        if !a.is_equivalent(b) {
            warn!("weight raster CRS {} differs from indicator CRS {}", b, a);
        }
    }

    let records: Vec<WeightedSumRecord> = projected
        .iter()
        .enumerate()
        .map(|(index, feature)| polygon_record(index, weighted, weights, feature.geometry.as_ref()))
        .collect();

    let total: i64 = records.iter().map(|r| r.population).sum();
    info!("Total weights: {}", total);

    Ok((projected, records))
}

/// Store each record's values as attributes of its polygon
pub fn apply_records(
    polygons: &mut FeatureCollection,
    records: &[WeightedSumRecord],
    params: &WeightedSumParams,
) {
    for record in records {
        if let Some(feature) = polygons.features.get_mut(record.index) {
            feature.set_property(params.value_field.clone(), AttributeValue::Float(record.indicator));
            feature.set_property(params.weight_field.clone(), AttributeValue::Int(record.population));
        }
    }
}

/// Path of the indicator × weight raster: `<stem>_multiplied.tif` beside the indicator
pub fn intermediate_path(indicator: &Path) -> PathBuf {
    let stem = indicator
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "raster".to_string());
    indicator.with_file_name(format!("{}_multiplied.tif", stem))
}

/// Weighted sum of an indicator raster by the polygons of a GeoJSON file.
///
/// Writes the polygons, reprojected to the raster CRS and carrying the two
/// new attributes, to `output_polygons`.
///
/// # Arguments
/// * `input_polygons` - GeoJSON polygon collection
/// * `indicator_path` - raster with the value to aggregate
/// * `weight_path` - raster with the weights (e.g. population), same grid
/// * `output_polygons` - GeoJSON output path
pub fn weighted_sum_by_polygon(
    input_polygons: impl AsRef<Path>,
    indicator_path: impl AsRef<Path>,
    weight_path: impl AsRef<Path>,
    output_polygons: impl AsRef<Path>,
    params: &WeightedSumParams,
) -> Result<Vec<WeightedSumRecord>> {
    let indicator: Raster<f64> = read_geotiff(indicator_path.as_ref(), None)?;
    let weights: Raster<f64> = read_geotiff(weight_path.as_ref(), None)?;
    let weighted = multiply(&indicator, &weights)?;

    if params.keep_intermediate {
        let path = intermediate_path(indicator_path.as_ref());
        write_geotiff(&weighted, &path, None)?;
        debug!("intermediate raster written to {}", path.display());
    }

    let polygons = read_geojson(input_polygons)?;
    let (mut projected, records) = weighted_sums(&polygons, &weighted, &weights)?;
    apply_records(&mut projected, &records, params);

    write_geojson(&projected, output_polygons.as_ref())?;
    info!(
        "{} polygons written to {}",
        projected.len(),
        output_polygons.as_ref().display()
    );

    Ok(records)
}

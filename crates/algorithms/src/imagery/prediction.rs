//! Rasters from tabular predictions
//!
//! Model predictions made per grid cell come back as `(i, j, yhat)` rows,
//! `i` being the column and `j` the row of the reference raster. They are
//! written onto a copy of the reference grid filled with [`PREDICTION_NODATA`].

use geoagg_core::io::{read_geotiff, write_geotiff};
use geoagg_core::raster::Raster;
use geoagg_core::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Fill value and declared no-data of generated rasters
pub const PREDICTION_NODATA: f64 = -99.0;

/// One predicted cell
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PredictionRow {
    /// Column index
    pub i: usize,
    /// Row index
    pub j: usize,
    /// Predicted value
    pub yhat: f64,
}

impl PredictionRow {
    pub fn new(i: usize, j: usize, yhat: f64) -> Self {
        Self { i, j, yhat }
    }
}

/// Read prediction rows from a CSV file with an `i,j,yhat` header.
///
/// Other columns are ignored.
pub fn read_predictions_csv(path: impl AsRef<Path>) -> Result<Vec<PredictionRow>> {
    let mut reader = csv::Reader::from_path(path.as_ref()).map_err(csv_error)?;
    reader
        .deserialize()
        .map(|row| row.map_err(csv_error))
        .collect()
}

fn csv_error(e: csv::Error) -> Error {
    match e.into_kind() {
        csv::ErrorKind::Io(io) => Error::Io(io),
        other => Error::Other(format!("prediction table: {:?}", other)),
    }
}

/// Place predictions on a grid shaped like `reference`.
///
/// Every row is bounds-checked before anything is written. The result
/// copies the reference transform and CRS, is filled with
/// [`PREDICTION_NODATA`] elsewhere and declares it as no-data.
///
/// # Errors
/// [`Error::IndexOutOfBounds`] for the first row outside the reference grid.
pub fn predictions_to_raster<T>(reference: &Raster<T>, rows: &[PredictionRow]) -> Result<Raster<f64>>
where
    T: geoagg_core::RasterElement,
{
    let (n_rows, n_cols) = reference.shape();

    if let Some(bad) = rows.iter().find(|r| r.j >= n_rows || r.i >= n_cols) {
        return Err(Error::IndexOutOfBounds {
            row: bad.j,
            col: bad.i,
            rows: n_rows,
            cols: n_cols,
        });
    }

    let mut output = reference.with_same_meta::<f64>(n_rows, n_cols);
    output.data_mut().fill(PREDICTION_NODATA);
    output.set_nodata(Some(PREDICTION_NODATA));

    for row in rows {
        output.set(row.j, row.i, row.yhat)?;
    }

    Ok(output)
}

/// Write a prediction raster to `outfile`, georeferenced like the raster at
/// `reference_path`.
pub fn generate_raster(
    outfile: impl AsRef<Path>,
    reference_path: impl AsRef<Path>,
    rows: &[PredictionRow],
) -> Result<()> {
    info!("writing {}", outfile.as_ref().display());
    let reference: Raster<f64> = read_geotiff(reference_path.as_ref(), None)?;
    let raster = predictions_to_raster(&reference, rows)?;
    write_geotiff(&raster, outfile.as_ref(), None)
}

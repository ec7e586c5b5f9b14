//! Block aggregation (downsampling by summation)
//!
//! Each `scale × scale` block of input cells becomes one output cell holding
//! their sum. No-data counts as zero so blocks sum only valid cells.

use crate::maybe_rayon::*;
use geoagg_core::io::{read_geotiff, write_geotiff};
use geoagg_core::raster::Raster;
use geoagg_core::{Algorithm, Error, Result};
use ndarray::Array2;
use std::path::Path;
use tracing::info;

/// Parameters for block aggregation
#[derive(Debug, Clone)]
pub struct AggregateParams {
    /// Block edge length in cells
    pub scale: usize,
}

impl Default for AggregateParams {
    fn default() -> Self {
        Self { scale: 2 }
    }
}

/// Aggregate algorithm
#[derive(Debug, Clone, Default)]
pub struct Aggregate;

impl Algorithm for Aggregate {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = AggregateParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Aggregate"
    }

    fn description(&self) -> &'static str {
        "Downsample a raster by summing square blocks, no-data counted as zero"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        aggregate(&input, params.scale)
    }
}

/// Sum `scale × scale` blocks of `raster`.
///
/// Edge blocks that are cut short by the raster border are summed over the
/// cells they have, so the output is `ceil(rows / scale) × ceil(cols / scale)`.
/// The output keeps origin and CRS, its cells are `scale` times larger and
/// its no-data is `0`.
pub fn aggregate(raster: &Raster<f64>, scale: usize) -> Result<Raster<f64>> {
    if scale == 0 {
        return Err(Error::InvalidParameter {
            name: "scale",
            value: scale.to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    let zeroed = raster.zero_filled_f64();
    let (rows, cols) = zeroed.shape();
    let out_rows = rows.div_ceil(scale);
    let out_cols = cols.div_ceil(scale);

    let data: Vec<f64> = (0..out_rows)
        .into_par_iter()
        .flat_map(|out_row| {
            let row_start = out_row * scale;
            let row_end = (row_start + scale).min(rows);
            (0..out_cols)
                .map(|out_col| {
                    let col_start = out_col * scale;
                    let col_end = (col_start + scale).min(cols);
                    let mut sum = 0.0;
                    for row in row_start..row_end {
                        for col in col_start..col_end {
                            // SAFETY: row < rows, col < cols
                            sum += unsafe { zeroed.get_unchecked(row, col) };
                        }
                    }
                    sum
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let mut output = zeroed.with_same_meta::<f64>(out_rows, out_cols);
    output.set_transform(zeroed.transform().scaled(scale as f64));
    output.set_nodata(Some(0.0));
    *output.data_mut() = Array2::from_shape_vec((out_rows, out_cols), data)
        .map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}

/// Aggregate a GeoTIFF file by `scale` and write the result.
pub fn aggregate_files(input: impl AsRef<Path>, output: impl AsRef<Path>, scale: usize) -> Result<()> {
    let raster: Raster<f64> = read_geotiff(input.as_ref(), None)?;
    let aggregated = aggregate(&raster, scale)?;
    write_geotiff(&aggregated, output.as_ref(), None)?;
    info!(
        "aggregated {} x {} -> {} x {} into {}",
        raster.cols(),
        raster.rows(),
        aggregated.cols(),
        aggregated.rows(),
        output.as_ref().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoagg_core::GeoTransform;

    #[test]
    fn test_aggregate_even_blocks() {
        let mut r = Raster::from_vec((1..=16).map(|v| v as f64).collect(), 4, 4).unwrap();
        r.set_transform(GeoTransform::new(0.0, 4.0, 1.0, -1.0));

        let out = aggregate(&r, 2).unwrap();
        assert_eq!(out.shape(), (2, 2));
        // [1 2; 5 6] = 14, [3 4; 7 8] = 22, [9 10; 13 14] = 46, [11 12; 15 16] = 54
        assert_eq!(out.data().iter().copied().collect::<Vec<_>>(), vec![14.0, 22.0, 46.0, 54.0]);
        assert_eq!(out.transform().pixel_width, 2.0);
        assert_eq!(out.transform().pixel_height, -2.0);
        assert_eq!(out.transform().origin_y, 4.0);
        assert_eq!(out.nodata(), Some(0.0));
    }

    #[test]
    fn test_aggregate_nodata_and_partial_blocks() {
        let mut r = Raster::from_vec(vec![1.0, -5.0, 2.0, 3.0, 4.0, f64::NAN], 2, 3).unwrap();
        r.set_nodata(Some(-5.0));

        let out = aggregate(&r, 2).unwrap();
        assert_eq!(out.shape(), (1, 2));
        assert_eq!(out.get(0, 0).unwrap(), 8.0); // 1 + 0 + 3 + 4
        assert_eq!(out.get(0, 1).unwrap(), 2.0); // 2 + 0
    }

    #[test]
    fn test_aggregate_scale_one_is_zero_fill() {
        let mut r = Raster::from_vec(vec![1.0, -1.0], 1, 2).unwrap();
        r.set_nodata(Some(-1.0));
        let out = aggregate(&r, 1).unwrap();
        assert_eq!(out.get(0, 1).unwrap(), 0.0);
        assert_eq!(out.shape(), (1, 2));
    }

    #[test]
    fn test_aggregate_rejects_zero_scale() {
        let r: Raster<f64> = Raster::new(2, 2);
        assert!(matches!(
            Aggregate.execute(r, AggregateParams { scale: 0 }),
            Err(Error::InvalidParameter { name: "scale", .. })
        ));
    }
}

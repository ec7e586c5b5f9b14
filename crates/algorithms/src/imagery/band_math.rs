//! Raster multiplication
//!
//! Cell-by-cell product of two aligned rasters where each raster's own
//! no-data cells count as zero.

use crate::maybe_rayon::*;
use geoagg_core::io::{read_geotiff, write_geotiff, GeoTiffOptions};
use geoagg_core::raster::Raster;
use geoagg_core::{Algorithm, Error, RasterElement, Result};
use ndarray::Array2;
use std::path::Path;
use tracing::{info, warn};

/// Multiply algorithm
#[derive(Debug, Clone, Default)]
pub struct Multiply;

impl Algorithm for Multiply {
    type Input = (Raster<f64>, Raster<f64>);
    type Output = Raster<f64>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Multiply"
    }

    fn description(&self) -> &'static str {
        "Multiply two rasters cell by cell, treating no-data as zero"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        multiply(&input.0, &input.1)
    }
}

/// Multiply two rasters cell by cell.
///
/// No-data cells of `a` (per `a`'s no-data value) and of `b` (per `b`'s) are
/// replaced by zero before multiplying, as are NaN cells. The output takes
/// the transform and CRS of `a` and has no-data `0`.
///
/// # Errors
/// [`Error::SizeMismatch`] when the shapes differ.
pub fn multiply(a: &Raster<f64>, b: &Raster<f64>) -> Result<Raster<f64>> {
    a.ensure_same_shape(b)?;

    if !a.transform().approx_eq(b.transform(), 1e-9) {
        warn!(
            "multiplying rasters with different geotransforms: {:?} vs {:?}",
            a.transform(),
            b.transform()
        );
    }

    let (rows, cols) = a.shape();
    let nodata_a = a.nodata();
    let nodata_b = b.nodata();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    // SAFETY: row < rows and col < cols, shapes checked above
                    let va = unsafe { a.get_unchecked(row, col) };
                    let vb = unsafe { b.get_unchecked(row, col) };
                    va.zero_if_nodata(nodata_a) * vb.zero_if_nodata(nodata_b)
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let mut output = a.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(0.0));
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}

/// Multiply two GeoTIFF files and write the product to `output`.
pub fn multiply_files(
    input_a: impl AsRef<Path>,
    input_b: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> Result<()> {
    let a: Raster<f64> = read_geotiff(input_a.as_ref(), None)?;
    let b: Raster<f64> = read_geotiff(input_b.as_ref(), None)?;
    let product = multiply(&a, &b)?;
    write_geotiff(&product, output.as_ref(), Some(GeoTiffOptions::default()))?;
    info!("product written to {}", output.as_ref().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoagg_core::{GeoTransform, CRS};

    fn make(values: Vec<f64>, nodata: Option<f64>) -> Raster<f64> {
        let mut r = Raster::from_vec(values, 2, 3).unwrap();
        r.set_transform(GeoTransform::new(10.0, 20.0, 1.0, -1.0));
        r.set_nodata(nodata);
        r
    }

    #[test]
    fn test_multiply_plain() {
        let a = make(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], None);
        let b = make(vec![2.0; 6], None);
        let out = multiply(&a, &b).unwrap();
        assert_eq!(out.data().iter().copied().collect::<Vec<_>>(), vec![2.0, 4.0, 6.0, 8.0, 10.0, 12.0]);
        assert_eq!(out.nodata(), Some(0.0));
    }

    #[test]
    fn test_multiply_nodata_is_zero_per_raster() {
        // -1 is no-data in `a` only; 255 is no-data in `b` only
        let a = make(vec![-1.0, 2.0, 255.0, 4.0, f64::NAN, 6.0], Some(-1.0));
        let b = make(vec![3.0, 255.0, 2.0, -1.0, 1.0, 0.5], Some(255.0));
        let out = multiply(&a, &b).unwrap();

        assert_eq!(out.get(0, 0).unwrap(), 0.0); // a no-data
        assert_eq!(out.get(0, 1).unwrap(), 0.0); // b no-data
        assert_eq!(out.get(0, 2).unwrap(), 510.0); // 255 valid in a
        assert_eq!(out.get(1, 0).unwrap(), -4.0); // -1 valid in b
        assert_eq!(out.get(1, 1).unwrap(), 0.0); // NaN
        assert_eq!(out.get(1, 2).unwrap(), 3.0);
    }

    #[test]
    fn test_multiply_keeps_first_profile() {
        let mut a = make(vec![1.0; 6], None);
        a.set_crs(Some(CRS::from_epsg(32630)));
        let b = make(vec![1.0; 6], None);
        let out = multiply(&a, &b).unwrap();
        assert_eq!(out.crs(), Some(&CRS::from_epsg(32630)));
        assert_eq!(*out.transform(), *a.transform());
    }

    #[test]
    fn test_multiply_shape_mismatch() {
        let a = make(vec![1.0; 6], None);
        let b = Raster::filled(3, 2, 1.0);
        assert!(matches!(multiply(&a, &b), Err(Error::SizeMismatch { .. })));
    }
}

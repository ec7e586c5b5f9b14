//! Raster arithmetic
//!
//! - Multiply: cell-by-cell product with per-raster no-data as zero
//! - Prediction: rasters from `(i, j, yhat)` prediction tables
//! - Aggregate: block-sum downsampling

mod aggregate;
mod band_math;
mod prediction;

pub use aggregate::{aggregate, aggregate_files, Aggregate, AggregateParams};
pub use band_math::{multiply, multiply_files, Multiply};
pub use prediction::{
    generate_raster, predictions_to_raster, read_predictions_csv, PredictionRow,
    PREDICTION_NODATA,
};

//! # GeoAgg Algorithms
//!
//! Aggregation and evaluation helpers built on `geoagg-core`.
//!
//! ## Available Algorithm Categories
//!
//! - **statistics**: Zonal means of point samples, polygon masking, weighted sums per polygon
//! - **imagery**: Raster multiplication, prediction rasters, block aggregation
//! - **vector**: Square footprints around points
//! - **scoring**: R² via Pearson and MAPE for model evaluation

mod maybe_rayon;

pub mod imagery;
pub mod scoring;
pub mod statistics;
pub mod vector;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::imagery::{
        aggregate, generate_raster, multiply, predictions_to_raster, read_predictions_csv,
        Aggregate, AggregateParams, Multiply, PredictionRow,
    };
    pub use crate::scoring::{mape, r2_pearson, Direction, Mape, R2Pearson, Scorer};
    pub use crate::statistics::{
        mask_raster, weighted_sum_by_polygon, weighted_sums, zonal_mean, PointSample,
        WeightedSum, WeightedSumParams, WeightedSumRecord,
    };
    pub use crate::vector::square_around_point;
    pub use geoagg_core::prelude::*;
}

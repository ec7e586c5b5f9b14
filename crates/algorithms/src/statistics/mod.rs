//! Statistics of rasters and point samples over polygons
//!
//! - **zonal**: Mean of point samples inside each polygon
//! - **mask**: Crop and mask a raster to a polygon
//! - **weighted**: Weight-normalised indicator sums per polygon

pub mod mask;
pub mod weighted;
pub mod zonal;

pub use mask::mask_raster;
pub use weighted::{
    apply_records, intermediate_path, weighted_sum_by_polygon, weighted_sums, WeightedSum,
    WeightedSumParams, WeightedSumRecord,
};
pub use zonal::{
    samples_from_columns, zonal_mean, zonal_mean_from_file, zonal_point_statistics, PointSample,
    ZonalResult,
};

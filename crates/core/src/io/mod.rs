//! I/O operations for reading and writing geospatial data
//!
//! Rasters are GeoTIFF (native `tiff` reader/writer); vector data lives in
//! [`crate::vector`] as GeoJSON.

mod native;

pub use native::{
    read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer,
    GeoTiffOptions,
};

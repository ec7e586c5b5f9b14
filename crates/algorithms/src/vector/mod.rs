//! Vector construction helpers
//!
//! - Square: fixed-size square polygon around a lon/lat point

mod square;

pub use square::{square_around_point, square_feature_collection, EARTH_RADIUS_M};

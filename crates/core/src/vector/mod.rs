//! Vector features: geometry plus attributes

mod geojson_io;

pub use geojson_io::{read_geojson, read_geojson_str, write_geojson, write_geojson_string};

use crate::crs::{reproject_geometry, CoordTransform, CRS};
use crate::error::Result;
use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(v) => Some(*v as f64),
            AttributeValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Feature geometry
    pub geometry: Option<Geometry<f64>>,
    /// Feature attributes
    pub properties: HashMap<String, AttributeValue>,
    /// Optional feature ID
    pub id: Option<String>,
}

impl Feature {
    /// Create a new feature with geometry
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            properties: HashMap::new(),
            id: None,
        }
    }

    /// Create a feature with no geometry
    pub fn empty() -> Self {
        Self {
            geometry: None,
            properties: HashMap::new(),
            id: None,
        }
    }

    /// Set an attribute
    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    /// Get an attribute
    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }
}

/// Ordered collection of features sharing one CRS.
///
/// Features are identified by their position, which readers and writers
/// preserve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
    pub crs: Option<CRS>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self {
            features: Vec::new(),
            crs: None,
        }
    }

    pub fn with_crs(crs: CRS) -> Self {
        Self {
            features: Vec::new(),
            crs: Some(crs),
        }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Feature> {
        self.features.iter_mut()
    }

    /// Geometries in feature order; `None` for features without one
    pub fn geometries(&self) -> Vec<Option<&Geometry<f64>>> {
        self.features.iter().map(|f| f.geometry.as_ref()).collect()
    }

    /// Copy of the collection with every geometry reprojected to `target`.
    ///
    /// A collection without a CRS is assumed to already be in `target`.
    pub fn to_crs(&self, target: &CRS) -> Result<FeatureCollection> {
        let Some(source) = &self.crs else {
            return Ok(FeatureCollection {
                features: self.features.clone(),
                crs: Some(target.clone()),
            });
        };

        let transform = CoordTransform::new(source, target)?;
        let features = self
            .features
            .iter()
            .map(|f| {
                Ok(Feature {
                    geometry: f
                        .geometry
                        .as_ref()
                        .map(|g| reproject_geometry(g, &transform))
                        .transpose()?,
                    properties: f.properties.clone(),
                    id: f.id.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(FeatureCollection {
            features,
            crs: Some(target.clone()),
        })
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{point, Point};

    #[test]
    fn test_feature_properties() {
        let mut f = Feature::new(Geometry::Point(point!(x: 1.0, y: 2.0)));
        f.set_property("population", AttributeValue::Int(12));
        assert_eq!(f.get_property("population").and_then(|v| v.as_i64()), Some(12));
        assert_eq!(f.get_property("population").and_then(|v| v.as_f64()), Some(12.0));
        assert!(f.get_property("missing").is_none());
    }

    #[test]
    fn test_to_crs_reprojects_and_tags() {
        let mut fc = FeatureCollection::with_crs(CRS::wgs84());
        fc.push(Feature::new(Geometry::Point(Point::new(-3.0, 0.0))));
        fc.push(Feature::empty());

        let utm = fc.to_crs(&CRS::from_epsg(32630)).unwrap();
        assert_eq!(utm.crs, Some(CRS::from_epsg(32630)));
        assert_eq!(utm.len(), 2);
        let Some(Geometry::Point(p)) = &utm.features[0].geometry else {
            panic!("expected point");
        };
        assert!((p.x() - 500_000.0).abs() < 0.01);
        assert!(p.y().abs() < 0.01);
        assert!(utm.features[1].geometry.is_none());
    }

    #[test]
    fn test_to_crs_without_source_crs() {
        let mut fc = FeatureCollection::new();
        fc.push(Feature::new(Geometry::Point(Point::new(5.0, 5.0))));
        let out = fc.to_crs(&CRS::from_epsg(32630)).unwrap();
        assert_eq!(out.features[0], fc.features[0]);
        assert_eq!(out.crs, Some(CRS::from_epsg(32630)));
    }
}

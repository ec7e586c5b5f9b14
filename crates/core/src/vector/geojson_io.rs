//! GeoJSON reading and writing
//!
//! The legacy `crs` member (`{"type": "name", "properties": {"name": ...}}`)
//! is read and written so projected collections survive a round trip.
//! Without it a collection is WGS84, as RFC 7946 requires.

use super::{AttributeValue, Feature, FeatureCollection};
use crate::crs::CRS;
use crate::error::{Error, Result};
use geo_types::Geometry;
use geojson::feature::Id;
use geojson::{GeoJson, JsonObject, JsonValue};
use serde_json::{json, Number};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Read a GeoJSON file into a [`FeatureCollection`]
pub fn read_geojson<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let collection = read_geojson_str(&text)?;
    debug!(
        "read {} features from {}",
        collection.len(),
        path.as_ref().display()
    );
    Ok(collection)
}

/// Parse GeoJSON text.
///
/// A bare Feature or Geometry is wrapped into a one-element collection.
pub fn read_geojson_str(text: &str) -> Result<FeatureCollection> {
    let geojson: GeoJson = text.parse()?;

    match geojson {
        GeoJson::FeatureCollection(fc) => {
            let crs = fc
                .foreign_members
                .as_ref()
                .and_then(crs_from_members)
                .unwrap_or_else(CRS::wgs84);
            let features = fc
                .features
                .into_iter()
                .map(convert_feature)
                .collect::<Result<Vec<_>>>()?;
            Ok(FeatureCollection {
                features,
                crs: Some(crs),
            })
        }
        GeoJson::Feature(f) => {
            let crs = f
                .foreign_members
                .as_ref()
                .and_then(crs_from_members)
                .unwrap_or_else(CRS::wgs84);
            let mut collection = FeatureCollection::with_crs(crs);
            collection.push(convert_feature(f)?);
            Ok(collection)
        }
        GeoJson::Geometry(g) => {
            let mut collection = FeatureCollection::with_crs(CRS::wgs84());
            collection.push(Feature::new(Geometry::<f64>::try_from(g)?));
            Ok(collection)
        }
    }
}

/// Write a [`FeatureCollection`] to a GeoJSON file
pub fn write_geojson<P: AsRef<Path>>(collection: &FeatureCollection, path: P) -> Result<()> {
    let text = write_geojson_string(collection)?;
    std::fs::write(path.as_ref(), text)?;
    debug!(
        "wrote {} features to {}",
        collection.len(),
        path.as_ref().display()
    );
    Ok(())
}

/// Serialize a [`FeatureCollection`] as pretty-printed GeoJSON
pub fn write_geojson_string(collection: &FeatureCollection) -> Result<String> {
    let features = collection.features.iter().map(to_geojson_feature).collect();

    let foreign_members = match &collection.crs {
        Some(crs) if crs.epsg() != Some(4326) => {
            let name = crs.to_urn().ok_or_else(|| {
                Error::Vector(format!("cannot encode CRS {} as a GeoJSON crs member", crs))
            })?;
            let mut members = JsonObject::new();
            members.insert(
                "crs".to_string(),
                json!({ "type": "name", "properties": { "name": name } }),
            );
            Some(members)
        }
        _ => None,
    };

    let fc = geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    };
    Ok(serde_json::to_string_pretty(&fc)?)
}

fn crs_from_members(members: &JsonObject) -> Option<CRS> {
    let name = members.get("crs")?.get("properties")?.get("name")?.as_str()?;
    CRS::from_identifier(name)
}

fn convert_feature(feature: geojson::Feature) -> Result<Feature> {
    let geometry = feature
        .geometry
        .map(Geometry::<f64>::try_from)
        .transpose()?;

    let properties = feature
        .properties
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, attribute_from_json(v)))
        .collect::<HashMap<_, _>>();

    let id = feature.id.map(|id| match id {
        Id::String(s) => s,
        Id::Number(n) => n.to_string(),
    });

    Ok(Feature {
        geometry,
        properties,
        id,
    })
}

fn to_geojson_feature(feature: &Feature) -> geojson::Feature {
    let geometry = feature
        .geometry
        .as_ref()
        .map(|g| geojson::Geometry::new(geojson::Value::from(g)));

    let properties: JsonObject = feature
        .properties
        .iter()
        .map(|(k, v)| (k.clone(), attribute_to_json(v)))
        .collect();

    let id = feature.id.as_ref().map(|id| match id.parse::<i64>() {
        Ok(n) => Id::Number(Number::from(n)),
        Err(_) => Id::String(id.clone()),
    });

    geojson::Feature {
        bbox: None,
        geometry,
        id,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn attribute_from_json(value: JsonValue) -> AttributeValue {
    match value {
        JsonValue::Null => AttributeValue::Null,
        JsonValue::Bool(b) => AttributeValue::Bool(b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Int(i),
            None => AttributeValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(s) => AttributeValue::String(s),
        other => AttributeValue::String(other.to_string()),
    }
}

fn attribute_to_json(value: &AttributeValue) -> JsonValue {
    match value {
        AttributeValue::Null => JsonValue::Null,
        AttributeValue::Bool(b) => JsonValue::Bool(*b),
        AttributeValue::Int(i) => JsonValue::Number(Number::from(*i)),
        // JSON has no NaN or infinity
        AttributeValue::Float(f) => Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        AttributeValue::String(s) => JsonValue::String(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "id": 7,
                "properties": {"admin1Name": "North", "code": 3, "share": 0.25, "flag": true, "note": null},
                "geometry": {"type": "Polygon", "coordinates": [[[0,0],[2,0],[2,2],[0,2],[0,0]]]}
            },
            {
                "type": "Feature",
                "properties": {"admin1Name": "Nowhere"},
                "geometry": null
            }
        ]
    }"#;

    #[test]
    fn test_read_feature_collection() {
        let fc = read_geojson_str(SAMPLE).unwrap();
        assert_eq!(fc.len(), 2);
        assert_eq!(fc.crs, Some(CRS::wgs84()));

        let first = &fc.features[0];
        assert!(matches!(first.geometry, Some(Geometry::Polygon(_))));
        assert_eq!(first.id.as_deref(), Some("7"));
        assert_eq!(
            first.get_property("admin1Name"),
            Some(&AttributeValue::String("North".into()))
        );
        assert_eq!(first.get_property("code"), Some(&AttributeValue::Int(3)));
        assert_eq!(first.get_property("share"), Some(&AttributeValue::Float(0.25)));
        assert_eq!(first.get_property("flag"), Some(&AttributeValue::Bool(true)));
        assert_eq!(first.get_property("note"), Some(&AttributeValue::Null));

        assert!(fc.features[1].geometry.is_none());
    }

    #[test]
    fn test_legacy_crs_member() {
        let text = r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::32630"}},
            "features": []
        }"#;
        let fc = read_geojson_str(text).unwrap();
        assert_eq!(fc.crs, Some(CRS::from_epsg(32630)));

        let written = write_geojson_string(&fc).unwrap();
        assert!(written.contains("urn:ogc:def:crs:EPSG::32630"));
        assert_eq!(read_geojson_str(&written).unwrap().crs, fc.crs);
    }

    #[test]
    fn test_write_preserves_order_and_attributes() {
        let mut fc = read_geojson_str(SAMPLE).unwrap();
        fc.features[0].set_property("indicator", AttributeValue::Float(0.5));
        fc.features[1].set_property("indicator", AttributeValue::Float(f64::NAN));

        let text = write_geojson_string(&fc).unwrap();
        assert!(!text.contains("\"crs\""));

        let back = read_geojson_str(&text).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.features[0].id.as_deref(), Some("7"));
        assert_eq!(
            back.features[0].get_property("indicator"),
            Some(&AttributeValue::Float(0.5))
        );
        assert_eq!(back.features[1].get_property("indicator"), Some(&AttributeValue::Null));
        assert_eq!(
            back.features[1].get_property("admin1Name"),
            Some(&AttributeValue::String("Nowhere".into()))
        );
    }

    #[test]
    fn test_bare_geometry() {
        let fc = read_geojson_str(r#"{"type": "Point", "coordinates": [1.5, 2.5]}"#).unwrap();
        assert_eq!(fc.len(), 1);
        assert!(matches!(fc.features[0].geometry, Some(Geometry::Point(_))));
    }

    #[test]
    fn test_invalid_json_is_vector_error() {
        assert!(matches!(read_geojson_str("{not json"), Err(Error::Vector(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_geojson("/definitely/not/here.geojson").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}

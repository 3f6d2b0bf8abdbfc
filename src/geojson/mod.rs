/// GeoJSON FeatureCollection validation and parsing
///
/// Given raw bytes, produces the ordered sequence of validated features or
/// fails with a descriptive error. Validation is fail-fast: the first invalid
/// feature aborts the whole parse. Features whose geometry is `null` are kept
/// with the geometry absent.
use serde_json::Value;
use thiserror::Error;

mod geometry;

pub use geometry::{Geometry, Position, GEOMETRY_TYPES};

#[derive(Debug, Error)]
pub enum GeoJsonError {
    #[error("Content was not a JSON object.")]
    NotJsonObject,

    #[error("The \"type\" member is required and was not found.")]
    MissingType,

    #[error("GeoJSON object must be of type FeatureCollection. The passed type was {0}.")]
    WrongType(String),

    #[error("GeoJSON object must have member named \"features\" as an array of Features.")]
    MissingFeatures,

    #[error(
        "GeoJSON Features must have a type of \"Feature\" and \"properties\" and \"geometry\" members."
    )]
    InvalidFeature,

    #[error("{0} is not a valid GeoJSON geometry.")]
    UnknownGeometryType(String),

    #[error("GeoJSON validation error. Message: {0}.")]
    InvalidGeometry(String),
}

/// One validated feature. `geometry` is `None` for null-geometry features.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFeature {
    pub geometry: Option<Geometry>,
    pub properties: Value,
}

/// Validate raw bytes as a GeoJSON FeatureCollection and extract its features
/// in order.
pub fn parse_feature_collection(bytes: &[u8]) -> Result<Vec<ParsedFeature>, GeoJsonError> {
    let root: Value = serde_json::from_slice(bytes).map_err(|_| GeoJsonError::NotJsonObject)?;
    let object = root.as_object().ok_or(GeoJsonError::NotJsonObject)?;

    let collection_type = object.get("type").ok_or(GeoJsonError::MissingType)?;
    if collection_type != "FeatureCollection" {
        return Err(GeoJsonError::WrongType(render(collection_type)));
    }

    let features = object
        .get("features")
        .and_then(Value::as_array)
        .ok_or(GeoJsonError::MissingFeatures)?;

    let mut parsed = Vec::with_capacity(features.len());
    for feature in features {
        parsed.push(parse_feature(feature)?);
    }
    Ok(parsed)
}

fn parse_feature(feature: &Value) -> Result<ParsedFeature, GeoJsonError> {
    let object = feature.as_object().ok_or(GeoJsonError::InvalidFeature)?;
    if object.get("type").map(Value::as_str) != Some(Some("Feature")) {
        return Err(GeoJsonError::InvalidFeature);
    }
    let properties = object
        .get("properties")
        .cloned()
        .ok_or(GeoJsonError::InvalidFeature)?;
    let geometry_value = object.get("geometry").ok_or(GeoJsonError::InvalidFeature)?;

    if geometry_value.is_null() {
        // Null geometries are valid. Move along.
        return Ok(ParsedFeature {
            geometry: None,
            properties,
        });
    }

    let geometry_type = geometry_value
        .get("type")
        .ok_or_else(|| GeoJsonError::InvalidGeometry("geometry has no \"type\" member".into()))?;
    let geometry_type = geometry_type
        .as_str()
        .ok_or_else(|| GeoJsonError::UnknownGeometryType(render(geometry_type)))?;
    if !GEOMETRY_TYPES.contains(&geometry_type) {
        return Err(GeoJsonError::UnknownGeometryType(geometry_type.to_string()));
    }

    let geometry: Geometry = serde_json::from_value(geometry_value.clone())
        .map_err(|e| GeoJsonError::InvalidGeometry(e.to_string()))?;
    geometry.validate().map_err(GeoJsonError::InvalidGeometry)?;

    Ok(ParsedFeature {
        geometry: Some(geometry),
        properties,
    })
}

fn render(value: &Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    }
}

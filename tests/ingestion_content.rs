//! Ingestion-side content handling: what the parser admits and what the
//! pipeline would store after elevation stripping.

use geosync_service::geojson::{parse_feature_collection, GeoJsonError, Geometry};
use serde_json::{json, Value};

fn fixture() -> Value {
    json!({
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"name": "hydrant-1", "flow": 1250},
                "geometry": {"type": "Point", "coordinates": [-80.843, 35.227, 228.0]}
            },
            {
                "type": "Feature",
                "properties": {"name": "main-4"},
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[-80.85, 35.22, 230.0], [-80.84, 35.23, 231.5]]
                }
            },
            {
                "type": "Feature",
                "properties": {"name": "district-7"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [-80.9, 35.2, 200.0],
                        [-80.8, 35.2, 201.0],
                        [-80.8, 35.3, 202.0],
                        [-80.9, 35.2, 200.0]
                    ]]
                }
            },
            {
                "type": "Feature",
                "properties": {"name": "no-location"},
                "geometry": null
            }
        ]
    })
}

#[test]
fn parses_mixed_kinds_in_order() {
    let bytes = serde_json::to_vec(&fixture()).unwrap();
    let features = parse_feature_collection(&bytes).unwrap();

    assert_eq!(features.len(), 4);
    assert!(matches!(features[0].geometry, Some(Geometry::Point { .. })));
    assert!(matches!(
        features[1].geometry,
        Some(Geometry::LineString { .. })
    ));
    assert!(matches!(
        features[2].geometry,
        Some(Geometry::Polygon { .. })
    ));
    assert!(features[3].geometry.is_none());
    assert_eq!(features[0].properties["flow"], 1250);
}

#[test]
fn stored_geometries_carry_no_elevation() {
    let bytes = serde_json::to_vec(&fixture()).unwrap();
    let features = parse_feature_collection(&bytes).unwrap();

    for parsed in features {
        let Some(mut geometry) = parsed.geometry else {
            continue;
        };
        geometry.strip_elevation();
        assert!(geometry.construct_check().is_ok());

        // What the pipeline hands to the store
        let stored: Value = serde_json::to_value(&geometry).unwrap();
        assert_positions_are_2d(&stored["coordinates"]);
    }
}

fn assert_positions_are_2d(coordinates: &Value) {
    match coordinates.as_array() {
        Some(items) if items.iter().all(Value::is_number) => {
            assert_eq!(items.len(), 2, "position not truncated: {coordinates}");
        }
        Some(items) => items.iter().for_each(assert_positions_are_2d),
        None => panic!("coordinates are not an array: {coordinates}"),
    }
}

#[test]
fn corrupting_one_feature_fails_the_whole_parse() {
    let mut payload = fixture();
    payload["features"][2]["geometry"]["type"] = json!("Blob");
    let err = parse_feature_collection(&serde_json::to_vec(&payload).unwrap()).unwrap_err();
    assert!(matches!(err, GeoJsonError::UnknownGeometryType(_)));
    assert_eq!(err.to_string(), "Blob is not a valid GeoJSON geometry.");
}

#[test]
fn feature_without_geometry_member_is_invalid() {
    let mut payload = fixture();
    payload["features"][1]
        .as_object_mut()
        .unwrap()
        .remove("geometry");
    let err = parse_feature_collection(&serde_json::to_vec(&payload).unwrap()).unwrap_err();
    assert!(matches!(err, GeoJsonError::InvalidFeature));
}

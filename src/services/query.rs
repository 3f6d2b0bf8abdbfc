/// Spatial query engine
///
/// Builds filter predicates from request parameters, applies pagination and
/// assembles the wire FeatureCollection. Predicate evaluation itself happens
/// in the store (`db::features`).
use crate::db;
use crate::error::{AppError, Result};
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;

pub const BBOX_ITEMS_MESSAGE: &str =
    "The bbox parameter must contain 4 items: xmin, ymin, xmax, ymax";
pub const BBOX_FLOATS_MESSAGE: &str = "Items in the bbox parameter must be parseable as floats";
pub const NEAR_FLOATS_MESSAGE: &str =
    "Parameters lat, lon and distance must be parseable as floats";

/// Spatial filter forms. `bbox` produces an intersects predicate, the
/// point+radius form a distance-within predicate (meters).
#[derive(Debug, Clone, PartialEq)]
pub enum SpatialFilter {
    Bbox {
        xmin: f64,
        ymin: f64,
        xmax: f64,
        ymax: f64,
    },
    Near {
        lat: f64,
        lon: f64,
        distance: f64,
    },
}

/// A parsed and normalized query
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureQuery {
    pub filter: Option<SpatialFilter>,
    pub limit: i64,
    pub offset: i64,
    pub callback: Option<String>,
}

/// Parse raw query parameters. A present `bbox` takes precedence over the
/// lat/lon/distance set. Malformed spatial parameters fail with stable
/// user-facing messages; non-numeric `limit`/`offset` silently fall back to
/// their defaults.
pub fn parse_query(
    params: &HashMap<String, String>,
    max_page_size: i64,
) -> Result<FeatureQuery> {
    let filter = if let Some(bbox) = params.get("bbox") {
        Some(parse_bbox(bbox)?)
    } else if ["lat", "lon", "distance"]
        .iter()
        .any(|key| params.contains_key(*key))
    {
        Some(parse_near(params)?)
    } else {
        None
    };

    let limit = params
        .get("limit")
        .and_then(|value| value.parse::<i64>().ok())
        .unwrap_or(max_page_size)
        .clamp(0, max_page_size);
    let offset = params
        .get("offset")
        .and_then(|value| value.parse::<i64>().ok())
        .unwrap_or(0)
        .max(0);

    Ok(FeatureQuery {
        filter,
        limit,
        offset,
        callback: params.get("callback").cloned(),
    })
}

fn parse_bbox(raw: &str) -> Result<SpatialFilter> {
    let items: Vec<&str> = raw.split(',').collect();
    if items.len() != 4 {
        return Err(AppError::InvalidSpatialParameter(
            BBOX_ITEMS_MESSAGE.to_string(),
        ));
    }
    let mut values = [0f64; 4];
    for (slot, item) in values.iter_mut().zip(&items) {
        *slot = item.trim().parse().map_err(|_| {
            AppError::InvalidSpatialParameter(BBOX_FLOATS_MESSAGE.to_string())
        })?;
    }
    Ok(SpatialFilter::Bbox {
        xmin: values[0],
        ymin: values[1],
        xmax: values[2],
        ymax: values[3],
    })
}

fn parse_near(params: &HashMap<String, String>) -> Result<SpatialFilter> {
    let float = |key: &str| -> Result<f64> {
        params
            .get(key)
            .and_then(|value| value.trim().parse().ok())
            .ok_or_else(|| AppError::InvalidSpatialParameter(NEAR_FLOATS_MESSAGE.to_string()))
    };
    Ok(SpatialFilter::Near {
        lat: float("lat")?,
        lon: float("lon")?,
        distance: float("distance")?,
    })
}

/// Wire feature entry
#[derive(Debug, Serialize)]
pub struct FeaturePayload {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub properties: serde_json::Value,
    pub geometry: serde_json::Value,
    pub id: i64,
}

/// Wire feature collection: one page of features plus the page count and the
/// unpaginated total for the same filter
#[derive(Debug, Serialize)]
pub struct FeatureCollectionResponse {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub features: Vec<FeaturePayload>,
    pub count: usize,
    pub total_count: i64,
}

/// Execute a query against a feature set resolved by owner + repo + name.
/// An unknown triple and a not-yet-synced feature set both read as not found.
pub async fn feature_set_query(
    pool: &PgPool,
    owner: &str,
    repo_name: &str,
    feature_set_name: &str,
    query: &FeatureQuery,
) -> Result<FeatureCollectionResponse> {
    let full_name = format!("{}/{}", owner, repo_name);
    let repo = db::repos::find_by_full_name(pool, &full_name)
        .await?
        .ok_or(AppError::NotFound)?;
    let feature_set = db::feature_sets::find_by_repo_and_name(pool, repo.id, feature_set_name)
        .await?
        .ok_or(AppError::NotFound)?;
    if !feature_set.synced {
        return Err(AppError::NotFound);
    }

    let features = db::features::query_page(
        pool,
        feature_set.id,
        query.filter.as_ref(),
        query.limit,
        query.offset,
    )
    .await?;
    let total_count = db::features::count(pool, feature_set.id, query.filter.as_ref()).await?;

    let features: Vec<FeaturePayload> = features
        .into_iter()
        .map(|feature| FeaturePayload {
            kind: "Feature",
            properties: feature.properties,
            geometry: feature.geometry,
            id: feature.id,
        })
        .collect();

    Ok(FeatureCollectionResponse {
        kind: "FeatureCollection",
        count: features.len(),
        features,
        total_count,
    })
}

/// Optionally wrap a serialized payload as a callback invocation. Purely
/// presentational; the payload structure is unchanged. Returns the body and
/// its content type.
pub fn wrap_callback(json: String, callback: Option<&str>) -> (String, &'static str) {
    match callback {
        Some(name) => (format!("{}({})", name, json), "text/javascript"),
        None => (json, "application/json"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn bbox_with_wrong_item_count_fails_with_exact_message() {
        for raw in ["1,2,3", "1,2,3,4,5"] {
            let err = parse_query(&params(&[("bbox", raw)]), 500).unwrap_err();
            assert_eq!(
                err.to_string(),
                "The bbox parameter must contain 4 items: xmin, ymin, xmax, ymax"
            );
        }
    }

    #[test]
    fn bbox_with_non_float_items_fails_with_exact_message() {
        let err = parse_query(&params(&[("bbox", "lobster,4,cat,8")]), 500).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Items in the bbox parameter must be parseable as floats"
        );
    }

    #[test]
    fn bbox_parses_into_intersects_filter() {
        let query =
            parse_query(&params(&[("bbox", "-80.888,35.206,-80.799,35.270")]), 500).unwrap();
        assert_eq!(
            query.filter,
            Some(SpatialFilter::Bbox {
                xmin: -80.888,
                ymin: 35.206,
                xmax: -80.799,
                ymax: 35.270,
            })
        );
    }

    #[test]
    fn near_filter_requires_parseable_floats() {
        let err = parse_query(
            &params(&[("lat", "35.2"), ("lon", "x"), ("distance", "100")]),
            500,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parameters lat, lon and distance must be parseable as floats"
        );
    }

    #[test]
    fn partial_near_set_fails_the_same_way() {
        let err = parse_query(&params(&[("lat", "35.2")]), 500).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parameters lat, lon and distance must be parseable as floats"
        );
    }

    #[test]
    fn bbox_takes_precedence_over_near() {
        let query = parse_query(
            &params(&[
                ("bbox", "0,0,1,1"),
                ("lat", "35.2"),
                ("lon", "-80.8"),
                ("distance", "500"),
            ]),
            500,
        )
        .unwrap();
        assert!(matches!(query.filter, Some(SpatialFilter::Bbox { .. })));
    }

    #[test]
    fn limit_defaults_to_and_clamps_at_the_page_cap() {
        let query = parse_query(&params(&[]), 500).unwrap();
        assert_eq!(query.limit, 500);

        let query = parse_query(&params(&[("limit", "9000")]), 500).unwrap();
        assert_eq!(query.limit, 500);

        let query = parse_query(&params(&[("limit", "30")]), 500).unwrap();
        assert_eq!(query.limit, 30);
    }

    #[test]
    fn non_numeric_limit_and_offset_fall_back_to_defaults() {
        let query = parse_query(&params(&[("limit", "many"), ("offset", "few")]), 500).unwrap();
        assert_eq!(query.limit, 500);
        assert_eq!(query.offset, 0);
    }

    #[test]
    fn offset_defaults_to_zero() {
        let query = parse_query(&params(&[("offset", "30")]), 500).unwrap();
        assert_eq!(query.offset, 30);
        let query = parse_query(&params(&[]), 500).unwrap();
        assert_eq!(query.offset, 0);
    }

    #[test]
    fn callback_wrapping_is_presentational_only() {
        let payload = serde_json::json!({"type": "FeatureCollection", "features": []});
        let json = payload.to_string();

        let (body, content_type) = wrap_callback(json.clone(), None);
        assert_eq!(body, json);
        assert_eq!(content_type, "application/json");

        let (body, content_type) = wrap_callback(json.clone(), Some("draw"));
        assert_eq!(body, format!("draw({})", json));
        assert_eq!(content_type, "text/javascript");
        // The wrapped payload still parses to the same structure
        let inner = &body[5..body.len() - 1];
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(inner).unwrap(),
            payload
        );
    }

    #[test]
    fn response_serializes_with_wire_field_names() {
        let response = FeatureCollectionResponse {
            kind: "FeatureCollection",
            features: vec![FeaturePayload {
                kind: "Feature",
                properties: serde_json::json!({"name": "x"}),
                geometry: serde_json::json!({"type": "Point", "coordinates": [1.0, 2.0]}),
                id: 7,
            }],
            count: 1,
            total_count: 26,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["features"][0]["type"], "Feature");
        assert_eq!(value["features"][0]["id"], 7);
        assert_eq!(value["count"], 1);
        assert_eq!(value["total_count"], 26);
    }
}

use crate::models::{Bounds, Feature};
use crate::services::query::SpatialFilter;
use sqlx::PgPool;

const FEATURE_COLUMNS: &str =
    "id, feature_set_id, ST_AsGeoJSON(geom)::jsonb AS geometry, properties";

/// Insert one feature. The geometry arrives as GeoJSON text and is built by
/// the store; construction failures surface as database errors.
pub async fn insert(
    pool: &PgPool,
    feature_set_id: i64,
    geometry_geojson: &str,
    properties: &serde_json::Value,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO features (feature_set_id, geom, properties)
        VALUES ($1, ST_SetSRID(ST_GeomFromGeoJSON($2), 4326), $3)
        RETURNING id
        "#,
    )
    .bind(feature_set_id)
    .bind(geometry_geojson)
    .bind(properties)
    .fetch_one(pool)
    .await
}

/// Explicit cascading delete of a feature set's features
pub async fn delete_by_feature_set(pool: &PgPool, feature_set_id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM features WHERE feature_set_id = $1")
        .bind(feature_set_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// One stable-ordered page of a feature set's features, optionally filtered
/// by a spatial predicate. PostGIS evaluates the predicate.
pub async fn query_page(
    pool: &PgPool,
    feature_set_id: i64,
    filter: Option<&SpatialFilter>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Feature>, sqlx::Error> {
    match filter {
        None => {
            sqlx::query_as::<_, Feature>(&format!(
                r#"
                SELECT {FEATURE_COLUMNS} FROM features
                WHERE feature_set_id = $1
                ORDER BY id
                LIMIT $2 OFFSET $3
                "#
            ))
            .bind(feature_set_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
        }
        Some(SpatialFilter::Bbox { xmin, ymin, xmax, ymax }) => {
            sqlx::query_as::<_, Feature>(&format!(
                r#"
                SELECT {FEATURE_COLUMNS} FROM features
                WHERE feature_set_id = $1
                  AND ST_Intersects(geom, ST_MakeEnvelope($2, $3, $4, $5, 4326))
                ORDER BY id
                LIMIT $6 OFFSET $7
                "#
            ))
            .bind(feature_set_id)
            .bind(xmin)
            .bind(ymin)
            .bind(xmax)
            .bind(ymax)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
        }
        Some(SpatialFilter::Near { lat, lon, distance }) => {
            sqlx::query_as::<_, Feature>(&format!(
                r#"
                SELECT {FEATURE_COLUMNS} FROM features
                WHERE feature_set_id = $1
                  AND ST_DWithin(
                        geom::geography,
                        ST_SetSRID(ST_MakePoint($2, $3), 4326)::geography,
                        $4)
                ORDER BY id
                LIMIT $5 OFFSET $6
                "#
            ))
            .bind(feature_set_id)
            .bind(lon)
            .bind(lat)
            .bind(distance)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
        }
    }
}

/// Unpaginated count against the same filter predicate as `query_page`
pub async fn count(
    pool: &PgPool,
    feature_set_id: i64,
    filter: Option<&SpatialFilter>,
) -> Result<i64, sqlx::Error> {
    match filter {
        None => {
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM features WHERE feature_set_id = $1",
            )
            .bind(feature_set_id)
            .fetch_one(pool)
            .await
        }
        Some(SpatialFilter::Bbox { xmin, ymin, xmax, ymax }) => {
            sqlx::query_scalar::<_, i64>(
                r#"
                SELECT COUNT(*) FROM features
                WHERE feature_set_id = $1
                  AND ST_Intersects(geom, ST_MakeEnvelope($2, $3, $4, $5, 4326))
                "#,
            )
            .bind(feature_set_id)
            .bind(xmin)
            .bind(ymin)
            .bind(xmax)
            .bind(ymax)
            .fetch_one(pool)
            .await
        }
        Some(SpatialFilter::Near { lat, lon, distance }) => {
            sqlx::query_scalar::<_, i64>(
                r#"
                SELECT COUNT(*) FROM features
                WHERE feature_set_id = $1
                  AND ST_DWithin(
                        geom::geography,
                        ST_SetSRID(ST_MakePoint($2, $3), 4326)::geography,
                        $4)
                "#,
            )
            .bind(feature_set_id)
            .bind(lon)
            .bind(lat)
            .bind(distance)
            .fetch_one(pool)
            .await
        }
    }
}

/// Bounding box of a feature set's features, `None` when it has none
pub async fn extent(pool: &PgPool, feature_set_id: i64) -> Result<Option<Bounds>, sqlx::Error> {
    let row = sqlx::query_as::<_, (f64, f64, f64, f64)>(
        r#"
        SELECT ST_XMin(ext), ST_YMin(ext), ST_XMax(ext), ST_YMax(ext)
        FROM (SELECT ST_Extent(geom) AS ext FROM features WHERE feature_set_id = $1) AS bounds
        WHERE ext IS NOT NULL
        "#,
    )
    .bind(feature_set_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(xmin, ymin, xmax, ymax)| Bounds {
        xmin,
        ymin,
        xmax,
        ymax,
    }))
}

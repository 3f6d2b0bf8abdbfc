//! Query-engine behavior against a live PostGIS store: pagination ranks,
//! filtered counts and destructive deletes.
//!
//! These tests need a PostGIS-enabled PostgreSQL reachable via DATABASE_URL;
//! run them with `cargo test -- --ignored`.

use geosync_service::db;
use geosync_service::models::SyncStatus;
use geosync_service::services::query::{self, FeatureQuery};
use geosync_service::services::sync;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

async fn connect() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a PostGIS database");
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();
    pool
}

/// One synced feature set under a fresh repo; names are unique per call so
/// runs never collide.
async fn seeded_feature_set(pool: &PgPool, owner: &str, repo_name: &str) -> (i64, String) {
    let github_id = (Uuid::new_v4().as_u128() as i64) & i64::MAX;
    let user_id = Uuid::new_v4();
    let full_name = format!("{}/{}", owner, repo_name);
    let (repo, created) = db::repos::upsert_from_listing(
        pool, user_id, github_id, repo_name, &full_name, false, "main",
    )
    .await
    .unwrap();
    assert!(created);

    let (feature_set, _) = db::feature_sets::get_or_create(pool, repo.id, "assets.geojson", 0)
        .await
        .unwrap();
    db::feature_sets::set_sync(pool, feature_set.id, true, SyncStatus::Synced)
        .await
        .unwrap();
    (feature_set.id, feature_set.name)
}

async fn insert_point(pool: &PgPool, feature_set_id: i64, lon: f64, lat: f64, rank: i64) -> i64 {
    let geometry = format!(r#"{{"type":"Point","coordinates":[{},{}]}}"#, lon, lat);
    db::features::insert(
        pool,
        feature_set_id,
        &geometry,
        &serde_json::json!({"rank": rank}),
    )
    .await
    .unwrap()
}

fn unique_owner(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

#[tokio::test]
#[ignore = "requires a PostGIS database via DATABASE_URL"]
async fn second_page_returns_ranks_thirty_to_sixty() {
    let pool = connect().await;
    let owner = unique_owner("pager");
    let (feature_set_id, set_name) = seeded_feature_set(&pool, &owner, "grid").await;

    let mut ids = Vec::new();
    for rank in 0..70 {
        ids.push(insert_point(&pool, feature_set_id, rank as f64 * 0.001, 0.0, rank).await);
    }

    let page = FeatureQuery {
        filter: None,
        limit: 30,
        offset: 30,
        callback: None,
    };
    let response = query::feature_set_query(&pool, &owner, "grid", &set_name, &page)
        .await
        .unwrap();

    assert_eq!(response.count, 30);
    assert_eq!(response.total_count, 70);
    let returned: Vec<i64> = response.features.iter().map(|f| f.id).collect();
    assert_eq!(returned, ids[30..60].to_vec());
    assert_eq!(response.features[0].properties["rank"], 30);
}

#[tokio::test]
#[ignore = "requires a PostGIS database via DATABASE_URL"]
async fn bbox_filter_narrows_twenty_six_features_to_seven() {
    let pool = connect().await;
    let owner = unique_owner("bbox");
    let (feature_set_id, set_name) = seeded_feature_set(&pool, &owner, "survey").await;

    // 7 inside the queried box, 19 well outside it
    for i in 0..7 {
        insert_point(&pool, feature_set_id, -80.88 + 0.01 * i as f64, 35.25, i).await;
    }
    for i in 0..19 {
        insert_point(&pool, feature_set_id, -79.0 - 0.01 * i as f64, 36.0, 7 + i).await;
    }

    let mut params = HashMap::new();
    params.insert(
        "bbox".to_string(),
        "-80.888,35.206,-80.799,35.270".to_string(),
    );
    let filtered = query::parse_query(&params, 500).unwrap();
    let response = query::feature_set_query(&pool, &owner, "survey", &set_name, &filtered)
        .await
        .unwrap();
    assert_eq!(response.count, 7);
    assert_eq!(response.total_count, 7);
    assert_eq!(response.features.len(), 7);

    let unfiltered = query::parse_query(&HashMap::new(), 500).unwrap();
    let response = query::feature_set_query(&pool, &owner, "survey", &set_name, &unfiltered)
        .await
        .unwrap();
    assert_eq!(response.total_count, 26);
}

#[tokio::test]
#[ignore = "requires a PostGIS database via DATABASE_URL"]
async fn disabling_sync_leaves_a_zero_feature_count() {
    let pool = connect().await;
    let owner = unique_owner("disable");
    let (feature_set_id, _) = seeded_feature_set(&pool, &owner, "drain").await;
    for rank in 0..5 {
        insert_point(&pool, feature_set_id, rank as f64, 0.0, rank).await;
    }
    assert_eq!(db::features::count(&pool, feature_set_id, None).await.unwrap(), 5);

    sync::delete_feature_set_features(&pool, feature_set_id)
        .await
        .unwrap();
    assert_eq!(db::features::count(&pool, feature_set_id, None).await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires a PostGIS database via DATABASE_URL"]
async fn removing_a_feature_set_takes_its_features_with_it() {
    let pool = connect().await;
    let owner = unique_owner("remove");
    let (feature_set_id, _) = seeded_feature_set(&pool, &owner, "gone").await;
    insert_point(&pool, feature_set_id, 1.0, 2.0, 0).await;

    sync::delete_feature_set(&pool, feature_set_id).await.unwrap();

    assert!(db::feature_sets::find_by_id(&pool, feature_set_id)
        .await
        .unwrap()
        .is_none());
    assert_eq!(db::features::count(&pool, feature_set_id, None).await.unwrap(), 0);
}

/// Query API - the public feature-collection endpoint
use crate::config::Config;
use crate::error::Result;
use crate::services::query;
use actix_web::{web, HttpResponse};
use sqlx::PgPool;
use std::collections::HashMap;

/// Query a feature set's features with optional spatial filter and
/// pagination.
///
/// GET /api/v1/{user_name}/{repo_name}/{feature_set_name}
pub async fn feature_set_query(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    path: web::Path<(String, String, String)>,
    params: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse> {
    let (user_name, repo_name, feature_set_name) = path.into_inner();
    let parsed = query::parse_query(&params, config.query.max_page_size)?;

    let collection =
        query::feature_set_query(&pool, &user_name, &repo_name, &feature_set_name, &parsed)
            .await?;

    let json = serde_json::to_string(&collection)?;
    let (body, content_type) = query::wrap_callback(json, parsed.callback.as_deref());
    Ok(HttpResponse::Ok().content_type(content_type).body(body))
}

/// The query resource accepts GET only
pub async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed().json(serde_json::json!({
        "status": "error",
        "message": "Method not allowed",
    }))
}

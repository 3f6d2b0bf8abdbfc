/// Repository listing for the signed-in user
///
/// The listing is a local mirror of the remote one: `refresh` enqueues a
/// background re-fetch that upserts current repositories and drops the ones
/// no longer visible to the user.
use crate::auth::UserId;
use crate::db;
use crate::error::Result;
use crate::jobs::{JobSender, SyncJob};
use actix_web::{web, HttpResponse};
use sqlx::PgPool;

/// GET /api/v1/repos
pub async fn user_repos(pool: web::Data<PgPool>, user: UserId) -> Result<HttpResponse> {
    let repos = db::repos::list_by_user(&pool, user.0).await?;
    Ok(HttpResponse::Ok().json(repos))
}

/// Re-fetch the remote repository listing in the background.
///
/// POST /api/v1/repos/refresh
pub async fn refresh_repos(jobs: web::Data<JobSender>, user: UserId) -> Result<HttpResponse> {
    jobs.enqueue(SyncJob::RefreshUserRepos { user_id: user.0 });
    Ok(HttpResponse::Accepted().json(serde_json::json!({"status": "ok"})))
}

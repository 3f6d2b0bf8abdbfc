/// Sync control - enable/disable tracking for repositories and feature sets
///
/// Enabling repository sync registers a push webhook with GitHub and
/// enqueues the enumeration job; disabling removes the hook and cascades
/// deletion. All endpoints are gated on ownership.
use crate::auth::UserId;
use crate::config::Config;
use crate::db;
use crate::error::{AppError, Result};
use crate::github::GithubClient;
use crate::jobs::{JobSender, SyncJob};
use crate::models::{FeatureSet, Repo, SyncStatus};
use actix_web::{web, HttpResponse};
use sqlx::PgPool;

/// User-facing message for the per-user synced-repo cap
fn sync_cap_message(cap: i64) -> String {
    format!(
        "While we ramp things up, users are limited to syncing {} repos. Cool?",
        cap
    )
}

async fn owned_repo(pool: &PgPool, repo_id: i64, user: UserId) -> Result<Repo> {
    let repo = db::repos::find_by_id(pool, repo_id)
        .await?
        .ok_or(AppError::NotFound)?;
    if repo.user_id != user.0 {
        return Err(AppError::Forbidden);
    }
    Ok(repo)
}

async fn owned_feature_set(
    pool: &PgPool,
    feature_set_id: i64,
    user: UserId,
) -> Result<(FeatureSet, Repo)> {
    let feature_set = db::feature_sets::find_by_id(pool, feature_set_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let repo = db::repos::find_by_id(pool, feature_set.repo_id)
        .await?
        .ok_or(AppError::NotFound)?;
    if repo.user_id != user.0 {
        return Err(AppError::Forbidden);
    }
    Ok((feature_set, repo))
}

async fn github_client_for(pool: &PgPool, config: &Config, user: UserId) -> Result<GithubClient> {
    let identity = db::identities::find_github_identity(pool, user.0)
        .await?
        .ok_or_else(|| {
            AppError::BadRequest("No GitHub identity is stored for this account".to_string())
        })?;
    Ok(GithubClient::new(
        config.github.clone(),
        identity.access_token,
    ))
}

/// Enable sync for a repository.
///
/// POST /api/v1/repos/{repo_id}/sync
pub async fn repo_sync_enable(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    jobs: web::Data<JobSender>,
    path: web::Path<i64>,
    user: UserId,
) -> Result<HttpResponse> {
    let repo = owned_repo(&pool, path.into_inner(), user).await?;

    let cap = config.sync.max_synced_repos;
    let synced = db::repos::count_synced_by_user(&pool, user.0).await?;
    if synced >= cap {
        return Err(AppError::BadRequest(sync_cap_message(cap)));
    }

    // Register a push webhook so we hear about changes to this repo
    let client = github_client_for(&pool, &config, user).await?;
    match client
        .create_push_hook(&repo.full_name, &config.hook_url(repo.id))
        .await
    {
        Ok(()) => tracing::info!(repo_id = repo.id, "hook created for repo"),
        Err(e) => tracing::warn!(repo_id = repo.id, error = %e, "hook not created for repo"),
    }

    db::repos::set_sync(&pool, repo.id, true, SyncStatus::Syncing).await?;
    jobs.enqueue(SyncJob::SyncRepo { repo_id: repo.id });

    Ok(HttpResponse::Created().json(serde_json::json!({"status": "ok"})))
}

/// Disable sync for a repository: remove the webhook and cascade deletion of
/// its feature sets.
///
/// DELETE /api/v1/repos/{repo_id}/sync
pub async fn repo_sync_disable(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    jobs: web::Data<JobSender>,
    path: web::Path<i64>,
    user: UserId,
) -> Result<HttpResponse> {
    let repo = owned_repo(&pool, path.into_inner(), user).await?;

    db::repos::set_sync(&pool, repo.id, false, SyncStatus::NotSynced).await?;

    match github_client_for(&pool, &config, user).await {
        Ok(client) => {
            match client
                .delete_push_hook(&repo.full_name, &config.hook_url(repo.id))
                .await
            {
                Ok(true) => tracing::info!(repo_id = repo.id, "hook deleted for repo"),
                Ok(false) => tracing::warn!(repo_id = repo.id, "no matching hook to delete"),
                Err(e) => tracing::warn!(repo_id = repo.id, error = %e, "hook not deleted for repo"),
            }
        }
        Err(e) => tracing::warn!(repo_id = repo.id, error = %e, "no client for hook removal"),
    }

    jobs.enqueue(SyncJob::DeleteRepoFeatureSets { repo_id: repo.id });

    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/v1/repos/{repo_id}/sync_status
pub async fn repo_sync_status(
    pool: web::Data<PgPool>,
    path: web::Path<i64>,
    user: UserId,
) -> Result<HttpResponse> {
    let repo = owned_repo(&pool, path.into_inner(), user).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"status": repo.sync_status.wire_status()})))
}

/// Enable sync for a feature set and enqueue its ingestion.
///
/// POST /api/v1/feature_sets/{feature_set_id}/sync
pub async fn feature_set_sync_enable(
    pool: web::Data<PgPool>,
    jobs: web::Data<JobSender>,
    path: web::Path<i64>,
    user: UserId,
) -> Result<HttpResponse> {
    let (feature_set, _repo) = owned_feature_set(&pool, path.into_inner(), user).await?;

    db::feature_sets::set_sync(&pool, feature_set.id, true, SyncStatus::Syncing).await?;
    jobs.enqueue(SyncJob::SyncFeatureSet {
        feature_set_id: feature_set.id,
    });

    Ok(HttpResponse::Created().json(serde_json::json!({"status": "ok"})))
}

/// Disable sync for a feature set and enqueue deletion of its features.
///
/// DELETE /api/v1/feature_sets/{feature_set_id}/sync
pub async fn feature_set_sync_disable(
    pool: web::Data<PgPool>,
    jobs: web::Data<JobSender>,
    path: web::Path<i64>,
    user: UserId,
) -> Result<HttpResponse> {
    let (feature_set, _repo) = owned_feature_set(&pool, path.into_inner(), user).await?;

    db::feature_sets::set_sync(&pool, feature_set.id, false, SyncStatus::NotSynced).await?;
    jobs.enqueue(SyncJob::DeleteFeatureSetFeatures {
        feature_set_id: feature_set.id,
    });

    Ok(HttpResponse::NoContent().finish())
}

/// Feature set metadata, including the spatial extent of its stored
/// features and the derived center point.
///
/// GET /api/v1/feature_sets/{feature_set_id}
pub async fn feature_set_detail(
    pool: web::Data<PgPool>,
    path: web::Path<i64>,
    user: UserId,
) -> Result<HttpResponse> {
    let (feature_set, repo) = owned_feature_set(&pool, path.into_inner(), user).await?;
    let bounds = db::features::extent(&pool, feature_set.id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "id": feature_set.id,
        "repo": repo.full_name,
        "path": feature_set.path,
        "name": feature_set.name,
        "size": feature_set.size,
        "status": feature_set.sync_status.wire_status(),
        "bounds": bounds,
        "center": bounds.map(|b| b.center()),
    })))
}

/// GET /api/v1/feature_sets/{feature_set_id}/sync_status
pub async fn feature_set_sync_status(
    pool: web::Data<PgPool>,
    path: web::Path<i64>,
    user: UserId,
) -> Result<HttpResponse> {
    let (feature_set, _repo) = owned_feature_set(&pool, path.into_inner(), user).await?;
    Ok(HttpResponse::Ok()
        .json(serde_json::json!({"status": feature_set.sync_status.wire_status()})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_message_matches_the_api_contract() {
        assert_eq!(
            sync_cap_message(3),
            "While we ramp things up, users are limited to syncing 3 repos. Cool?"
        );
    }
}

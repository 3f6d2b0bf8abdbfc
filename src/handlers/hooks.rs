/// Webhook intake
///
/// GitHub posts a push payload naming modified/removed/added paths per
/// commit. Modified paths re-trigger ingestion for their feature sets,
/// removed paths delete them, and any added path triggers a full repository
/// re-enumeration - the enumeration step already reconciles membership, so
/// that is cheaper than diffing individually.
use crate::db;
use crate::error::{AppError, Result};
use crate::jobs::{JobSender, SyncJob};
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use sqlx::PgPool;

#[derive(Debug, Default, Deserialize)]
pub struct PushPayload {
    #[serde(default)]
    pub commits: Vec<PushCommit>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PushCommit {
    #[serde(default)]
    pub modified: Vec<String>,
    #[serde(default)]
    pub removed: Vec<String>,
    #[serde(default)]
    pub added: Vec<String>,
}

/// What a push payload asks of the sync pipeline
#[derive(Debug, PartialEq, Eq)]
pub struct PushPlan {
    pub modified: Vec<String>,
    pub removed: Vec<String>,
    pub reenumerate: bool,
}

/// Reduce a push payload to deduplicated path unions. A path both removed
/// and re-added resolves through the re-enumeration.
pub fn plan_push(payload: &PushPayload) -> PushPlan {
    let mut modified = Vec::new();
    let mut removed = Vec::new();
    let mut reenumerate = false;
    for commit in &payload.commits {
        for path in &commit.modified {
            if !modified.contains(path) {
                modified.push(path.clone());
            }
        }
        for path in &commit.removed {
            if !removed.contains(path) {
                removed.push(path.clone());
            }
        }
        reenumerate |= !commit.added.is_empty();
    }
    PushPlan {
        modified,
        removed,
        reenumerate,
    }
}

/// Receive a push notification for a repository.
///
/// POST /api/v1/hooks/{repo_id}
pub async fn repo_hook(
    pool: web::Data<PgPool>,
    jobs: web::Data<JobSender>,
    path: web::Path<i64>,
    payload: web::Json<PushPayload>,
) -> Result<HttpResponse> {
    let repo_id = path.into_inner();
    let repo = db::repos::find_by_id(&pool, repo_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let plan = plan_push(&payload);
    tracing::info!(
        repo_id,
        modified = plan.modified.len(),
        removed = plan.removed.len(),
        reenumerate = plan.reenumerate,
        "push received"
    );

    if !plan.removed.is_empty() {
        let gone = db::feature_sets::find_by_repo_and_paths(&pool, repo.id, &plan.removed).await?;
        for feature_set in gone {
            tracing::info!(feature_set_id = feature_set.id, path = %feature_set.path, "feature set removed upstream");
            // As a job so it serializes against an in-flight ingestion
            jobs.enqueue(SyncJob::DeleteFeatureSet {
                feature_set_id: feature_set.id,
            });
        }
    }

    if !plan.modified.is_empty() {
        let changed =
            db::feature_sets::find_by_repo_and_paths(&pool, repo.id, &plan.modified).await?;
        for feature_set in changed {
            jobs.enqueue(SyncJob::SyncFeatureSet {
                feature_set_id: feature_set.id,
            });
        }
    }

    if plan.reenumerate {
        jobs.enqueue(SyncJob::SyncRepo { repo_id: repo.id });
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({"status": "ok"})))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(modified: &[&str], removed: &[&str], added: &[&str]) -> PushCommit {
        let to_vec = |paths: &[&str]| paths.iter().map(|p| p.to_string()).collect();
        PushCommit {
            modified: to_vec(modified),
            removed: to_vec(removed),
            added: to_vec(added),
        }
    }

    #[test]
    fn modified_and_added_paths_map_to_reingest_and_reenumerate() {
        let payload = PushPayload {
            commits: vec![commit(&["a.geojson"], &[], &["b.geojson"])],
        };
        let plan = plan_push(&payload);
        assert_eq!(plan.modified, vec!["a.geojson"]);
        assert!(plan.removed.is_empty());
        assert!(plan.reenumerate);
    }

    #[test]
    fn paths_are_deduplicated_across_commits() {
        let payload = PushPayload {
            commits: vec![
                commit(&["a.geojson", "notes.txt"], &["old.geojson"], &[]),
                commit(&["a.geojson"], &["old.geojson"], &[]),
            ],
        };
        let plan = plan_push(&payload);
        assert_eq!(plan.modified, vec!["a.geojson", "notes.txt"]);
        assert_eq!(plan.removed, vec!["old.geojson"]);
        assert!(!plan.reenumerate);
    }

    #[test]
    fn empty_payload_plans_nothing() {
        let plan = plan_push(&PushPayload::default());
        assert!(plan.modified.is_empty());
        assert!(plan.removed.is_empty());
        assert!(!plan.reenumerate);
    }
}

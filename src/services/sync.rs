/// Sync pipeline
///
/// The ingestion workflows behind background sync jobs: repository listing
/// refresh, repository tree enumeration with feature-set reconciliation, and
/// per-feature-set content ingestion. Each run performs a full destructive
/// replace of the entity's downstream rows; terminal sync states are recorded
/// here, not surfaced to the triggering request.
use crate::config::Config;
use crate::db;
use crate::error::Result;
use crate::geojson;
use crate::github::{GithubClient, GithubError};
use crate::jobs::{JobSender, SyncJob};
use crate::models::SyncStatus;
use sqlx::PgPool;
use uuid::Uuid;

/// Create or update the repositories for a user from the remote listing.
/// Repositories absent from the listing are deleted, cascading.
pub async fn refresh_user_repos(pool: &PgPool, config: &Config, user_id: Uuid) -> Result<()> {
    let Some(identity) = db::identities::find_github_identity(pool, user_id).await? else {
        return Err(GithubError::MissingIdentity.into());
    };
    let client = GithubClient::new(config.github.clone(), identity.access_token);

    let listing = client.list_repos().await?;
    let mut present = Vec::with_capacity(listing.len());
    for raw in listing {
        // Repositories without commits have no default branch. Seeya.
        let Some(default_branch) = raw.default_branch.as_deref() else {
            tracing::warn!(full_name = %raw.full_name, "repo has no default branch, skipping");
            continue;
        };
        let (repo, created) = db::repos::upsert_from_listing(
            pool,
            user_id,
            raw.id,
            &raw.name,
            &raw.full_name,
            raw.private,
            default_branch,
        )
        .await?;
        present.push(repo.github_id);
        if created {
            tracing::info!(repo_id = repo.id, full_name = %repo.full_name, "created repo");
        } else {
            tracing::debug!(repo_id = repo.id, full_name = %repo.full_name, "updated repo");
        }
    }

    let deleted = db::repos::delete_absent(pool, user_id, &present).await?;
    if deleted > 0 {
        tracing::info!(user_id = %user_id, deleted, "removed repos absent from listing");
    }
    Ok(())
}

/// Enumerate a repository's tree and reconcile its feature sets. Feature
/// sets that were already synced get their ingestion re-triggered; ones no
/// longer present are deleted. The repository's own state reflects only this
/// enumeration step, never the child outcomes.
pub async fn sync_repo_feature_sets(
    pool: &PgPool,
    config: &Config,
    jobs: &JobSender,
    repo_id: i64,
) -> Result<()> {
    let Some(repo) = db::repos::find_by_id(pool, repo_id).await? else {
        return Ok(());
    };
    if !repo.synced {
        tracing::debug!(repo_id, "repo no longer marked synced, skipping enumeration");
        return Ok(());
    }
    db::repos::set_status(pool, repo_id, SyncStatus::Syncing).await?;

    let Some(identity) = db::identities::find_github_identity(pool, repo.user_id).await? else {
        tracing::error!(repo_id, user_id = %repo.user_id, "no GitHub identity for repo owner");
        db::repos::set_status(pool, repo_id, SyncStatus::ErrorSyncing).await?;
        return Ok(());
    };
    let client = GithubClient::new(config.github.clone(), identity.access_token);

    let tree = match client.get_tree(&repo.full_name, &repo.default_branch).await {
        Ok(tree) => tree,
        Err(e) => {
            tracing::error!(repo_id, error = %e, "tree enumeration failed");
            db::repos::set_status(pool, repo_id, SyncStatus::ErrorSyncing).await?;
            return Ok(());
        }
    };

    let mut present = Vec::new();
    for entry in tree {
        if !entry.is_file() || !entry.path.ends_with(&config.sync.tracked_extension) {
            continue;
        }
        let size = entry.size.unwrap_or(0) as i64;
        let (feature_set, created) =
            db::feature_sets::get_or_create(pool, repo_id, &entry.path, size).await?;
        present.push(entry.path.clone());
        if created {
            tracing::info!(
                feature_set_id = feature_set.id,
                path = %entry.path,
                "discovered feature set"
            );
        } else if feature_set.synced {
            // Propagate upstream content changes to already-synced sets
            db::feature_sets::set_status(pool, feature_set.id, SyncStatus::Syncing).await?;
            jobs.enqueue(SyncJob::SyncFeatureSet {
                feature_set_id: feature_set.id,
            });
        }
    }

    let deleted = db::feature_sets::delete_absent(pool, repo_id, &present).await?;
    if deleted > 0 {
        tracing::info!(repo_id, deleted, "removed feature sets absent from tree");
    }

    tracing::info!(repo_id, "setting repo sync status as synced");
    db::repos::set_status(pool, repo_id, SyncStatus::Synced).await?;
    Ok(())
}

/// Ingest one feature set: full destructive replace of its features from the
/// fetched file content. Terminal error states are recorded and leave the
/// feature set featureless.
pub async fn sync_feature_set_features(
    pool: &PgPool,
    config: &Config,
    feature_set_id: i64,
) -> Result<()> {
    let Some(feature_set) = db::feature_sets::find_by_id(pool, feature_set_id).await? else {
        return Ok(());
    };
    // Resolves the race against a concurrent un-sync
    if !feature_set.synced {
        tracing::debug!(feature_set_id, "feature set not marked synced, skipping ingestion");
        return Ok(());
    }
    let Some(repo) = db::repos::find_by_id(pool, feature_set.repo_id).await? else {
        return Ok(());
    };

    tracing::info!(feature_set_id, "setting feature set sync status as syncing");
    db::feature_sets::set_status(pool, feature_set_id, SyncStatus::Syncing).await?;

    // First, kill the current features
    db::features::delete_by_feature_set(pool, feature_set_id).await?;

    let Some(identity) = db::identities::find_github_identity(pool, repo.user_id).await? else {
        tracing::error!(feature_set_id, user_id = %repo.user_id, "no GitHub identity for owner");
        db::feature_sets::set_status(pool, feature_set_id, SyncStatus::ErrorSyncing).await?;
        return Ok(());
    };
    let client = GithubClient::new(config.github.clone(), identity.access_token);

    let content = match client
        .fetch_file(
            &repo.full_name,
            &repo.default_branch,
            &feature_set.path,
            feature_set.size.max(0) as u64,
        )
        .await
    {
        Ok(bytes) => bytes,
        Err(GithubError::ContentTooLarge { limit }) => {
            tracing::error!(feature_set_id, limit, "content exceeded ingestion budget");
            db::feature_sets::set_status(pool, feature_set_id, SyncStatus::MemoryError).await?;
            return Ok(());
        }
        Err(e) => {
            tracing::error!(feature_set_id, error = %e, "content fetch failed");
            db::feature_sets::set_status(pool, feature_set_id, SyncStatus::ErrorSyncing).await?;
            return Ok(());
        }
    };

    let features = match geojson::parse_feature_collection(&content) {
        Ok(features) => features,
        Err(e) => {
            tracing::error!(feature_set_id, error = %e, "content failed GeoJSON validation");
            db::feature_sets::set_status(pool, feature_set_id, SyncStatus::InvalidGeojsonError)
                .await?;
            return Ok(());
        }
    };

    let mut stored = 0u64;
    let mut skipped = 0u64;
    for parsed in features {
        let Some(mut geometry) = parsed.geometry else {
            tracing::debug!(feature_set_id, "feature has null geometry, nothing to store");
            continue;
        };
        geometry.strip_elevation();
        // One bad feature must not fail the batch
        if let Err(reason) = geometry.construct_check() {
            tracing::warn!(feature_set_id, %reason, "could not construct geometry, skipping feature");
            skipped += 1;
            continue;
        }
        let geometry_geojson = serde_json::to_string(&geometry)?;
        db::features::insert(pool, feature_set_id, &geometry_geojson, &parsed.properties).await?;
        stored += 1;
    }
    if skipped > 0 {
        tracing::warn!(feature_set_id, stored, skipped, "ingestion skipped features");
    }

    tracing::info!(feature_set_id, stored, "setting feature set sync status as synced");
    db::feature_sets::set_status(pool, feature_set_id, SyncStatus::Synced).await?;
    Ok(())
}

/// Remove a feature set entirely, features first. Runs as a job so it
/// serializes against any in-flight ingestion of the same feature set.
pub async fn delete_feature_set(pool: &PgPool, feature_set_id: i64) -> Result<()> {
    let deleted = db::features::delete_by_feature_set(pool, feature_set_id).await?;
    db::feature_sets::delete(pool, feature_set_id).await?;
    tracing::info!(feature_set_id, deleted, "deleted feature set");
    Ok(())
}

/// Delete all features for a feature set
pub async fn delete_feature_set_features(pool: &PgPool, feature_set_id: i64) -> Result<()> {
    let deleted = db::features::delete_by_feature_set(pool, feature_set_id).await?;
    tracing::info!(feature_set_id, deleted, "deleted features for feature set");
    Ok(())
}

/// Delete all feature sets for a repository, cascading to their features
pub async fn delete_repo_feature_sets(pool: &PgPool, repo_id: i64) -> Result<()> {
    let deleted = db::feature_sets::delete_by_repo(pool, repo_id).await?;
    tracing::info!(repo_id, deleted, "deleted feature sets for repo");
    Ok(())
}

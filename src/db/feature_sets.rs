use crate::models::{FeatureSet, SyncStatus};
use sqlx::PgPool;

const FS_COLUMNS: &str =
    "id, repo_id, path, name, size, synced, sync_status, created_at, updated_at";

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<FeatureSet>, sqlx::Error> {
    sqlx::query_as::<_, FeatureSet>(&format!(
        "SELECT {FS_COLUMNS} FROM feature_sets WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Resolve a feature set by its user-facing name within a repository
pub async fn find_by_repo_and_name(
    pool: &PgPool,
    repo_id: i64,
    name: &str,
) -> Result<Option<FeatureSet>, sqlx::Error> {
    sqlx::query_as::<_, FeatureSet>(&format!(
        "SELECT {FS_COLUMNS} FROM feature_sets WHERE repo_id = $1 AND name = $2"
    ))
    .bind(repo_id)
    .bind(name)
    .fetch_optional(pool)
    .await
}

/// Feature sets matching any of the given repo-relative paths
pub async fn find_by_repo_and_paths(
    pool: &PgPool,
    repo_id: i64,
    paths: &[String],
) -> Result<Vec<FeatureSet>, sqlx::Error> {
    sqlx::query_as::<_, FeatureSet>(&format!(
        "SELECT {FS_COLUMNS} FROM feature_sets WHERE repo_id = $1 AND path = ANY($2)"
    ))
    .bind(repo_id)
    .bind(paths)
    .fetch_all(pool)
    .await
}

/// Get or create a feature set keyed by (repo, path). A new row defaults its
/// name and size from the tree listing; an existing row only refreshes its
/// declared size. Returns the row and whether it was created.
pub async fn get_or_create(
    pool: &PgPool,
    repo_id: i64,
    path: &str,
    size: i64,
) -> Result<(FeatureSet, bool), sqlx::Error> {
    let existing = sqlx::query_as::<_, FeatureSet>(&format!(
        "SELECT {FS_COLUMNS} FROM feature_sets WHERE repo_id = $1 AND path = $2"
    ))
    .bind(repo_id)
    .bind(path)
    .fetch_optional(pool)
    .await?;

    if existing.is_some() {
        let feature_set = sqlx::query_as::<_, FeatureSet>(&format!(
            r#"
            UPDATE feature_sets SET size = $3, updated_at = NOW()
            WHERE repo_id = $1 AND path = $2
            RETURNING {FS_COLUMNS}
            "#
        ))
        .bind(repo_id)
        .bind(path)
        .bind(size)
        .fetch_one(pool)
        .await?;
        Ok((feature_set, false))
    } else {
        let feature_set = sqlx::query_as::<_, FeatureSet>(&format!(
            r#"
            INSERT INTO feature_sets (repo_id, path, name, size)
            VALUES ($1, $2, $2, $3)
            RETURNING {FS_COLUMNS}
            "#
        ))
        .bind(repo_id)
        .bind(path)
        .bind(size)
        .fetch_one(pool)
        .await?;
        Ok((feature_set, true))
    }
}

/// Delete feature sets absent from a fresh enumeration. Features cascade.
pub async fn delete_absent(
    pool: &PgPool,
    repo_id: i64,
    present_paths: &[String],
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM feature_sets WHERE repo_id = $1 AND NOT (path = ANY($2))",
    )
    .bind(repo_id)
    .bind(present_paths)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn delete(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM feature_sets WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Explicit cascading delete of a repository's feature sets, independent of
/// storage-engine cascade behavior
pub async fn delete_by_repo(pool: &PgPool, repo_id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM feature_sets WHERE repo_id = $1")
        .bind(repo_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn set_sync(
    pool: &PgPool,
    id: i64,
    synced: bool,
    status: SyncStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE feature_sets SET synced = $2, sync_status = $3, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(synced)
    .bind(status)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_status(pool: &PgPool, id: i64, status: SyncStatus) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE feature_sets SET sync_status = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(pool)
        .await?;
    Ok(())
}

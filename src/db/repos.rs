use crate::models::{Repo, SyncStatus};
use sqlx::PgPool;
use uuid::Uuid;

const REPO_COLUMNS: &str = "id, github_id, user_id, name, full_name, private, default_branch, \
                            synced, sync_status, created_at, updated_at";

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Repo>, sqlx::Error> {
    sqlx::query_as::<_, Repo>(&format!(
        "SELECT {REPO_COLUMNS} FROM repos WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn find_by_full_name(
    pool: &PgPool,
    full_name: &str,
) -> Result<Option<Repo>, sqlx::Error> {
    sqlx::query_as::<_, Repo>(&format!(
        "SELECT {REPO_COLUMNS} FROM repos WHERE full_name = $1"
    ))
    .bind(full_name)
    .fetch_optional(pool)
    .await
}

/// The user's mirrored repository listing, stable by name
pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Repo>, sqlx::Error> {
    sqlx::query_as::<_, Repo>(&format!(
        "SELECT {REPO_COLUMNS} FROM repos WHERE user_id = $1 ORDER BY full_name"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Count the user's simultaneously synced repositories (per-user cap)
pub async fn count_synced_by_user(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM repos WHERE user_id = $1 AND synced = TRUE",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
}

/// Create or update a repository from one listing entry, keyed by its remote
/// numeric id. Returns the row and whether it was created.
pub async fn upsert_from_listing(
    pool: &PgPool,
    user_id: Uuid,
    github_id: i64,
    name: &str,
    full_name: &str,
    private: bool,
    default_branch: &str,
) -> Result<(Repo, bool), sqlx::Error> {
    let existing = sqlx::query_as::<_, Repo>(&format!(
        "SELECT {REPO_COLUMNS} FROM repos WHERE github_id = $1"
    ))
    .bind(github_id)
    .fetch_optional(pool)
    .await?;

    if existing.is_some() {
        let repo = sqlx::query_as::<_, Repo>(&format!(
            r#"
            UPDATE repos
            SET user_id = $2, name = $3, full_name = $4, private = $5,
                default_branch = $6, updated_at = NOW()
            WHERE github_id = $1
            RETURNING {REPO_COLUMNS}
            "#
        ))
        .bind(github_id)
        .bind(user_id)
        .bind(name)
        .bind(full_name)
        .bind(private)
        .bind(default_branch)
        .fetch_one(pool)
        .await?;
        Ok((repo, false))
    } else {
        let repo = sqlx::query_as::<_, Repo>(&format!(
            r#"
            INSERT INTO repos (github_id, user_id, name, full_name, private, default_branch)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {REPO_COLUMNS}
            "#
        ))
        .bind(github_id)
        .bind(user_id)
        .bind(name)
        .bind(full_name)
        .bind(private)
        .bind(default_branch)
        .fetch_one(pool)
        .await?;
        Ok((repo, true))
    }
}

/// Delete the user's repositories that are no longer present in the remote
/// listing. Feature sets and features cascade.
pub async fn delete_absent(
    pool: &PgPool,
    user_id: Uuid,
    present_github_ids: &[i64],
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM repos WHERE user_id = $1 AND NOT (github_id = ANY($2))",
    )
    .bind(user_id)
    .bind(present_github_ids)
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
        "UPDATE repos SET synced = $2, sync_status = $3, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(synced)
    .bind(status)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_status(pool: &PgPool, id: i64, status: SyncStatus) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE repos SET sync_status = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(pool)
        .await?;
    Ok(())
}

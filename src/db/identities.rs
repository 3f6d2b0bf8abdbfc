use crate::models::UserIdentity;
use sqlx::PgPool;
use uuid::Uuid;

/// Find the stored GitHub identity for a user. Absence is a fatal
/// precondition for any call made on the user's behalf.
pub async fn find_github_identity(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<UserIdentity>, sqlx::Error> {
    sqlx::query_as::<_, UserIdentity>(
        r#"
        SELECT user_id, provider, access_token, login
        FROM user_identities
        WHERE user_id = $1 AND provider = 'github'
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

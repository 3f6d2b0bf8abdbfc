/// Database access layer
///
/// Repository functions are free async fns over `&PgPool`. Spatial predicate
/// evaluation and indexing are delegated to PostGIS; everything the service
/// asks of the store goes through this module.
pub mod feature_sets;
pub mod features;
pub mod identities;
pub mod repos;

use sqlx::PgPool;

/// Apply pending schema migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Geosync Service Library
///
/// Exposes GitHub repositories containing GeoJSON files as queryable spatial
/// datasets. Repository trees are enumerated and ingested by background sync
/// jobs; persisted features are served through a filtered, paginated HTTP API.
///
/// # Modules
///
/// - `handlers`: HTTP request handlers (query API, webhook intake, sync control)
/// - `models`: Repositories, feature sets, features and sync state
/// - `services`: Sync pipeline and spatial query engine
/// - `db`: Database access layer (PostgreSQL + PostGIS)
/// - `geojson`: FeatureCollection validation and typed geometries
/// - `github`: GitHub API client (contents, trees, blobs, hooks)
/// - `jobs`: Background sync job queue and worker
/// - `error`: Error types and handling
/// - `config`: Configuration management
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod geojson;
pub mod github;
pub mod handlers;
pub mod jobs;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};

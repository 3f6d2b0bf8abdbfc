/// Configuration management for Geosync Service
///
/// All configuration is loaded from environment variables with development
/// defaults. Components receive their configuration explicitly; there is no
/// global mutable state.
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// GitHub API configuration
    pub github: GithubConfig,
    /// Sync pipeline configuration
    pub sync: SyncConfig,
    /// Query API configuration
    pub query: QueryConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
    /// Publicly reachable base URL, used when registering webhooks
    pub public_base_url: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL (PostgreSQL with PostGIS)
    pub url: String,
    /// Max connections in pool
    pub max_connections: u32,
}

/// GitHub API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// API base URL, overridable for tests
    pub api_base_url: String,
    /// Files at or above this size go through the blob indirection instead of
    /// the contents endpoint, which is size-limited upstream
    pub contents_size_limit: u64,
    /// Budget for decoded file content; exceeding it is a terminal
    /// resource-exhaustion failure for the triggering sync
    pub max_content_bytes: u64,
    /// Per-request timeout in seconds; expiry surfaces as a remote error
    pub request_timeout_secs: u64,
}

/// Sync pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Per-user cap on simultaneously synced repositories
    pub max_synced_repos: i64,
    /// Capacity of the background job channel
    pub job_queue_capacity: usize,
    /// File extension that marks a tree entry as a feature set
    pub tracked_extension: String,
}

/// Query API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Page cap; `limit` defaults to this and larger requests clamp to it
    pub max_page_size: i64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        Ok(Config {
            app: AppConfig {
                env: app_env.clone(),
                host: std::env::var("GEOSYNC_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("GEOSYNC_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8080),
                public_base_url: {
                    let url = match std::env::var("GEOSYNC_PUBLIC_BASE_URL") {
                        Ok(value) => value,
                        Err(_) if app_env.eq_ignore_ascii_case("production") => {
                            return Err(
                                "GEOSYNC_PUBLIC_BASE_URL must be set in production".to_string()
                            )
                        }
                        Err(_) => "http://localhost:8080".to_string(),
                    };
                    url.trim_end_matches('/').to_string()
                },
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/geosync".to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|c| c.parse().ok())
                    .unwrap_or(10),
            },
            github: GithubConfig {
                api_base_url: std::env::var("GITHUB_API_BASE_URL")
                    .unwrap_or_else(|_| "https://api.github.com".to_string()),
                contents_size_limit: std::env::var("GITHUB_CONTENTS_SIZE_LIMIT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1_048_576),
                max_content_bytes: std::env::var("GITHUB_MAX_CONTENT_BYTES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(64 * 1_048_576),
                request_timeout_secs: std::env::var("GITHUB_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            },
            sync: SyncConfig {
                max_synced_repos: std::env::var("SYNC_MAX_REPOS_PER_USER")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3),
                job_queue_capacity: std::env::var("SYNC_JOB_QUEUE_CAPACITY")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(256),
                tracked_extension: std::env::var("SYNC_TRACKED_EXTENSION")
                    .unwrap_or_else(|_| ".geojson".to_string()),
            },
            query: QueryConfig {
                max_page_size: std::env::var("QUERY_MAX_PAGE_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(500),
            },
        })
    }

    /// Webhook endpoint URL registered with GitHub for a repository
    pub fn hook_url(&self, repo_id: i64) -> String {
        format!("{}/api/v1/hooks/{}", self.app.public_base_url, repo_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_url_points_at_webhook_endpoint() {
        let mut config = Config::from_env().unwrap();
        config.app.public_base_url = "https://geosync.example".to_string();
        assert_eq!(
            config.hook_url(42),
            "https://geosync.example/api/v1/hooks/42"
        );
    }
}

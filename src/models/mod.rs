/// Data models for geosync-service
///
/// - `Repo`: a tracked GitHub repository
/// - `FeatureSet`: one GeoJSON file within a repository, exposed as a dataset
/// - `Feature`: one geometry + properties record belonging to a feature set
/// - `SyncStatus`: the shared sync state machine value
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sync state for repositories and feature sets.
///
/// `NotSynced` is the initial state; `Synced` is terminal success. The three
/// error states are terminal and distinguish generic failures from resource
/// exhaustion and content validation failures. No automatic retries: recovery
/// requires a new user- or webhook-initiated sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "sync_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    NotSynced,
    Syncing,
    Synced,
    ErrorSyncing,
    MemoryError,
    InvalidGeojsonError,
}

impl SyncStatus {
    /// Wire representation for the sync_status endpoint. The error states
    /// collapse to a single value; the distinction stays in the database.
    pub fn wire_status(&self) -> &'static str {
        match self {
            SyncStatus::NotSynced => "not_synced",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Synced => "synced",
            SyncStatus::ErrorSyncing
            | SyncStatus::MemoryError
            | SyncStatus::InvalidGeojsonError => "error",
        }
    }
}

/// A GitHub repository tracked for a user. Created on first listing fetch,
/// updated on every re-listing, deleted when absent from the user's listing.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Repo {
    pub id: i64,
    pub github_id: i64,
    pub user_id: Uuid,
    pub name: String,
    pub full_name: String,
    pub private: bool,
    pub default_branch: String,
    pub synced: bool,
    pub sync_status: SyncStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One GeoJSON file within a repository. `path` is the repo-relative file
/// path; `name` is user-editable and independent of it. `size` is the byte
/// size declared by the remote listing.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FeatureSet {
    pub id: i64,
    pub repo_id: i64,
    pub path: String,
    pub name: String,
    pub size: i64,
    pub synced: bool,
    pub sync_status: SyncStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One feature row read back from the store. The geometry comes out of
/// PostGIS as GeoJSON; properties round-trip through JSONB.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Feature {
    pub id: i64,
    pub feature_set_id: i64,
    pub geometry: serde_json::Value,
    pub properties: serde_json::Value,
}

/// Bounding box of a feature set's features, `(xmin, ymin, xmax, ymax)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Bounds {
    /// Approximate `(lng, lat)` center of the box
    pub fn center(&self) -> (f64, f64) {
        ((self.xmin + self.xmax) / 2.0, (self.ymin + self.ymax) / 2.0)
    }
}

/// Stored external-identity record holding the per-user GitHub credential.
/// Populated by the out-of-scope auth layer at sign-in.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserIdentity {
    pub user_id: Uuid,
    pub provider: String,
    pub access_token: String,
    pub login: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_states_collapse_on_the_wire() {
        assert_eq!(SyncStatus::NotSynced.wire_status(), "not_synced");
        assert_eq!(SyncStatus::Syncing.wire_status(), "syncing");
        assert_eq!(SyncStatus::Synced.wire_status(), "synced");
        assert_eq!(SyncStatus::ErrorSyncing.wire_status(), "error");
        assert_eq!(SyncStatus::MemoryError.wire_status(), "error");
        assert_eq!(SyncStatus::InvalidGeojsonError.wire_status(), "error");
    }

    #[test]
    fn bounds_center_is_box_midpoint() {
        let bounds = Bounds {
            xmin: -80.0,
            ymin: 35.0,
            xmax: -78.0,
            ymax: 37.0,
        };
        assert_eq!(bounds.center(), (-79.0, 36.0));
    }
}

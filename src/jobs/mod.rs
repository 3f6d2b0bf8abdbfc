/// Background sync jobs
///
/// Ingestion work runs outside the request/response cycle: handlers and the
/// webhook enqueue jobs fire-and-forget onto an MPSC channel and a worker
/// loop processes them. Jobs touching the same entity serialize on a
/// per-entity lock, so overlapping triggers (a webhook landing during a
/// manual sync) cannot interleave their delete-then-insert sequences.
use crate::config::Config;
use crate::db;
use crate::models::SyncStatus;
use crate::services::sync;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard, Semaphore};
use uuid::Uuid;

/// One unit of background sync work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncJob {
    RefreshUserRepos { user_id: Uuid },
    SyncRepo { repo_id: i64 },
    SyncFeatureSet { feature_set_id: i64 },
    DeleteFeatureSet { feature_set_id: i64 },
    DeleteFeatureSetFeatures { feature_set_id: i64 },
    DeleteRepoFeatureSets { repo_id: i64 },
}

/// Key the per-entity serialization lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKey {
    User(Uuid),
    Repo(i64),
    FeatureSet(i64),
}

impl SyncJob {
    pub fn lock_key(&self) -> LockKey {
        match self {
            SyncJob::RefreshUserRepos { user_id } => LockKey::User(*user_id),
            SyncJob::SyncRepo { repo_id } | SyncJob::DeleteRepoFeatureSets { repo_id } => {
                LockKey::Repo(*repo_id)
            }
            SyncJob::SyncFeatureSet { feature_set_id }
            | SyncJob::DeleteFeatureSet { feature_set_id }
            | SyncJob::DeleteFeatureSetFeatures { feature_set_id } => {
                LockKey::FeatureSet(*feature_set_id)
            }
        }
    }
}

/// Clonable job submission handle. Enqueueing is fire-and-forget from the
/// caller's perspective; a full or closed channel drops the job with a log
/// line and never blocks the sender. Workers enqueue child jobs while
/// holding a concurrency permit, so waiting for channel capacity here could
/// starve the receiver loop of permits.
#[derive(Clone)]
pub struct JobSender {
    tx: mpsc::Sender<SyncJob>,
}

impl JobSender {
    pub fn enqueue(&self, job: SyncJob) {
        match self.tx.try_send(job) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(job)) => {
                tracing::error!(?job, "sync job queue full, dropping job");
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                tracing::error!(?job, "sync job queue closed, dropping job");
            }
        }
    }
}

pub type JobReceiver = mpsc::Receiver<SyncJob>;

/// Create the sync job queue with the given channel capacity
pub fn create_job_queue(capacity: usize) -> (JobSender, JobReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (JobSender { tx }, rx)
}

/// Lease map serializing jobs per entity. A job finding the lease held waits
/// for the in-flight run rather than coalescing with it, so the newest
/// trigger's content always lands last.
#[derive(Clone, Default)]
pub struct EntityLocks {
    inner: Arc<Mutex<HashMap<LockKey, Arc<Mutex<()>>>>>,
}

impl EntityLocks {
    pub async fn acquire(&self, key: LockKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            // Entries nobody holds or waits on are dead weight
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            map.entry(key).or_default().clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn entry_count(&self) -> usize {
        self.inner.lock().await.len()
    }
}

/// Spawn the sync worker loop. Jobs run with bounded concurrency; jobs on
/// the same entity serialize on the lock map.
pub fn spawn_sync_worker(
    pool: PgPool,
    config: Arc<Config>,
    jobs: JobSender,
    mut receiver: JobReceiver,
    concurrency: usize,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(concurrency, "sync worker started");
        let locks = EntityLocks::default();
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

        while let Some(job) = receiver.recv().await {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let pool = pool.clone();
            let config = config.clone();
            let jobs = jobs.clone();
            let locks = locks.clone();
            tokio::spawn(async move {
                let _permit = permit;
                let _lease = locks.acquire(job.lock_key()).await;
                if let Err(e) = dispatch(&pool, &config, &jobs, &job).await {
                    tracing::error!(?job, error = %e, "sync job failed");
                    mark_failed(&pool, &job).await;
                }
            });
        }

        tracing::info!("sync worker stopped (channel closed)");
    })
}

async fn dispatch(
    pool: &PgPool,
    config: &Config,
    jobs: &JobSender,
    job: &SyncJob,
) -> crate::error::Result<()> {
    match job {
        SyncJob::RefreshUserRepos { user_id } => {
            sync::refresh_user_repos(pool, config, *user_id).await
        }
        SyncJob::SyncRepo { repo_id } => {
            sync::sync_repo_feature_sets(pool, config, jobs, *repo_id).await
        }
        SyncJob::SyncFeatureSet { feature_set_id } => {
            sync::sync_feature_set_features(pool, config, *feature_set_id).await
        }
        SyncJob::DeleteFeatureSet { feature_set_id } => {
            sync::delete_feature_set(pool, *feature_set_id).await
        }
        SyncJob::DeleteFeatureSetFeatures { feature_set_id } => {
            sync::delete_feature_set_features(pool, *feature_set_id).await
        }
        SyncJob::DeleteRepoFeatureSets { repo_id } => {
            sync::delete_repo_feature_sets(pool, *repo_id).await
        }
    }
}

/// Record the generic terminal error state for jobs that failed outside
/// their own state handling (database errors, mostly)
async fn mark_failed(pool: &PgPool, job: &SyncJob) {
    let result = match job {
        SyncJob::SyncRepo { repo_id } => {
            db::repos::set_status(pool, *repo_id, SyncStatus::ErrorSyncing).await
        }
        SyncJob::SyncFeatureSet { feature_set_id } => {
            db::feature_sets::set_status(pool, *feature_set_id, SyncStatus::ErrorSyncing).await
        }
        _ => Ok(()),
    };
    if let Err(e) = result {
        tracing::error!(?job, error = %e, "failed to record error sync status");
    }
}

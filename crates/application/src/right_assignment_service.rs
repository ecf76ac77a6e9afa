use std::sync::Arc;

use chrono::{DateTime, Utc};
use refdata_core::{AppError, AppResult};
use refdata_domain::{RightAssignment, User, UserId};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::hierarchy_cache::{HierarchyCacheStats, HierarchyExpansionCache};
use crate::right_assignment_ports::{
    RebuildStaging, RightAssignmentRepository, RoleAssignmentRepository,
};
use crate::worker_pool::WorkerPool;

mod config;
mod materialize;

pub use config::RightAssignmentConfig;

/// Summary of one completed rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildReport {
    /// Rebuild run identifier.
    pub run_id: String,
    /// Start timestamp.
    pub started_at: DateTime<Utc>,
    /// Completion timestamp.
    pub finished_at: DateTime<Utc>,
    /// Users processed.
    pub users: u64,
    /// Role assignments flattened.
    pub role_assignments: u64,
    /// Rows written to the live table.
    pub rows_written: u64,
    /// Bulk inserts issued.
    pub batches: u64,
    /// Hierarchy expansion cache counters.
    pub cache: HierarchyCacheStats,
    /// Highest number of concurrent workers.
    pub peak_workers: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct PartitionProgress {
    users: u64,
    role_assignments: u64,
    rows_written: u64,
    batches: u64,
}

impl PartitionProgress {
    fn merge(self, other: Self) -> Self {
        Self {
            users: self.users + other.users,
            role_assignments: self.role_assignments + other.role_assignments,
            rows_written: self.rows_written + other.rows_written,
            batches: self.batches + other.batches,
        }
    }
}

/// Regenerates the flattened right assignment table from role assignments.
#[derive(Clone)]
pub struct RightAssignmentService {
    role_assignment_repository: Arc<dyn RoleAssignmentRepository>,
    right_assignment_repository: Arc<dyn RightAssignmentRepository>,
    config: RightAssignmentConfig,
    rebuild_lock: Arc<Mutex<()>>,
}

impl RightAssignmentService {
    /// Creates a right assignment service.
    #[must_use]
    pub fn new(
        role_assignment_repository: Arc<dyn RoleAssignmentRepository>,
        right_assignment_repository: Arc<dyn RightAssignmentRepository>,
        config: RightAssignmentConfig,
    ) -> Self {
        Self {
            role_assignment_repository,
            right_assignment_repository,
            config,
            rebuild_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Returns the rebuild configuration.
    #[must_use]
    pub fn config(&self) -> &RightAssignmentConfig {
        &self.config
    }

    /// Replaces every right assignment row with rows derived from current
    /// role assignments.
    ///
    /// Readers keep seeing the previous rows until the rebuild commits. A
    /// failed rebuild leaves them untouched. Only one rebuild runs at a time
    /// per service; a concurrent request fails with [`AppError::Conflict`].
    pub async fn rebuild_right_assignments(&self) -> AppResult<RebuildReport> {
        let Ok(_guard) = self.rebuild_lock.try_lock() else {
            return Err(AppError::Conflict(
                "a right assignment rebuild is already running".to_owned(),
            ));
        };
        let started_at = Utc::now();

        let users = self
            .role_assignment_repository
            .list_users_with_role_assignments()
            .await?;
        let hierarchy = self
            .role_assignment_repository
            .load_supervision_hierarchy()
            .await?;
        let cache = Arc::new(HierarchyExpansionCache::new(
            Arc::new(hierarchy),
            self.config.program_scope(),
        ));

        let staging = self.right_assignment_repository.begin_rebuild().await?;
        info!(
            run_id = %staging.run_id,
            users = users.len(),
            program_scope = %self.config.program_scope().as_str(),
            "right assignment rebuild started"
        );

        let written = match self
            .write_staging(&staging, users, Arc::clone(&cache))
            .await
        {
            Ok(written) => self
                .right_assignment_repository
                .commit_rebuild(staging.clone())
                .await
                .map(|()| written),
            Err(error) => Err(error),
        };

        let (progress, peak_workers) = match written {
            Ok(written) => written,
            Err(error) => {
                warn!(
                    run_id = %staging.run_id,
                    error = %error,
                    "right assignment rebuild failed"
                );
                let run_id = staging.run_id.clone();
                if let Err(abort_error) = self
                    .right_assignment_repository
                    .abort_rebuild(staging)
                    .await
                {
                    warn!(
                        run_id = %run_id,
                        error = %abort_error,
                        "failed to discard right assignment staging rows"
                    );
                }
                return Err(error);
            }
        };

        let report = RebuildReport {
            run_id: staging.run_id,
            started_at,
            finished_at: Utc::now(),
            users: progress.users,
            role_assignments: progress.role_assignments,
            rows_written: progress.rows_written,
            batches: progress.batches,
            cache: cache.stats(),
            peak_workers,
        };
        info!(
            run_id = %report.run_id,
            users = report.users,
            role_assignments = report.role_assignments,
            rows_written = report.rows_written,
            batches = report.batches,
            cache_hits = report.cache.hits,
            cache_misses = report.cache.misses,
            hierarchy_gaps = report.cache.gaps,
            elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
            "right assignment rebuild completed"
        );

        Ok(report)
    }

    /// Lists the live right assignment rows of one user.
    pub async fn list_right_assignments(&self, user_id: UserId) -> AppResult<Vec<RightAssignment>> {
        self.right_assignment_repository
            .list_right_assignments_for_user(user_id)
            .await
    }

    async fn write_staging(
        &self,
        staging: &RebuildStaging,
        users: Vec<User>,
        cache: Arc<HierarchyExpansionCache>,
    ) -> AppResult<(PartitionProgress, usize)> {
        let partitions = partition_users(users, self.config.partition_size());
        let repository = Arc::clone(&self.right_assignment_repository);
        let staging = Arc::new(staging.clone());
        let batch_size = self.config.batch_size();

        let outcome = WorkerPool::new(self.config.worker_pool().clone())
            .execute(partitions, move |partition: Vec<User>| {
                let repository = Arc::clone(&repository);
                let staging = Arc::clone(&staging);
                let cache = Arc::clone(&cache);
                async move {
                    write_partition(
                        repository.as_ref(),
                        staging.as_ref(),
                        cache.as_ref(),
                        &partition,
                        batch_size,
                    )
                    .await
                }
            })
            .await?;

        let progress = outcome
            .outputs
            .into_iter()
            .fold(PartitionProgress::default(), PartitionProgress::merge);

        Ok((progress, outcome.peak_workers))
    }
}

/// Splits users into owned chunks so each user lands in exactly one job.
fn partition_users(users: Vec<User>, partition_size: usize) -> Vec<Vec<User>> {
    let mut partitions = Vec::with_capacity(users.len().div_ceil(partition_size));
    let mut users = users.into_iter().peekable();

    while users.peek().is_some() {
        partitions.push(users.by_ref().take(partition_size).collect());
    }

    partitions
}

async fn write_partition(
    repository: &dyn RightAssignmentRepository,
    staging: &RebuildStaging,
    cache: &HierarchyExpansionCache,
    partition: &[User],
    batch_size: usize,
) -> AppResult<PartitionProgress> {
    let mut progress = PartitionProgress::default();
    let mut rows = Vec::new();

    for user in partition {
        progress.users += 1;
        progress.role_assignments +=
            u64::try_from(user.role_assignment_count()).unwrap_or(u64::MAX);
        rows.extend(materialize::materialize_user(user, cache));
    }

    for batch in rows.chunks(batch_size) {
        progress.rows_written += repository.insert_batch(staging, batch).await?;
        progress.batches += 1;
    }

    Ok(progress)
}

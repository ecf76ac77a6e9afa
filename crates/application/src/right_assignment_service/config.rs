use refdata_core::{AppError, AppResult};
use refdata_domain::ProgramScope;

use crate::worker_pool::WorkerPoolConfig;

/// Tuning for right assignment rebuilds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RightAssignmentConfig {
    batch_size: usize,
    partition_size: usize,
    program_scope: ProgramScope,
    worker_pool: WorkerPoolConfig,
}

impl RightAssignmentConfig {
    /// Creates a validated rebuild configuration.
    pub fn new(
        batch_size: usize,
        partition_size: usize,
        program_scope: ProgramScope,
        worker_pool: WorkerPoolConfig,
    ) -> AppResult<Self> {
        if batch_size == 0 {
            return Err(AppError::Validation(
                "right assignment batch size must be greater than zero".to_owned(),
            ));
        }
        if partition_size == 0 {
            return Err(AppError::Validation(
                "right assignment partition size must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            batch_size,
            partition_size,
            program_scope,
            worker_pool,
        })
    }

    /// Returns the maximum rows per bulk insert.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Returns the number of users handled by one pool job.
    #[must_use]
    pub fn partition_size(&self) -> usize {
        self.partition_size
    }

    /// Returns how programs narrow supervised facility sets.
    #[must_use]
    pub fn program_scope(&self) -> ProgramScope {
        self.program_scope
    }

    /// Returns the worker pool sizing.
    #[must_use]
    pub fn worker_pool(&self) -> &WorkerPoolConfig {
        &self.worker_pool
    }
}

impl Default for RightAssignmentConfig {
    fn default() -> Self {
        Self {
            batch_size: 5000,
            partition_size: 250,
            program_scope: ProgramScope::default(),
            worker_pool: WorkerPoolConfig::default(),
        }
    }
}

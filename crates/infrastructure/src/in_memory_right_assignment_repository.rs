use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use refdata_application::{RebuildStaging, RightAssignmentRepository};
use refdata_core::{AppError, AppResult};
use refdata_domain::{RightAssignment, UserId};
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory store of materialized right assignments with staged rebuilds.
#[derive(Debug, Default)]
pub struct InMemoryRightAssignmentRepository {
    live: RwLock<BTreeSet<RightAssignment>>,
    staged: RwLock<HashMap<String, BTreeSet<RightAssignment>>>,
}

impl InMemoryRightAssignmentRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live rows.
    pub async fn len(&self) -> usize {
        self.live.read().await.len()
    }

    /// Returns whether no live rows exist.
    pub async fn is_empty(&self) -> bool {
        self.live.read().await.is_empty()
    }

    /// Returns the number of open rebuilds.
    pub async fn open_rebuilds(&self) -> usize {
        self.staged.read().await.len()
    }
}

#[async_trait]
impl RightAssignmentRepository for InMemoryRightAssignmentRepository {
    async fn begin_rebuild(&self) -> AppResult<RebuildStaging> {
        let run_id = Uuid::new_v4().simple().to_string();
        let staging = RebuildStaging {
            table_name: format!("right_assignments_staging_{run_id}"),
            run_id,
        };

        self.staged
            .write()
            .await
            .insert(staging.table_name.clone(), BTreeSet::new());

        Ok(staging)
    }

    async fn insert_batch(
        &self,
        staging: &RebuildStaging,
        rows: &[RightAssignment],
    ) -> AppResult<u64> {
        let mut staged = self.staged.write().await;
        let Some(table) = staged.get_mut(&staging.table_name) else {
            return Err(AppError::NotFound(format!(
                "staging table '{}' does not exist",
                staging.table_name
            )));
        };

        let mut inserted = 0_u64;
        for row in rows {
            if !table.insert(row.clone()) {
                return Err(AppError::Conflict(format!(
                    "right assignment '{}' for user '{}' is already staged",
                    row.right_name, row.user_id
                )));
            }
            inserted += 1;
        }

        Ok(inserted)
    }

    async fn commit_rebuild(&self, staging: RebuildStaging) -> AppResult<()> {
        let Some(rows) = self.staged.write().await.remove(&staging.table_name) else {
            return Err(AppError::NotFound(format!(
                "staging table '{}' does not exist",
                staging.table_name
            )));
        };

        *self.live.write().await = rows;
        Ok(())
    }

    async fn abort_rebuild(&self, staging: RebuildStaging) -> AppResult<()> {
        self.staged.write().await.remove(&staging.table_name);
        Ok(())
    }

    async fn list_right_assignments_for_user(
        &self,
        user_id: UserId,
    ) -> AppResult<Vec<RightAssignment>> {
        Ok(self
            .live
            .read()
            .await
            .iter()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect())
    }
}

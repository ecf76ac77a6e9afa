use async_trait::async_trait;

use refdata_core::AppResult;
use refdata_domain::{RightAssignment, SupervisionHierarchy, User, UserId};

use super::staging::RebuildStaging;

/// Repository port for loading users, their role assignments and the
/// supervision hierarchy.
#[async_trait]
pub trait RoleAssignmentRepository: Send + Sync {
    /// Lists every user holding at least one role assignment.
    async fn list_users_with_role_assignments(&self) -> AppResult<Vec<User>>;

    /// Finds one user with role assignments loaded.
    async fn find_user_with_role_assignments(&self, user_id: UserId) -> AppResult<Option<User>>;

    /// Loads a snapshot of supervisory nodes, requisition groups and facilities.
    async fn load_supervision_hierarchy(&self) -> AppResult<SupervisionHierarchy>;
}

/// Repository port for the materialized right assignment rows.
///
/// A rebuild writes into staging storage that readers cannot see, then
/// replaces the live rows in one step.
#[async_trait]
pub trait RightAssignmentRepository: Send + Sync {
    /// Prepares empty staging storage for a rebuild.
    async fn begin_rebuild(&self) -> AppResult<RebuildStaging>;

    /// Inserts one batch of rows into staging storage.
    async fn insert_batch(
        &self,
        staging: &RebuildStaging,
        rows: &[RightAssignment],
    ) -> AppResult<u64>;

    /// Replaces live rows with the staged rows.
    async fn commit_rebuild(&self, staging: RebuildStaging) -> AppResult<()>;

    /// Discards staged rows and leaves live rows untouched.
    async fn abort_rebuild(&self, staging: RebuildStaging) -> AppResult<()>;

    /// Lists live rows for one user.
    async fn list_right_assignments_for_user(
        &self,
        user_id: UserId,
    ) -> AppResult<Vec<RightAssignment>>;
}

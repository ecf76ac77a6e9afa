use std::sync::Arc;

use refdata_core::{AppError, AppResult};
use refdata_domain::{FacilityId, ProgramId, RightAssignment, RightQuery, User, UserId};
use tracing::debug;

use crate::right_assignment_ports::{RightAssignmentRepository, RoleAssignmentRepository};

/// Application service answering right checks for users.
#[derive(Clone)]
pub struct AuthorizationService {
    role_assignment_repository: Arc<dyn RoleAssignmentRepository>,
    right_assignment_repository: Arc<dyn RightAssignmentRepository>,
}

impl AuthorizationService {
    /// Creates a new authorization service from repository implementations.
    #[must_use]
    pub fn new(
        role_assignment_repository: Arc<dyn RoleAssignmentRepository>,
        right_assignment_repository: Arc<dyn RightAssignmentRepository>,
    ) -> Self {
        Self {
            role_assignment_repository,
            right_assignment_repository,
        }
    }

    /// Returns whether any role assignment of the user satisfies the query.
    #[must_use]
    pub fn has_right(&self, user: &User, query: &RightQuery) -> bool {
        user.has_right(query)
    }

    /// Ensures the user holds the queried right.
    pub fn require_right(&self, user: &User, query: &RightQuery) -> AppResult<()> {
        if self.has_right(user, query) {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "user '{}' is missing right '{}'",
            user.username(),
            query.right().name()
        )))
    }

    /// Loads the user and evaluates the query against its role assignments.
    ///
    /// An unknown user holds no rights.
    pub async fn user_has_right(&self, user_id: UserId, query: &RightQuery) -> AppResult<bool> {
        let Some(user) = self
            .role_assignment_repository
            .find_user_with_role_assignments(user_id)
            .await?
        else {
            debug!(user_id = %user_id, "right check for unknown user");
            return Ok(false);
        };

        Ok(self.has_right(&user, query))
    }

    /// Loads the user and ensures it holds the queried right.
    pub async fn require_user_right(&self, user_id: UserId, query: &RightQuery) -> AppResult<()> {
        if self.user_has_right(user_id, query).await? {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "user '{user_id}' is missing right '{}'",
            query.right().name()
        )))
    }

    /// Lists the materialized rows of one user.
    pub async fn list_right_assignments(
        &self,
        user_id: UserId,
    ) -> AppResult<Vec<RightAssignment>> {
        self.right_assignment_repository
            .list_right_assignments_for_user(user_id)
            .await
    }

    /// Returns whether a materialized row grants the right at the facility
    /// and program.
    pub async fn has_materialized_right(
        &self,
        user_id: UserId,
        right_name: &str,
        facility_id: Option<FacilityId>,
        program_id: Option<ProgramId>,
    ) -> AppResult<bool> {
        Ok(self
            .list_right_assignments(user_id)
            .await?
            .iter()
            .any(|row| {
                row.right_name == right_name
                    && row.facility_id == facility_id
                    && row.program_id == program_id
            }))
    }
}

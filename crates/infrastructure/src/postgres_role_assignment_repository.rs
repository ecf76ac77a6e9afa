use std::collections::HashMap;

use async_trait::async_trait;
use refdata_application::RoleAssignmentRepository;
use refdata_core::{AppError, AppResult};
use refdata_domain::{SupervisionHierarchy, User, UserId};
use sqlx::PgPool;
use uuid::Uuid;

mod catalog;
mod hierarchy;

#[cfg(test)]
mod tests;

use catalog::{RoleCatalog, UserRow, assemble_user, load_role_assignment_rows};

/// PostgreSQL-backed source of users, role assignments and the supervision
/// hierarchy.
#[derive(Clone)]
pub struct PostgresRoleAssignmentRepository {
    pool: PgPool,
}

impl PostgresRoleAssignmentRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleAssignmentRepository for PostgresRoleAssignmentRepository {
    async fn list_users_with_role_assignments(&self) -> AppResult<Vec<User>> {
        let catalog = RoleCatalog::load(&self.pool).await?;

        let user_rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT users.id, users.username, users.home_facility_id, users.active
            FROM users
            WHERE EXISTS (
                SELECT 1 FROM role_assignments WHERE role_assignments.user_id = users.id
            )
            ORDER BY users.username
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!("failed to load users with role assignments: {error}"))
        })?;

        let mut assignments_by_user: HashMap<Uuid, Vec<_>> = HashMap::new();
        for row in load_role_assignment_rows(&self.pool, None).await? {
            assignments_by_user.entry(row.user_id).or_default().push(row);
        }

        let mut users = Vec::with_capacity(user_rows.len());
        for user_row in user_rows {
            let assignment_rows = assignments_by_user
                .remove(&user_row.id)
                .unwrap_or_default();
            users.extend(assemble_user(user_row, assignment_rows, &catalog)?);
        }

        Ok(users)
    }

    async fn find_user_with_role_assignments(&self, user_id: UserId) -> AppResult<Option<User>> {
        let user_row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, home_facility_id, active
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!("failed to load user '{user_id}': {error}"))
        })?;

        let Some(user_row) = user_row else {
            return Ok(None);
        };

        let catalog = RoleCatalog::load(&self.pool).await?;
        let assignment_rows = load_role_assignment_rows(&self.pool, Some(user_id)).await?;

        assemble_user(user_row, assignment_rows, &catalog)
    }

    async fn load_supervision_hierarchy(&self) -> AppResult<SupervisionHierarchy> {
        hierarchy::load(&self.pool).await
    }
}

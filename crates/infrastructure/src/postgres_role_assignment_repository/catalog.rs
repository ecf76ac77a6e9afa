use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use refdata_core::{AppError, AppResult};
use refdata_domain::{
    Facility, FacilityId, ProgramId, Right, RightId, RightType, Role, RoleAssignment,
    RoleAssignmentKind, RoleId, SupervisoryNodeId, User, UserId,
};
use sqlx::{FromRow, PgPool};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, FromRow)]
pub(super) struct UserRow {
    pub(super) id: Uuid,
    username: String,
    home_facility_id: Option<Uuid>,
    active: bool,
}

#[derive(Debug, FromRow)]
pub(super) struct RoleAssignmentRow {
    pub(super) user_id: Uuid,
    role_id: Uuid,
    assignment_type: String,
    program_id: Option<Uuid>,
    supervisory_node_id: Option<Uuid>,
    warehouse_id: Option<Uuid>,
}

#[derive(Debug, FromRow)]
struct RightRow {
    id: Uuid,
    name: String,
    right_type: String,
    description: Option<String>,
}

#[derive(Debug, FromRow)]
struct RightAttachmentRow {
    right_id: Uuid,
    attachment_id: Uuid,
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: Uuid,
    name: String,
    description: Option<String>,
}

#[derive(Debug, FromRow)]
struct RoleRightRow {
    role_id: Uuid,
    right_id: Uuid,
}

#[derive(Debug, FromRow)]
struct WarehouseRow {
    id: Uuid,
    code: String,
    name: String,
    type_code: String,
}

/// Roles and assignment warehouses needed to rebuild role assignments.
pub(super) struct RoleCatalog {
    roles: HashMap<Uuid, Arc<Role>>,
    warehouses: HashMap<Uuid, Facility>,
}

impl RoleCatalog {
    pub(super) async fn load(pool: &PgPool) -> AppResult<Self> {
        let rights = load_rights(pool).await?;
        let roles = load_roles(pool, &rights).await?;
        let warehouses = load_assignment_warehouses(pool).await?;

        Ok(Self { roles, warehouses })
    }

    fn role_assignment(
        &self,
        user_id: UserId,
        row: RoleAssignmentRow,
    ) -> AppResult<Option<RoleAssignment>> {
        let Some(role) = self.roles.get(&row.role_id) else {
            warn!(
                user_id = %user_id,
                role_id = %row.role_id,
                "skipping role assignment of a role that could not be loaded"
            );
            return Ok(None);
        };
        let role = Arc::clone(role);
        let kind = RoleAssignmentKind::from_str(row.assignment_type.as_str()).map_err(|error| {
            AppError::Persistence(format!(
                "failed to decode assignment type '{}' for user '{user_id}': {error}",
                row.assignment_type
            ))
        })?;

        let assignment = match kind {
            RoleAssignmentKind::Direct => RoleAssignment::direct(role, user_id),
            RoleAssignmentKind::Supervision => {
                let Some(program_id) = row.program_id else {
                    return Err(AppError::Persistence(format!(
                        "supervision assignment of user '{user_id}' has no program"
                    )));
                };
                RoleAssignment::supervision(
                    role,
                    user_id,
                    ProgramId::from_uuid(program_id),
                    row.supervisory_node_id.map(SupervisoryNodeId::from_uuid),
                )
            }
            RoleAssignmentKind::Fulfillment => {
                let Some(warehouse) = row
                    .warehouse_id
                    .and_then(|warehouse_id| self.warehouses.get(&warehouse_id))
                else {
                    warn!(
                        user_id = %user_id,
                        role_id = %row.role_id,
                        warehouse_id = ?row.warehouse_id,
                        "skipping fulfillment assignment without a loadable warehouse"
                    );
                    return Ok(None);
                };
                RoleAssignment::fulfillment(role, user_id, warehouse)
            }
        };

        match assignment {
            Ok(assignment) => Ok(Some(assignment)),
            Err(error @ (AppError::Validation(_) | AppError::RightTypeMismatch(_))) => {
                warn!(
                    user_id = %user_id,
                    role_id = %row.role_id,
                    error = %error,
                    "skipping invalid stored role assignment"
                );
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }
}

pub(super) async fn load_role_assignment_rows(
    pool: &PgPool,
    user_id: Option<UserId>,
) -> AppResult<Vec<RoleAssignmentRow>> {
    sqlx::query_as::<_, RoleAssignmentRow>(
        r#"
        SELECT user_id, role_id, assignment_type, program_id, supervisory_node_id, warehouse_id
        FROM role_assignments
        WHERE $1::UUID IS NULL OR user_id = $1
        ORDER BY user_id, id
        "#,
    )
    .bind(user_id.map(|value| value.as_uuid()))
    .fetch_all(pool)
    .await
    .map_err(|error| AppError::Persistence(format!("failed to load role assignments: {error}")))
}

/// Builds a user with its loadable role assignments. Returns `None` when the
/// user row itself is malformed.
pub(super) fn assemble_user(
    row: UserRow,
    assignment_rows: Vec<RoleAssignmentRow>,
    catalog: &RoleCatalog,
) -> AppResult<Option<User>> {
    let mut user = match User::new(UserId::from_uuid(row.id), row.username) {
        Ok(user) => user
            .with_home_facility(row.home_facility_id.map(FacilityId::from_uuid))
            .with_active(row.active),
        Err(error) => {
            warn!(
                user_id = %row.id,
                error = %error,
                "skipping user that cannot be assembled"
            );
            return Ok(None);
        }
    };

    let mut role_assignments = Vec::with_capacity(assignment_rows.len());
    for assignment_row in assignment_rows {
        if let Some(assignment) = catalog.role_assignment(user.id(), assignment_row)? {
            role_assignments.push(assignment);
        }
    }
    user.assign_roles(role_assignments)?;

    Ok(Some(user))
}

async fn load_rights(pool: &PgPool) -> AppResult<HashMap<Uuid, Right>> {
    let right_rows = sqlx::query_as::<_, RightRow>(
        r#"
        SELECT id, name, right_type, description
        FROM rights
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(|error| AppError::Persistence(format!("failed to load rights: {error}")))?;

    let mut rights = HashMap::with_capacity(right_rows.len());
    for row in right_rows {
        let right_type = RightType::from_str(row.right_type.as_str()).map_err(|error| {
            AppError::Persistence(format!(
                "failed to decode right type '{}' of right '{}': {error}",
                row.right_type, row.name
            ))
        })?;
        match Right::with_id(
            RightId::from_uuid(row.id),
            row.name,
            right_type,
            row.description,
        ) {
            Ok(right) => {
                rights.insert(row.id, right);
            }
            Err(error) => warn!(
                right_id = %row.id,
                error = %error,
                "skipping right that cannot be assembled"
            ),
        }
    }

    let attachment_rows = sqlx::query_as::<_, RightAttachmentRow>(
        r#"
        SELECT right_id, attachment_id
        FROM right_attachments
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(|error| AppError::Persistence(format!("failed to load right attachments: {error}")))?;

    for row in attachment_rows {
        let Some(attachment) = rights.get(&row.attachment_id).cloned() else {
            continue;
        };
        if let Some(right) = rights.get_mut(&row.right_id) {
            right.attach([&attachment]);
        }
    }

    Ok(rights)
}

async fn load_roles(
    pool: &PgPool,
    rights: &HashMap<Uuid, Right>,
) -> AppResult<HashMap<Uuid, Arc<Role>>> {
    let role_rows = sqlx::query_as::<_, RoleRow>(
        r#"
        SELECT id, name, description
        FROM roles
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(|error| AppError::Persistence(format!("failed to load roles: {error}")))?;

    let role_right_rows = sqlx::query_as::<_, RoleRightRow>(
        r#"
        SELECT role_id, right_id
        FROM role_rights
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(|error| AppError::Persistence(format!("failed to load role rights: {error}")))?;

    let mut rights_by_role: HashMap<Uuid, Vec<Right>> = HashMap::new();
    for row in role_right_rows {
        if let Some(right) = rights.get(&row.right_id) {
            rights_by_role
                .entry(row.role_id)
                .or_default()
                .push(right.clone());
        }
    }

    let mut roles = HashMap::with_capacity(role_rows.len());
    for row in role_rows {
        let role_rights = rights_by_role.remove(&row.id).unwrap_or_default();
        match Role::with_id(RoleId::from_uuid(row.id), row.name, row.description, role_rights) {
            Ok(role) => {
                roles.insert(row.id, Arc::new(role));
            }
            Err(error) => warn!(
                role_id = %row.id,
                error = %error,
                "skipping role that cannot be assembled"
            ),
        }
    }

    Ok(roles)
}

async fn load_assignment_warehouses(pool: &PgPool) -> AppResult<HashMap<Uuid, Facility>> {
    let rows = sqlx::query_as::<_, WarehouseRow>(
        r#"
        SELECT DISTINCT facilities.id, facilities.code, facilities.name, facilities.type_code
        FROM facilities
        INNER JOIN role_assignments
            ON role_assignments.warehouse_id = facilities.id
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(|error| {
        AppError::Persistence(format!("failed to load assignment warehouses: {error}"))
    })?;

    let mut warehouses = HashMap::with_capacity(rows.len());
    for row in rows {
        match Facility::new(FacilityId::from_uuid(row.id), row.code, row.name, row.type_code) {
            Ok(facility) => {
                warehouses.insert(row.id, facility);
            }
            Err(error) => warn!(
                facility_id = %row.id,
                error = %error,
                "skipping assignment warehouse that cannot be assembled"
            ),
        }
    }

    Ok(warehouses)
}

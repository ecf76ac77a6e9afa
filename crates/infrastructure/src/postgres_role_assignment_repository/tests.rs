use refdata_application::RoleAssignmentRepository;
use refdata_domain::{
    FacilityId, HierarchyExpander, HierarchyGap, ProgramId, ProgramScope, RequisitionGroupId,
    Right, RightQuery, RightType, SupervisoryNodeId, UserId,
};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::PostgresRoleAssignmentRepository;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres role assignment tests: {error}");
    }

    Some(pool)
}

async fn execute(pool: &PgPool, sql: &str, ids: &[Uuid]) {
    let mut query = sqlx::query(sql);
    for id in ids {
        query = query.bind(*id);
    }
    let result = query.execute(pool).await;
    assert!(result.is_ok(), "statement failed: {sql}: {result:?}");
}

fn code(prefix: &str, id: Uuid) -> String {
    format!("{prefix}-{}", id.simple())
}

/// Whitespace-only text that is still unique per id.
fn blank(id: Uuid) -> String {
    id.as_bytes()
        .iter()
        .flat_map(|byte| (0..8).map(move |bit| (byte >> bit) & 1 == 1))
        .map(|set| if set { '\t' } else { ' ' })
        .collect()
}

struct Seeded {
    user_id: Uuid,
    program_id: Uuid,
    parent_node_id: Uuid,
    child_node_id: Uuid,
    facilities: [Uuid; 3],
    warehouse_id: Uuid,
    approver_role_id: Uuid,
    approve_right: String,
    ship_right: String,
}

/// Seeds a user approving at a parent node whose child node groups two
/// facilities, plus a third facility grouped at the parent.
async fn seed(pool: &PgPool) -> Seeded {
    let run = Uuid::new_v4();
    let program_id = Uuid::new_v4();
    let facilities = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
    let warehouse_id = Uuid::new_v4();
    let parent_node_id = Uuid::new_v4();
    let child_node_id = Uuid::new_v4();
    let parent_group_id = Uuid::new_v4();
    let child_group_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();
    let approve_right_id = Uuid::new_v4();
    let ship_right_id = Uuid::new_v4();
    let approver_role_id = Uuid::new_v4();
    let shipper_role_id = Uuid::new_v4();
    let approve_right = code("APPROVE", run);
    let ship_right = code("SHIP", run);

    let program_insert =
        sqlx::query("INSERT INTO programs (id, code, name) VALUES ($1, $2, 'Family planning')")
            .bind(program_id)
            .bind(code("PRG", run))
            .execute(pool)
            .await;
    assert!(program_insert.is_ok());

    for (index, facility_id) in facilities.iter().chain([&warehouse_id]).enumerate() {
        let type_code = if *facility_id == warehouse_id {
            "warehouse"
        } else {
            "health_center"
        };
        let insert = sqlx::query(
            "INSERT INTO facilities (id, code, name, type_code) VALUES ($1, $2, $3, $4)",
        )
        .bind(*facility_id)
        .bind(code(&format!("FAC{index}"), run))
        .bind(format!("Facility {index}"))
        .bind(type_code)
        .execute(pool)
        .await;
        assert!(insert.is_ok());
    }

    for (node_id, node_code) in [(parent_node_id, "SN-PARENT"), (child_node_id, "SN-CHILD")] {
        let insert = sqlx::query("INSERT INTO supervisory_nodes (id, code) VALUES ($1, $2)")
            .bind(node_id)
            .bind(code(node_code, run))
            .execute(pool)
            .await;
        assert!(insert.is_ok());
    }
    execute(
        pool,
        "UPDATE supervisory_nodes SET parent_node_id = $1 WHERE id = $2",
        &[parent_node_id, child_node_id],
    )
    .await;

    for (group_id, node_id, group_code) in [
        (parent_group_id, parent_node_id, "RG-PARENT"),
        (child_group_id, child_node_id, "RG-CHILD"),
    ] {
        let insert = sqlx::query(
            "INSERT INTO requisition_groups (id, code, supervisory_node_id) VALUES ($1, $2, $3)",
        )
        .bind(group_id)
        .bind(code(group_code, run))
        .bind(node_id)
        .execute(pool)
        .await;
        assert!(insert.is_ok());
        execute(
            pool,
            "INSERT INTO requisition_group_program_schedules (requisition_group_id, program_id) VALUES ($1, $2)",
            &[group_id, program_id],
        )
        .await;
    }
    for (group_id, facility_id) in [
        (child_group_id, facilities[0]),
        (child_group_id, facilities[1]),
        (parent_group_id, facilities[2]),
    ] {
        execute(
            pool,
            "INSERT INTO requisition_group_members (requisition_group_id, facility_id) VALUES ($1, $2)",
            &[group_id, facility_id],
        )
        .await;
    }

    for (right_id, right_name, right_type) in [
        (approve_right_id, approve_right.as_str(), "SUPERVISION"),
        (ship_right_id, ship_right.as_str(), "ORDER_FULFILLMENT"),
    ] {
        let insert = sqlx::query("INSERT INTO rights (id, name, right_type) VALUES ($1, $2, $3)")
            .bind(right_id)
            .bind(right_name)
            .bind(right_type)
            .execute(pool)
            .await;
        assert!(insert.is_ok());
    }
    for (role_id, role_code, right_id) in [
        (approver_role_id, "Approver", approve_right_id),
        (shipper_role_id, "Shipper", ship_right_id),
    ] {
        let insert = sqlx::query("INSERT INTO roles (id, name) VALUES ($1, $2)")
            .bind(role_id)
            .bind(code(role_code, run))
            .execute(pool)
            .await;
        assert!(insert.is_ok());
        execute(
            pool,
            "INSERT INTO role_rights (role_id, right_id) VALUES ($1, $2)",
            &[role_id, right_id],
        )
        .await;
    }

    let user_insert = sqlx::query("INSERT INTO users (id, username) VALUES ($1, $2)")
        .bind(user_id)
        .bind(code("user", run))
        .execute(pool)
        .await;
    assert!(user_insert.is_ok());

    execute(
        pool,
        r#"
        INSERT INTO role_assignments (id, role_id, user_id, assignment_type, program_id, supervisory_node_id)
        VALUES ($1, $2, $3, 'supervision', $4, $5)
        "#,
        &[Uuid::new_v4(), approver_role_id, user_id, program_id, parent_node_id],
    )
    .await;
    execute(
        pool,
        r#"
        INSERT INTO role_assignments (id, role_id, user_id, assignment_type, warehouse_id)
        VALUES ($1, $2, $3, 'fulfillment', $4)
        "#,
        &[Uuid::new_v4(), shipper_role_id, user_id, warehouse_id],
    )
    .await;

    Seeded {
        user_id,
        program_id,
        parent_node_id,
        child_node_id,
        facilities,
        warehouse_id,
        approver_role_id,
        approve_right,
        ship_right,
    }
}

#[tokio::test]
async fn find_user_restores_role_assignments() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let seeded = seed(&pool).await;
    let repository = PostgresRoleAssignmentRepository::new(pool);

    let user = repository
        .find_user_with_role_assignments(UserId::from_uuid(seeded.user_id))
        .await
        .unwrap_or_else(|_| unreachable!())
        .unwrap_or_else(|| unreachable!());

    assert_eq!(user.role_assignment_count(), 2);
    let approve = Right::new(seeded.approve_right.as_str(), RightType::Supervision)
        .unwrap_or_else(|_| unreachable!());
    let ship = Right::new(seeded.ship_right.as_str(), RightType::OrderFulfillment)
        .unwrap_or_else(|_| unreachable!());
    assert!(user.has_right(&RightQuery::supervision(
        approve.clone(),
        ProgramId::from_uuid(seeded.program_id),
        Some(SupervisoryNodeId::from_uuid(seeded.parent_node_id)),
    )));
    assert!(!user.has_right(&RightQuery::supervision(
        approve,
        ProgramId::from_uuid(seeded.program_id),
        Some(SupervisoryNodeId::from_uuid(seeded.child_node_id)),
    )));
    assert!(user.has_right(&RightQuery::fulfillment(
        ship,
        FacilityId::from_uuid(seeded.warehouse_id),
    )));

    let listed = repository
        .list_users_with_role_assignments()
        .await
        .unwrap_or_default();
    assert!(listed.iter().any(|listed_user| listed_user.id() == user.id()));
}

#[tokio::test]
async fn hierarchy_snapshot_expands_child_groups() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let seeded = seed(&pool).await;
    let repository = PostgresRoleAssignmentRepository::new(pool);

    let hierarchy = repository
        .load_supervision_hierarchy()
        .await
        .unwrap_or_else(|_| unreachable!());
    let expansion = HierarchyExpander::new(&hierarchy, ProgramScope::SupportedOnly)
        .supervised_facilities(
            SupervisoryNodeId::from_uuid(seeded.parent_node_id),
            Some(ProgramId::from_uuid(seeded.program_id)),
        );

    // seeded facilities declare no supported programs
    assert!(expansion.facilities.is_empty());

    let expansion = HierarchyExpander::new(&hierarchy, ProgramScope::Unrestricted)
        .supervised_facilities(
            SupervisoryNodeId::from_uuid(seeded.parent_node_id),
            Some(ProgramId::from_uuid(seeded.program_id)),
        );
    assert_eq!(
        expansion.facilities,
        seeded
            .facilities
            .iter()
            .copied()
            .map(FacilityId::from_uuid)
            .collect()
    );
    assert!(expansion.gaps.is_empty());
}

#[tokio::test]
async fn malformed_reference_rows_are_skipped() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let seeded = seed(&pool).await;
    let blank_facility_id = Uuid::new_v4();
    let blank_node_id = Uuid::new_v4();
    let blank_group_id = Uuid::new_v4();
    let blank_right_id = Uuid::new_v4();
    let blank_user_id = Uuid::new_v4();

    let facility_insert = sqlx::query(
        "INSERT INTO facilities (id, code, name, type_code) VALUES ($1, $2, 'Unnamed', $3)",
    )
    .bind(blank_facility_id)
    .bind(blank(blank_facility_id))
    .bind(blank(Uuid::new_v4()))
    .execute(&pool)
    .await;
    assert!(facility_insert.is_ok());

    let node_insert = sqlx::query("INSERT INTO supervisory_nodes (id, code) VALUES ($1, $2)")
        .bind(blank_node_id)
        .bind(blank(blank_node_id))
        .execute(&pool)
        .await;
    assert!(node_insert.is_ok());

    let group_insert = sqlx::query("INSERT INTO requisition_groups (id, code) VALUES ($1, $2)")
        .bind(blank_group_id)
        .bind(blank(blank_group_id))
        .execute(&pool)
        .await;
    assert!(group_insert.is_ok());

    let right_insert =
        sqlx::query("INSERT INTO rights (id, name, right_type) VALUES ($1, $2, 'SUPERVISION')")
            .bind(blank_right_id)
            .bind(blank(blank_right_id))
            .execute(&pool)
            .await;
    assert!(right_insert.is_ok());
    execute(
        &pool,
        "INSERT INTO role_rights (role_id, right_id) VALUES ($1, $2)",
        &[seeded.approver_role_id, blank_right_id],
    )
    .await;

    let user_insert = sqlx::query("INSERT INTO users (id, username) VALUES ($1, $2)")
        .bind(blank_user_id)
        .bind(blank(blank_user_id))
        .execute(&pool)
        .await;
    assert!(user_insert.is_ok());
    execute(
        &pool,
        r#"
        INSERT INTO role_assignments (id, role_id, user_id, assignment_type, program_id, supervisory_node_id)
        VALUES ($1, $2, $3, 'supervision', $4, $5)
        "#,
        &[
            Uuid::new_v4(),
            seeded.approver_role_id,
            blank_user_id,
            seeded.program_id,
            blank_node_id,
        ],
    )
    .await;

    let repository = PostgresRoleAssignmentRepository::new(pool);

    let hierarchy = repository
        .load_supervision_hierarchy()
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(
        hierarchy
            .node(SupervisoryNodeId::from_uuid(blank_node_id))
            .is_none()
    );
    assert!(
        hierarchy
            .requisition_group(RequisitionGroupId::from_uuid(blank_group_id))
            .is_none()
    );
    assert!(
        hierarchy
            .facility(FacilityId::from_uuid(blank_facility_id))
            .is_none()
    );
    assert!(
        hierarchy
            .node(SupervisoryNodeId::from_uuid(seeded.parent_node_id))
            .is_some()
    );

    let expansion = HierarchyExpander::new(&hierarchy, ProgramScope::Unrestricted)
        .supervised_facilities(
            SupervisoryNodeId::from_uuid(blank_node_id),
            Some(ProgramId::from_uuid(seeded.program_id)),
        );
    assert!(expansion.facilities.is_empty());
    assert_eq!(
        expansion.gaps,
        vec![HierarchyGap::MissingNode {
            node: SupervisoryNodeId::from_uuid(blank_node_id)
        }]
    );

    let listed = repository
        .list_users_with_role_assignments()
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(
        listed
            .iter()
            .any(|user| user.id() == UserId::from_uuid(seeded.user_id))
    );
    assert!(
        listed
            .iter()
            .all(|user| user.id() != UserId::from_uuid(blank_user_id))
    );

    let blank_user = repository
        .find_user_with_role_assignments(UserId::from_uuid(blank_user_id))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(blank_user.is_none());

    let approver = repository
        .find_user_with_role_assignments(UserId::from_uuid(seeded.user_id))
        .await
        .unwrap_or_else(|_| unreachable!())
        .unwrap_or_else(|| unreachable!());
    let approve = Right::new(seeded.approve_right.as_str(), RightType::Supervision)
        .unwrap_or_else(|_| unreachable!());
    assert!(approver.has_right(&RightQuery::supervision(
        approve,
        ProgramId::from_uuid(seeded.program_id),
        Some(SupervisoryNodeId::from_uuid(seeded.parent_node_id)),
    )));
}

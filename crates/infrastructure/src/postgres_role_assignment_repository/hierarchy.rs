use std::collections::HashMap;

use refdata_core::{AppError, AppResult};
use refdata_domain::{
    Facility, FacilityId, ProgramId, RequisitionGroup, RequisitionGroupId, SupervisionHierarchy,
    SupervisoryNode, SupervisoryNodeId,
};
use sqlx::{FromRow, PgPool};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct NodeRow {
    id: Uuid,
    code: String,
    facility_id: Option<Uuid>,
    parent_node_id: Option<Uuid>,
    requisition_group_id: Option<Uuid>,
}

#[derive(Debug, FromRow)]
struct RequisitionGroupRow {
    id: Uuid,
    code: String,
}

#[derive(Debug, FromRow)]
struct PairRow {
    owner_id: Uuid,
    member_id: Uuid,
}

#[derive(Debug, FromRow)]
struct FacilityRow {
    id: Uuid,
    code: String,
    name: String,
    type_code: String,
}

pub(super) async fn load(pool: &PgPool) -> AppResult<SupervisionHierarchy> {
    let mut hierarchy = SupervisionHierarchy::new();

    let mut supported_programs = group_pairs(
        fetch_pairs(
            pool,
            r#"
            SELECT facility_id AS owner_id, program_id AS member_id
            FROM supported_programs
            WHERE active
            "#,
            "supported programs",
        )
        .await?,
    );
    let facility_rows = sqlx::query_as::<_, FacilityRow>(
        r#"
        SELECT id, code, name, type_code
        FROM facilities
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(|error| AppError::Persistence(format!("failed to load facilities: {error}")))?;
    for row in facility_rows {
        let programs = supported_programs.remove(&row.id).unwrap_or_default();
        match Facility::new(
            FacilityId::from_uuid(row.id),
            row.code,
            row.name,
            row.type_code,
        ) {
            Ok(facility) => hierarchy.insert_facility(
                facility.with_supported_programs(programs.into_iter().map(ProgramId::from_uuid)),
            ),
            Err(error) => warn!(
                facility_id = %row.id,
                error = %error,
                "skipping facility that cannot be assembled"
            ),
        }
    }

    let mut members = group_pairs(
        fetch_pairs(
            pool,
            r#"
            SELECT requisition_group_id AS owner_id, facility_id AS member_id
            FROM requisition_group_members
            "#,
            "requisition group members",
        )
        .await?,
    );
    let mut schedules = group_pairs(
        fetch_pairs(
            pool,
            r#"
            SELECT requisition_group_id AS owner_id, program_id AS member_id
            FROM requisition_group_program_schedules
            "#,
            "requisition group program schedules",
        )
        .await?,
    );
    let group_rows = sqlx::query_as::<_, RequisitionGroupRow>(
        r#"
        SELECT id, code
        FROM requisition_groups
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(|error| {
        AppError::Persistence(format!("failed to load requisition groups: {error}"))
    })?;
    for row in group_rows {
        let group_members = members.remove(&row.id).unwrap_or_default();
        let programs = schedules.remove(&row.id).unwrap_or_default();
        match RequisitionGroup::new(
            RequisitionGroupId::from_uuid(row.id),
            row.code,
            group_members.into_iter().map(FacilityId::from_uuid),
        ) {
            Ok(group) => hierarchy.insert_requisition_group(
                group.with_programs(programs.into_iter().map(ProgramId::from_uuid)),
            ),
            Err(error) => warn!(
                requisition_group_id = %row.id,
                error = %error,
                "skipping requisition group that cannot be assembled"
            ),
        }
    }

    let node_rows = sqlx::query_as::<_, NodeRow>(
        r#"
        SELECT
            nodes.id,
            nodes.code,
            nodes.facility_id,
            nodes.parent_node_id,
            groups.id AS requisition_group_id
        FROM supervisory_nodes AS nodes
        LEFT JOIN requisition_groups AS groups
            ON groups.supervisory_node_id = nodes.id
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(|error| {
        AppError::Persistence(format!("failed to load supervisory nodes: {error}"))
    })?;

    let mut links = Vec::new();
    for row in node_rows {
        let mut node = match SupervisoryNode::new(SupervisoryNodeId::from_uuid(row.id), row.code) {
            Ok(node) => node,
            Err(error) => {
                // referencing assignments surface as missing-node gaps
                warn!(
                    supervisory_node_id = %row.id,
                    error = %error,
                    "skipping supervisory node that cannot be assembled"
                );
                continue;
            }
        };
        if let Some(facility_id) = row.facility_id {
            node = node.with_facility(FacilityId::from_uuid(facility_id));
        }
        if let Some(group_id) = row.requisition_group_id {
            node = node.with_requisition_group(RequisitionGroupId::from_uuid(group_id));
        }
        if let Some(parent_id) = row.parent_node_id {
            links.push((SupervisoryNodeId::from_uuid(parent_id), node.id()));
        }
        hierarchy.insert_node(node);
    }

    for (parent_id, child_id) in links {
        if let Err(error) = hierarchy.attach_child(parent_id, child_id) {
            warn!(
                parent_node_id = %parent_id,
                child_node_id = %child_id,
                error = %error,
                "skipping supervisory node link"
            );
        }
    }

    Ok(hierarchy)
}

async fn fetch_pairs(pool: &PgPool, query: &'static str, label: &str) -> AppResult<Vec<PairRow>> {
    sqlx::query_as::<_, PairRow>(query)
        .fetch_all(pool)
        .await
        .map_err(|error| AppError::Persistence(format!("failed to load {label}: {error}")))
}

fn group_pairs(rows: Vec<PairRow>) -> HashMap<Uuid, Vec<Uuid>> {
    let mut grouped: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for row in rows {
        grouped.entry(row.owner_id).or_default().push(row.member_id);
    }
    grouped
}

//! Domain entities and invariants for access evaluation.

#![forbid(unsafe_code)]

mod facility;
mod hierarchy;
mod ids;
mod right;
mod right_assignment;
mod right_query;
mod role;
mod role_assignment;
mod supervision;
mod user;

pub use facility::{Facility, WAREHOUSE_FACILITY_TYPE};
pub use hierarchy::{HierarchyExpander, HierarchyExpansion, HierarchyGap, ProgramScope};
pub use ids::{
    FacilityId, ProgramId, RequisitionGroupId, RightId, RoleId, SupervisoryNodeId, UserId,
};
pub use right::{Right, RightType};
pub use right_assignment::RightAssignment;
pub use right_query::RightQuery;
pub use role::Role;
pub use role_assignment::{AssignmentContext, RoleAssignment, RoleAssignmentKind};
pub use supervision::{RequisitionGroup, SupervisionHierarchy, SupervisoryNode};
pub use user::User;

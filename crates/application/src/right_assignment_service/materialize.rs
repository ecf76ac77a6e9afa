use std::collections::BTreeSet;

use refdata_domain::{AssignmentContext, RightAssignment, User};

use crate::hierarchy_cache::HierarchyExpansionCache;

/// Flattens every role assignment of one user into unique rows.
pub(super) fn materialize_user(
    user: &User,
    cache: &HierarchyExpansionCache,
) -> BTreeSet<RightAssignment> {
    let user_id = user.id();
    let mut rows = BTreeSet::new();

    for assignment in user.role_assignments() {
        let role = assignment.role();

        match *assignment.context() {
            AssignmentContext::Direct => {
                rows.extend(
                    role.right_names()
                        .map(|right_name| RightAssignment::new(user_id, right_name, None, None)),
                );
            }
            AssignmentContext::Fulfillment { warehouse } => {
                rows.extend(role.right_names().map(|right_name| {
                    RightAssignment::new(user_id, right_name, Some(warehouse), None)
                }));
            }
            AssignmentContext::Supervision {
                program,
                supervisory_node: None,
            } => {
                // home facility supervision without a home facility grants nothing
                let Some(home_facility) = user.home_facility() else {
                    continue;
                };
                rows.extend(role.right_names().map(|right_name| {
                    RightAssignment::new(user_id, right_name, Some(home_facility), Some(program))
                }));
            }
            AssignmentContext::Supervision {
                program,
                supervisory_node: Some(node),
            } => {
                let facilities = cache.supervised_facilities(node, program);
                for right_name in role.right_names() {
                    rows.extend(facilities.iter().map(|facility| {
                        RightAssignment::new(user_id, right_name, Some(*facility), Some(program))
                    }));
                }
            }
        }
    }

    rows
}

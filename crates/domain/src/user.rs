//! User slice relevant to access evaluation.

use std::collections::{BTreeSet, HashSet};

use refdata_core::{AppError, AppResult, NonEmptyString};

use crate::{
    AssignmentContext, FacilityId, HierarchyExpander, ProgramId, Right, RightQuery,
    RoleAssignment, UserId,
};

/// User owning a set of role assignments.
#[derive(Debug, Clone)]
pub struct User {
    id: UserId,
    username: NonEmptyString,
    home_facility: Option<FacilityId>,
    active: bool,
    role_assignments: HashSet<RoleAssignment>,
}

impl User {
    /// Creates an active user without assignments.
    pub fn new(id: UserId, username: impl Into<String>) -> AppResult<Self> {
        Ok(Self {
            id,
            username: NonEmptyString::new(username)?,
            home_facility: None,
            active: true,
            role_assignments: HashSet::new(),
        })
    }

    /// Returns the same user with a home facility.
    #[must_use]
    pub fn with_home_facility(mut self, home_facility: Option<FacilityId>) -> Self {
        self.home_facility = home_facility;
        self
    }

    /// Returns the same user with the active flag set.
    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Returns the user identifier.
    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    /// Returns the username.
    #[must_use]
    pub fn username(&self) -> &str {
        self.username.as_str()
    }

    /// Returns the home facility.
    #[must_use]
    pub fn home_facility(&self) -> Option<FacilityId> {
        self.home_facility
    }

    /// Returns whether the account is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Iterates role assignments in arbitrary order.
    pub fn role_assignments(&self) -> impl Iterator<Item = &RoleAssignment> {
        self.role_assignments.iter()
    }

    /// Returns the number of role assignments.
    #[must_use]
    pub fn role_assignment_count(&self) -> usize {
        self.role_assignments.len()
    }

    /// Adds role assignments. An assignment equal to one already held is
    /// ignored, and nothing is added when any assignment belongs to another
    /// user.
    pub fn assign_roles(
        &mut self,
        role_assignments: impl IntoIterator<Item = RoleAssignment>,
    ) -> AppResult<()> {
        let role_assignments: Vec<RoleAssignment> = role_assignments.into_iter().collect();

        if let Some(foreign) = role_assignments
            .iter()
            .find(|assignment| assignment.user_id() != self.id)
        {
            return Err(AppError::Validation(format!(
                "role '{}' is assigned to user '{}' and cannot be added to user '{}'",
                foreign.role().name(),
                foreign.user_id(),
                self.id
            )));
        }

        // HashSet::insert keeps the stored value when an equal one exists
        self.role_assignments.extend(role_assignments);

        Ok(())
    }

    /// Returns whether any assignment satisfies the query.
    #[must_use]
    pub fn has_right(&self, query: &RightQuery) -> bool {
        self.role_assignments
            .iter()
            .any(|assignment| assignment.has_right(query))
    }

    /// Returns warehouses where the user holds the right through fulfillment.
    #[must_use]
    pub fn fulfillment_facilities(&self, right: &Right) -> BTreeSet<FacilityId> {
        self.role_assignments
            .iter()
            .filter_map(|assignment| {
                let warehouse = assignment.warehouse()?;
                assignment
                    .has_right(&RightQuery::fulfillment(right.clone(), warehouse))
                    .then_some(warehouse)
            })
            .collect()
    }

    /// Returns facilities the user supervises for the right and program.
    #[must_use]
    pub fn supervised_facilities(
        &self,
        right: &Right,
        program: ProgramId,
        expander: &HierarchyExpander<'_>,
    ) -> BTreeSet<FacilityId> {
        let mut facilities = BTreeSet::new();

        for assignment in &self.role_assignments {
            let AssignmentContext::Supervision {
                program: assigned_program,
                supervisory_node,
            } = *assignment.context()
            else {
                continue;
            };
            if assigned_program != program || !assignment.role().contains(right) {
                continue;
            }

            match supervisory_node {
                Some(node) => facilities.extend(
                    expander
                        .supervised_facilities(node, Some(program))
                        .facilities,
                ),
                None => facilities.extend(self.home_facility),
            }
        }

        facilities
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use super::User;
    use crate::{
        Facility, FacilityId, HierarchyExpander, ProgramId, ProgramScope, RequisitionGroup,
        RequisitionGroupId, Right, RightQuery, RightType, Role, RoleAssignment,
        SupervisionHierarchy, SupervisoryNode, SupervisoryNodeId, UserId,
    };

    fn right(name: &str, right_type: RightType) -> Right {
        Right::new(name, right_type).unwrap_or_else(|_| unreachable!())
    }

    fn role(name: &str, right_names: &[&str], right_type: RightType) -> Arc<Role> {
        Arc::new(
            Role::new(
                name,
                right_names
                    .iter()
                    .map(|right_name| right(right_name, right_type)),
            )
            .unwrap_or_else(|_| unreachable!()),
        )
    }

    fn user() -> User {
        User::new(UserId::new(), "administrator").unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn has_right_is_any_assignment() {
        let mut user = user();
        let program = ProgramId::new();
        let admin = RoleAssignment::direct(
            role("Admin", &["USERS_MANAGE"], RightType::GeneralAdmin),
            user.id(),
        );
        let approver = RoleAssignment::supervision(
            role("Approver", &["APPROVE"], RightType::Supervision),
            user.id(),
            program,
            None,
        );
        assert!(
            user.assign_roles([
                admin.unwrap_or_else(|_| unreachable!()),
                approver.unwrap_or_else(|_| unreachable!()),
            ])
            .is_ok()
        );

        assert!(user.has_right(&RightQuery::new(right("USERS_MANAGE", RightType::GeneralAdmin))));
        assert!(user.has_right(&RightQuery::supervision(
            right("APPROVE", RightType::Supervision),
            program,
            None
        )));
        assert!(!user.has_right(&RightQuery::new(right("RIGHTS_VIEW", RightType::GeneralAdmin))));
    }

    #[test]
    fn user_without_assignments_has_no_rights() {
        assert!(!user().has_right(&RightQuery::new(right("USERS_MANAGE", RightType::GeneralAdmin))));
    }

    #[test]
    fn assign_roles_rejects_foreign_assignment_atomically() {
        let mut user = user();
        let own = RoleAssignment::direct(
            role("Admin", &["USERS_MANAGE"], RightType::GeneralAdmin),
            user.id(),
        )
        .unwrap_or_else(|_| unreachable!());
        let foreign = RoleAssignment::direct(
            role("Reporter", &["REPORTS_VIEW"], RightType::Reports),
            UserId::new(),
        )
        .unwrap_or_else(|_| unreachable!());

        assert!(user.assign_roles([own, foreign]).is_err());
        assert_eq!(user.role_assignment_count(), 0);
    }

    #[test]
    fn assign_roles_keeps_first_assignment_for_same_role() {
        let mut user = user();
        let approver = role("Approver", &["APPROVE"], RightType::Supervision);
        let first_program = ProgramId::new();
        let first = RoleAssignment::supervision(approver.clone(), user.id(), first_program, None)
            .unwrap_or_else(|_| unreachable!());
        let second = RoleAssignment::supervision(approver, user.id(), ProgramId::new(), None)
            .unwrap_or_else(|_| unreachable!());

        assert!(user.assign_roles([first]).is_ok());
        assert!(user.assign_roles([second]).is_ok());

        assert_eq!(user.role_assignment_count(), 1);
        assert_eq!(
            user.role_assignments().next().and_then(RoleAssignment::program),
            Some(first_program)
        );
    }

    #[test]
    fn fulfillment_facilities_lists_matching_warehouses() {
        let mut user = user();
        let warehouse = Facility::new(FacilityId::new(), "W01", "Depot", "warehouse")
            .unwrap_or_else(|_| unreachable!());
        let assignment = RoleAssignment::fulfillment(
            role("Shipper", &["SHIP"], RightType::OrderFulfillment),
            user.id(),
            &warehouse,
        )
        .unwrap_or_else(|_| unreachable!());
        assert!(user.assign_roles([assignment]).is_ok());

        assert_eq!(
            user.fulfillment_facilities(&right("SHIP", RightType::OrderFulfillment)),
            BTreeSet::from([warehouse.id()])
        );
        assert!(
            user.fulfillment_facilities(&right("RECEIVE", RightType::OrderFulfillment))
                .is_empty()
        );
    }

    #[test]
    fn supervised_facilities_combines_node_and_home_facility() {
        let home = FacilityId::new();
        let member = FacilityId::new();
        let program = ProgramId::new();
        let mut user = user().with_home_facility(Some(home));

        let group = RequisitionGroup::new(RequisitionGroupId::new(), "RG1", [member])
            .unwrap_or_else(|_| unreachable!());
        let node = SupervisoryNode::new(SupervisoryNodeId::new(), "SN1")
            .map(|node| node.with_requisition_group(group.id()))
            .unwrap_or_else(|_| unreachable!());
        let node_id = node.id();
        let mut hierarchy = SupervisionHierarchy::new();
        hierarchy.insert_requisition_group(group);
        hierarchy.insert_node(node);

        let at_node = RoleAssignment::supervision(
            role("Approver", &["APPROVE"], RightType::Supervision),
            user.id(),
            program,
            Some(node_id),
        )
        .unwrap_or_else(|_| unreachable!());
        let at_home = RoleAssignment::supervision(
            role("Submitter", &["APPROVE", "SUBMIT"], RightType::Supervision),
            user.id(),
            program,
            None,
        )
        .unwrap_or_else(|_| unreachable!());
        assert!(user.assign_roles([at_node, at_home]).is_ok());

        let expander = HierarchyExpander::new(&hierarchy, ProgramScope::Unrestricted);
        assert_eq!(
            user.supervised_facilities(&right("APPROVE", RightType::Supervision), program, &expander),
            BTreeSet::from([home, member])
        );
        assert_eq!(
            user.supervised_facilities(&right("SUBMIT", RightType::Supervision), program, &expander),
            BTreeSet::from([home])
        );
        assert!(
            user.supervised_facilities(
                &right("APPROVE", RightType::Supervision),
                ProgramId::new(),
                &expander
            )
            .is_empty()
        );
    }
}

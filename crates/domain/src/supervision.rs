use std::collections::{BTreeSet, HashMap};

use refdata_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::{Facility, FacilityId, ProgramId, RequisitionGroupId, SupervisoryNodeId};

/// Node of the supervision tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisoryNode {
    id: SupervisoryNodeId,
    code: NonEmptyString,
    facility: Option<FacilityId>,
    parent_node: Option<SupervisoryNodeId>,
    child_nodes: BTreeSet<SupervisoryNodeId>,
    requisition_group: Option<RequisitionGroupId>,
}

impl SupervisoryNode {
    /// Creates a detached node.
    pub fn new(id: SupervisoryNodeId, code: impl Into<String>) -> AppResult<Self> {
        Ok(Self {
            id,
            code: NonEmptyString::new(code)?,
            facility: None,
            parent_node: None,
            child_nodes: BTreeSet::new(),
            requisition_group: None,
        })
    }

    /// Returns the same node located at a facility.
    #[must_use]
    pub fn with_facility(mut self, facility: FacilityId) -> Self {
        self.facility = Some(facility);
        self
    }

    /// Returns the same node linked to a requisition group.
    #[must_use]
    pub fn with_requisition_group(mut self, requisition_group: RequisitionGroupId) -> Self {
        self.requisition_group = Some(requisition_group);
        self
    }

    /// Returns the node identifier.
    #[must_use]
    pub fn id(&self) -> SupervisoryNodeId {
        self.id
    }

    /// Returns the node code.
    #[must_use]
    pub fn code(&self) -> &str {
        self.code.as_str()
    }

    /// Returns the facility hosting the node.
    #[must_use]
    pub fn facility(&self) -> Option<FacilityId> {
        self.facility
    }

    /// Returns the parent node.
    #[must_use]
    pub fn parent_node(&self) -> Option<SupervisoryNodeId> {
        self.parent_node
    }

    /// Returns the child nodes.
    #[must_use]
    pub fn child_nodes(&self) -> &BTreeSet<SupervisoryNodeId> {
        &self.child_nodes
    }

    /// Returns the requisition group supervised directly by this node.
    #[must_use]
    pub fn requisition_group(&self) -> Option<RequisitionGroupId> {
        self.requisition_group
    }
}

/// Set of facilities supervised together by one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequisitionGroup {
    id: RequisitionGroupId,
    code: NonEmptyString,
    member_facilities: BTreeSet<FacilityId>,
    programs: BTreeSet<ProgramId>,
}

impl RequisitionGroup {
    /// Creates a requisition group.
    pub fn new(
        id: RequisitionGroupId,
        code: impl Into<String>,
        member_facilities: impl IntoIterator<Item = FacilityId>,
    ) -> AppResult<Self> {
        Ok(Self {
            id,
            code: NonEmptyString::new(code)?,
            member_facilities: member_facilities.into_iter().collect(),
            programs: BTreeSet::new(),
        })
    }

    /// Returns the same group with its scheduled programs replaced.
    #[must_use]
    pub fn with_programs(mut self, programs: impl IntoIterator<Item = ProgramId>) -> Self {
        self.programs = programs.into_iter().collect();
        self
    }

    /// Returns the group identifier.
    #[must_use]
    pub fn id(&self) -> RequisitionGroupId {
        self.id
    }

    /// Returns the group code.
    #[must_use]
    pub fn code(&self) -> &str {
        self.code.as_str()
    }

    /// Returns member facilities.
    #[must_use]
    pub fn member_facilities(&self) -> &BTreeSet<FacilityId> {
        &self.member_facilities
    }

    /// Returns whether the group has a schedule for the program.
    #[must_use]
    pub fn supports(&self, program_id: ProgramId) -> bool {
        self.programs.contains(&program_id)
    }
}

/// Arena holding supervisory nodes, requisition groups and facilities by id.
#[derive(Debug, Clone, Default)]
pub struct SupervisionHierarchy {
    nodes: HashMap<SupervisoryNodeId, SupervisoryNode>,
    requisition_groups: HashMap<RequisitionGroupId, RequisitionGroup>,
    facilities: HashMap<FacilityId, Facility>,
}

impl SupervisionHierarchy {
    /// Creates an empty hierarchy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a node.
    pub fn insert_node(&mut self, node: SupervisoryNode) {
        self.nodes.insert(node.id, node);
    }

    /// Adds or replaces a requisition group.
    pub fn insert_requisition_group(&mut self, requisition_group: RequisitionGroup) {
        self.requisition_groups
            .insert(requisition_group.id, requisition_group);
    }

    /// Adds or replaces a facility.
    pub fn insert_facility(&mut self, facility: Facility) {
        self.facilities.insert(facility.id(), facility);
    }

    /// Links a child node below a parent node.
    pub fn attach_child(
        &mut self,
        parent_id: SupervisoryNodeId,
        child_id: SupervisoryNodeId,
    ) -> AppResult<()> {
        if parent_id == child_id {
            return Err(AppError::Validation(format!(
                "supervisory node '{parent_id}' cannot be its own child"
            )));
        }

        let Some(child) = self.nodes.get_mut(&child_id) else {
            return Err(AppError::NotFound(format!(
                "supervisory node '{child_id}' does not exist"
            )));
        };
        let previous_parent = child.parent_node.replace(parent_id);

        let Some(parent) = self.nodes.get_mut(&parent_id) else {
            if let Some(child) = self.nodes.get_mut(&child_id) {
                child.parent_node = previous_parent;
            }
            return Err(AppError::NotFound(format!(
                "supervisory node '{parent_id}' does not exist"
            )));
        };
        parent.child_nodes.insert(child_id);

        if let Some(previous_parent) = previous_parent.filter(|value| *value != parent_id)
            && let Some(previous) = self.nodes.get_mut(&previous_parent)
        {
            previous.child_nodes.remove(&child_id);
        }

        Ok(())
    }

    /// Returns a node by id.
    #[must_use]
    pub fn node(&self, id: SupervisoryNodeId) -> Option<&SupervisoryNode> {
        self.nodes.get(&id)
    }

    /// Returns a requisition group by id.
    #[must_use]
    pub fn requisition_group(&self, id: RequisitionGroupId) -> Option<&RequisitionGroup> {
        self.requisition_groups.get(&id)
    }

    /// Returns a facility by id.
    #[must_use]
    pub fn facility(&self, id: FacilityId) -> Option<&Facility> {
        self.facilities.get(&id)
    }

    /// Iterates all nodes in arbitrary order.
    pub fn nodes(&self) -> impl Iterator<Item = &SupervisoryNode> {
        self.nodes.values()
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

use crate::{FacilityId, ProgramId, Right, SupervisoryNodeId};

/// Context a caller presents when asking whether a right is granted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RightQuery {
    right: Right,
    program: Option<ProgramId>,
    supervisory_node: Option<SupervisoryNodeId>,
    warehouse: Option<FacilityId>,
}

impl RightQuery {
    /// Creates a context-free query for one right.
    #[must_use]
    pub fn new(right: Right) -> Self {
        Self {
            right,
            program: None,
            supervisory_node: None,
            warehouse: None,
        }
    }

    /// Creates a query for a program at a supervisory node, or for home
    /// facility supervision when no node is given.
    #[must_use]
    pub fn supervision(
        right: Right,
        program: ProgramId,
        supervisory_node: Option<SupervisoryNodeId>,
    ) -> Self {
        Self {
            right,
            program: Some(program),
            supervisory_node,
            warehouse: None,
        }
    }

    /// Creates a query for one warehouse.
    #[must_use]
    pub fn fulfillment(right: Right, warehouse: FacilityId) -> Self {
        Self {
            right,
            program: None,
            supervisory_node: None,
            warehouse: Some(warehouse),
        }
    }

    /// Returns the requested right.
    #[must_use]
    pub fn right(&self) -> &Right {
        &self.right
    }

    /// Returns the requested program.
    #[must_use]
    pub fn program(&self) -> Option<ProgramId> {
        self.program
    }

    /// Returns the requested supervisory node.
    #[must_use]
    pub fn supervisory_node(&self) -> Option<SupervisoryNodeId> {
        self.supervisory_node
    }

    /// Returns the requested warehouse.
    #[must_use]
    pub fn warehouse(&self) -> Option<FacilityId> {
        self.warehouse
    }
}

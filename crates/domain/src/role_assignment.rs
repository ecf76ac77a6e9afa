use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use refdata_core::{AppError, AppResult};

use crate::{
    Facility, FacilityId, ProgramId, RightQuery, RightType, Role, SupervisoryNodeId, UserId,
};

/// Assignment variants, each accepting a fixed set of right types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RoleAssignmentKind {
    /// Context-free assignment.
    Direct,
    /// Program assignment at a supervisory node or at the home facility.
    Supervision,
    /// Assignment at one warehouse.
    Fulfillment,
}

impl RoleAssignmentKind {
    /// Returns a stable storage value for this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Supervision => "supervision",
            Self::Fulfillment => "fulfillment",
        }
    }

    /// Returns the right types a role must carry to be assigned with this kind.
    #[must_use]
    pub fn acceptable_right_types(&self) -> &'static [RightType] {
        match self {
            Self::Direct => &[RightType::GeneralAdmin, RightType::Reports],
            Self::Supervision => &[RightType::Supervision],
            Self::Fulfillment => &[RightType::OrderFulfillment],
        }
    }

    /// Returns whether roles of the right type may be assigned with this kind.
    #[must_use]
    pub fn accepts(&self, right_type: RightType) -> bool {
        self.acceptable_right_types().contains(&right_type)
    }
}

impl FromStr for RoleAssignmentKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "direct" => Ok(Self::Direct),
            "supervision" => Ok(Self::Supervision),
            "fulfillment" => Ok(Self::Fulfillment),
            _ => Err(AppError::Validation(format!(
                "unknown role assignment kind '{value}'"
            ))),
        }
    }
}

/// Context carried by an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentContext {
    /// No context.
    Direct,
    /// Supervision of a program. No node means home facility supervision.
    Supervision {
        /// Program where the role applies.
        program: ProgramId,
        /// Node where the role applies.
        supervisory_node: Option<SupervisoryNodeId>,
    },
    /// Fulfillment at a warehouse.
    Fulfillment {
        /// Warehouse facility where the role applies.
        warehouse: FacilityId,
    },
}

impl AssignmentContext {
    /// Returns the variant kind of this context.
    #[must_use]
    pub fn kind(&self) -> RoleAssignmentKind {
        match self {
            Self::Direct => RoleAssignmentKind::Direct,
            Self::Supervision { .. } => RoleAssignmentKind::Supervision,
            Self::Fulfillment { .. } => RoleAssignmentKind::Fulfillment,
        }
    }
}

/// Role bound to a user in a context.
///
/// Equality and hashing only look at the role and the user. A user holding
/// the same role in two contexts therefore holds one assignment as far as
/// sets are concerned.
#[derive(Debug, Clone)]
pub struct RoleAssignment {
    role: Arc<Role>,
    user_id: UserId,
    context: AssignmentContext,
}

impl RoleAssignment {
    /// Creates a context-free assignment for general admin or reports roles.
    pub fn direct(role: Arc<Role>, user_id: UserId) -> AppResult<Self> {
        Self::new(role, user_id, AssignmentContext::Direct)
    }

    /// Creates a supervision assignment for a program, optionally at a node.
    pub fn supervision(
        role: Arc<Role>,
        user_id: UserId,
        program: ProgramId,
        supervisory_node: Option<SupervisoryNodeId>,
    ) -> AppResult<Self> {
        Self::new(
            role,
            user_id,
            AssignmentContext::Supervision {
                program,
                supervisory_node,
            },
        )
    }

    /// Creates a fulfillment assignment at a warehouse.
    pub fn fulfillment(role: Arc<Role>, user_id: UserId, warehouse: &Facility) -> AppResult<Self> {
        if !warehouse.is_warehouse() {
            return Err(AppError::Validation(format!(
                "facility '{}' has type '{}' and cannot be used as a fulfillment warehouse",
                warehouse.code(),
                warehouse.type_code()
            )));
        }

        Self::new(
            role,
            user_id,
            AssignmentContext::Fulfillment {
                warehouse: warehouse.id(),
            },
        )
    }

    fn new(role: Arc<Role>, user_id: UserId, context: AssignmentContext) -> AppResult<Self> {
        let kind = context.kind();
        if !kind.accepts(role.right_type()) {
            return Err(AppError::RightTypeMismatch(format!(
                "role '{}' has right type '{}' which {} assignments do not accept",
                role.name(),
                role.right_type(),
                kind.as_str()
            )));
        }

        Ok(Self {
            role,
            user_id,
            context,
        })
    }

    /// Returns the assigned role.
    #[must_use]
    pub fn role(&self) -> &Role {
        self.role.as_ref()
    }

    /// Returns the user holding the assignment.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the assignment context.
    #[must_use]
    pub fn context(&self) -> &AssignmentContext {
        &self.context
    }

    /// Returns the assignment kind.
    #[must_use]
    pub fn kind(&self) -> RoleAssignmentKind {
        self.context.kind()
    }

    /// Returns the program of a supervision assignment.
    #[must_use]
    pub fn program(&self) -> Option<ProgramId> {
        match self.context {
            AssignmentContext::Supervision { program, .. } => Some(program),
            _ => None,
        }
    }

    /// Returns the node of a supervision assignment.
    #[must_use]
    pub fn supervisory_node(&self) -> Option<SupervisoryNodeId> {
        match self.context {
            AssignmentContext::Supervision {
                supervisory_node, ..
            } => supervisory_node,
            _ => None,
        }
    }

    /// Returns the warehouse of a fulfillment assignment.
    #[must_use]
    pub fn warehouse(&self) -> Option<FacilityId> {
        match self.context {
            AssignmentContext::Fulfillment { warehouse } => Some(warehouse),
            _ => None,
        }
    }

    /// Returns whether this assignment satisfies the query.
    #[must_use]
    pub fn has_right(&self, query: &RightQuery) -> bool {
        if !self.role.contains(query.right()) {
            return false;
        }

        match self.context {
            AssignmentContext::Direct => true,
            AssignmentContext::Supervision {
                program,
                supervisory_node,
            } => {
                let node_matches = match (supervisory_node, query.supervisory_node()) {
                    (None, None) => true,
                    (Some(assigned), Some(requested)) => assigned == requested,
                    _ => false,
                };

                query.program() == Some(program) && node_matches
            }
            AssignmentContext::Fulfillment { warehouse } => query.warehouse() == Some(warehouse),
        }
    }
}

impl PartialEq for RoleAssignment {
    fn eq(&self, other: &Self) -> bool {
        self.role.name() == other.role.name() && self.user_id == other.user_id
    }
}

impl Eq for RoleAssignment {}

impl Hash for RoleAssignment {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.role.name().hash(state);
        self.user_id.hash(state);
    }
}

//! Transitive closure of facilities supervised by a supervisory node.
//!
//! A node supervises the members of its own requisition group plus whatever
//! every descendant node supervises. The walk keeps track of visited nodes so
//! a corrupted hierarchy that loops back on itself still terminates; such
//! loops and dangling references are reported as [`HierarchyGap`] values and
//! contribute no facilities.

use std::collections::{BTreeSet, HashSet};
use std::str::FromStr;

use refdata_core::AppError;
use serde::{Deserialize, Serialize};

use crate::{FacilityId, ProgramId, RequisitionGroupId, SupervisionHierarchy, SupervisoryNodeId};

/// Decides whether program support narrows the supervised facility set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramScope {
    /// Every member of every reachable requisition group is supervised.
    #[default]
    Unrestricted,
    /// Only groups scheduling the program, and only members supporting it.
    SupportedOnly,
}

impl ProgramScope {
    /// Returns a stable configuration value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unrestricted => "unrestricted",
            Self::SupportedOnly => "supported_only",
        }
    }
}

impl FromStr for ProgramScope {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "unrestricted" => Ok(Self::Unrestricted),
            "supported_only" => Ok(Self::SupportedOnly),
            _ => Err(AppError::Validation(format!(
                "unknown program scope '{value}'"
            ))),
        }
    }
}

/// Part of the hierarchy that could not be resolved during expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HierarchyGap {
    /// A referenced node is not present.
    MissingNode {
        /// Node that was referenced.
        node: SupervisoryNodeId,
    },
    /// A node references a requisition group that is not present.
    MissingRequisitionGroup {
        /// Node holding the reference.
        node: SupervisoryNodeId,
        /// Group that was referenced.
        requisition_group: RequisitionGroupId,
    },
    /// Walking down from the root led back to a node already on the path.
    Cycle {
        /// Node closing the loop.
        node: SupervisoryNodeId,
    },
    /// The root resolved cleanly but supervises no facility.
    NoFacilities {
        /// Root of the expansion.
        node: SupervisoryNodeId,
    },
}

impl std::fmt::Display for HierarchyGap {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingNode { node } => write!(formatter, "supervisory node '{node}' not found"),
            Self::MissingRequisitionGroup {
                node,
                requisition_group,
            } => write!(
                formatter,
                "requisition group '{requisition_group}' of supervisory node '{node}' not found"
            ),
            Self::Cycle { node } => {
                write!(formatter, "supervisory node '{node}' is part of a cycle")
            }
            Self::NoFacilities { node } => {
                write!(formatter, "supervisory node '{node}' supervises no facility")
            }
        }
    }
}

/// Facilities reached from one node plus any gaps met on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HierarchyExpansion {
    /// Supervised facilities.
    pub facilities: BTreeSet<FacilityId>,
    /// Unresolved parts of the hierarchy.
    pub gaps: Vec<HierarchyGap>,
}

/// Computes supervised facility sets over a hierarchy snapshot.
#[derive(Debug, Clone, Copy)]
pub struct HierarchyExpander<'a> {
    hierarchy: &'a SupervisionHierarchy,
    scope: ProgramScope,
}

impl<'a> HierarchyExpander<'a> {
    /// Creates an expander over the hierarchy.
    #[must_use]
    pub fn new(hierarchy: &'a SupervisionHierarchy, scope: ProgramScope) -> Self {
        Self { hierarchy, scope }
    }

    /// Returns every facility supervised by the node and its descendants.
    #[must_use]
    pub fn supervised_facilities(
        &self,
        root: SupervisoryNodeId,
        program: Option<ProgramId>,
    ) -> HierarchyExpansion {
        let mut expansion = HierarchyExpansion::default();
        let mut visited = HashSet::new();
        let mut path = HashSet::new();

        self.visit(root, program, &mut visited, &mut path, &mut expansion);

        if expansion.facilities.is_empty() && expansion.gaps.is_empty() {
            expansion.gaps.push(HierarchyGap::NoFacilities { node: root });
        }

        expansion
    }

    fn visit(
        &self,
        node_id: SupervisoryNodeId,
        program: Option<ProgramId>,
        visited: &mut HashSet<SupervisoryNodeId>,
        path: &mut HashSet<SupervisoryNodeId>,
        expansion: &mut HierarchyExpansion,
    ) {
        if path.contains(&node_id) {
            expansion.gaps.push(HierarchyGap::Cycle { node: node_id });
            return;
        }
        // reached through another branch already
        if !visited.insert(node_id) {
            return;
        }

        let Some(node) = self.hierarchy.node(node_id) else {
            expansion
                .gaps
                .push(HierarchyGap::MissingNode { node: node_id });
            return;
        };

        if let Some(group_id) = node.requisition_group() {
            self.collect_group_members(node_id, group_id, program, expansion);
        }

        path.insert(node_id);
        for child_id in node.child_nodes() {
            self.visit(*child_id, program, visited, path, expansion);
        }
        path.remove(&node_id);
    }

    fn collect_group_members(
        &self,
        node_id: SupervisoryNodeId,
        group_id: RequisitionGroupId,
        program: Option<ProgramId>,
        expansion: &mut HierarchyExpansion,
    ) {
        let Some(group) = self.hierarchy.requisition_group(group_id) else {
            expansion.gaps.push(HierarchyGap::MissingRequisitionGroup {
                node: node_id,
                requisition_group: group_id,
            });
            return;
        };

        match (self.scope, program) {
            (ProgramScope::SupportedOnly, Some(program_id)) => {
                if !group.supports(program_id) {
                    return;
                }
                expansion.facilities.extend(
                    group
                        .member_facilities()
                        .iter()
                        .copied()
                        .filter(|facility_id| {
                            self.hierarchy
                                .facility(*facility_id)
                                .is_some_and(|facility| facility.supports(program_id))
                        }),
                );
            }
            _ => expansion
                .facilities
                .extend(group.member_facilities().iter().copied()),
        }
    }
}

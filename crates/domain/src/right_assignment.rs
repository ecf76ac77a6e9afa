use serde::{Deserialize, Serialize};

use crate::{FacilityId, ProgramId, UserId};

/// Flattened permission row derived from role assignments.
///
/// Rows carry no surrogate identity; two rows with the same tuple are the
/// same assignment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RightAssignment {
    /// User holding the right.
    pub user_id: UserId,
    /// Name of the granted right.
    pub right_name: String,
    /// Facility where the right applies, if scoped.
    pub facility_id: Option<FacilityId>,
    /// Program where the right applies, if scoped.
    pub program_id: Option<ProgramId>,
}

impl RightAssignment {
    /// Creates a row.
    #[must_use]
    pub fn new(
        user_id: UserId,
        right_name: impl Into<String>,
        facility_id: Option<FacilityId>,
        program_id: Option<ProgramId>,
    ) -> Self {
        Self {
            user_id,
            right_name: right_name.into(),
            facility_id,
            program_id,
        }
    }
}

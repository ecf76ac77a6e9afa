use std::collections::BTreeSet;

use refdata_core::{AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::{FacilityId, ProgramId};

/// Facility type code that marks a facility as a warehouse.
pub const WAREHOUSE_FACILITY_TYPE: &str = "warehouse";

/// Facility slice needed for access evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facility {
    id: FacilityId,
    code: NonEmptyString,
    name: String,
    type_code: NonEmptyString,
    supported_programs: BTreeSet<ProgramId>,
}

impl Facility {
    /// Creates a facility from stored values.
    pub fn new(
        id: FacilityId,
        code: impl Into<String>,
        name: impl Into<String>,
        type_code: impl Into<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            id,
            code: NonEmptyString::new(code)?,
            name: name.into(),
            type_code: NonEmptyString::new(type_code)?,
            supported_programs: BTreeSet::new(),
        })
    }

    /// Returns the same facility with its supported programs replaced.
    #[must_use]
    pub fn with_supported_programs(
        mut self,
        programs: impl IntoIterator<Item = ProgramId>,
    ) -> Self {
        self.supported_programs = programs.into_iter().collect();
        self
    }

    /// Returns the facility identifier.
    #[must_use]
    pub fn id(&self) -> FacilityId {
        self.id
    }

    /// Returns the facility code.
    #[must_use]
    pub fn code(&self) -> &str {
        self.code.as_str()
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the facility type code.
    #[must_use]
    pub fn type_code(&self) -> &str {
        self.type_code.as_str()
    }

    /// Returns whether the facility is typed as a warehouse.
    #[must_use]
    pub fn is_warehouse(&self) -> bool {
        self.type_code.as_str() == WAREHOUSE_FACILITY_TYPE
    }

    /// Returns whether the facility supports the program.
    #[must_use]
    pub fn supports(&self, program_id: ProgramId) -> bool {
        self.supported_programs.contains(&program_id)
    }

    /// Returns the programs this facility supports.
    #[must_use]
    pub fn supported_programs(&self) -> &BTreeSet<ProgramId> {
        &self.supported_programs
    }
}

#[cfg(test)]
mod tests {
    use super::Facility;
    use crate::{FacilityId, ProgramId};

    #[test]
    fn warehouse_type_is_detected() {
        let warehouse = Facility::new(FacilityId::new(), "W01", "Central", "warehouse");
        let clinic = Facility::new(FacilityId::new(), "C01", "Clinic", "health_center");

        assert!(warehouse.map(|value| value.is_warehouse()).unwrap_or(false));
        assert!(!clinic.map(|value| value.is_warehouse()).unwrap_or(true));
    }

    #[test]
    fn supports_checks_program_membership() {
        let program_id = ProgramId::new();
        let facility = Facility::new(FacilityId::new(), "C01", "Clinic", "health_center")
            .map(|value| value.with_supported_programs([program_id]))
            .unwrap_or_else(|_| unreachable!());

        assert!(facility.supports(program_id));
        assert!(!facility.supports(ProgramId::new()));
    }
}

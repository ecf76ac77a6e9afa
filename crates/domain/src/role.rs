use std::collections::BTreeMap;

use refdata_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::{Right, RightType, RoleId};

/// Named set of rights that all share one right type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    id: RoleId,
    name: NonEmptyString,
    description: Option<String>,
    rights: BTreeMap<String, Right>,
}

impl Role {
    /// Creates a role grouping the provided rights.
    pub fn new(
        name: impl Into<String>,
        rights: impl IntoIterator<Item = Right>,
    ) -> AppResult<Self> {
        Self::with_id(RoleId::new(), name, None, rights)
    }

    /// Creates a role from stored values.
    pub fn with_id(
        id: RoleId,
        name: impl Into<String>,
        description: Option<String>,
        rights: impl IntoIterator<Item = Right>,
    ) -> AppResult<Self> {
        let name = NonEmptyString::new(name)?;
        let rights = homogeneous_rights(name.as_str(), rights.into_iter().collect())?;

        Ok(Self {
            id,
            name,
            description,
            rights,
        })
    }

    /// Returns the role identifier.
    #[must_use]
    pub fn id(&self) -> RoleId {
        self.id
    }

    /// Returns the unique role name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the type shared by every right in the role.
    #[must_use]
    pub fn right_type(&self) -> RightType {
        // construction and mutation never leave the set empty
        self.rights
            .values()
            .next()
            .map(Right::right_type)
            .unwrap_or(RightType::GeneralAdmin)
    }

    /// Iterates the rights in name order.
    pub fn rights(&self) -> impl Iterator<Item = &Right> {
        self.rights.values()
    }

    /// Iterates the right names in order.
    pub fn right_names(&self) -> impl Iterator<Item = &str> {
        self.rights.keys().map(String::as_str)
    }

    /// Replaces the role rights.
    pub fn group(&mut self, rights: impl IntoIterator<Item = Right>) -> AppResult<()> {
        self.rights = homogeneous_rights(self.name.as_str(), rights.into_iter().collect())?;
        Ok(())
    }

    /// Adds rights to the role. The role is left unchanged on failure.
    pub fn add(&mut self, rights: impl IntoIterator<Item = Right>) -> AppResult<()> {
        let mut combined: Vec<Right> = self.rights.values().cloned().collect();
        combined.extend(rights);
        self.rights = homogeneous_rights(self.name.as_str(), combined)?;
        Ok(())
    }

    /// Returns whether the right is a member of the role.
    #[must_use]
    pub fn contains(&self, right: &Right) -> bool {
        self.rights.contains_key(right.name())
    }
}

fn homogeneous_rights(role_name: &str, rights: Vec<Right>) -> AppResult<BTreeMap<String, Right>> {
    let Some(first) = rights.first() else {
        return Err(AppError::Validation(format!(
            "role '{role_name}' must have at least one right"
        )));
    };

    let right_type = first.right_type();
    if let Some(mismatch) = rights.iter().find(|right| right.right_type() != right_type) {
        return Err(AppError::RightTypeMismatch(format!(
            "role '{role_name}' cannot mix right '{}' of type '{}' with type '{right_type}'",
            mismatch.name(),
            mismatch.right_type()
        )));
    }

    Ok(rights
        .into_iter()
        .map(|right| (right.name().to_owned(), right))
        .collect())
}

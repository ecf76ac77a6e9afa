use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use refdata_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::RightId;

/// Category of a right. Decides which rights may share a role and which
/// assignment kinds may carry that role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RightType {
    /// Administrative rights that apply everywhere.
    GeneralAdmin,
    /// Reporting rights that apply everywhere.
    Reports,
    /// Rights exercised per program and supervised facility.
    Supervision,
    /// Rights exercised at one warehouse.
    OrderFulfillment,
}

impl RightType {
    /// Returns a stable storage value for this right type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GeneralAdmin => "GENERAL_ADMIN",
            Self::Reports => "REPORTS",
            Self::Supervision => "SUPERVISION",
            Self::OrderFulfillment => "ORDER_FULFILLMENT",
        }
    }

    /// Returns all known right types.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[RightType] = &[
            RightType::GeneralAdmin,
            RightType::Reports,
            RightType::Supervision,
            RightType::OrderFulfillment,
        ];

        ALL
    }
}

impl FromStr for RightType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "GENERAL_ADMIN" => Ok(Self::GeneralAdmin),
            "REPORTS" => Ok(Self::Reports),
            "SUPERVISION" => Ok(Self::Supervision),
            "ORDER_FULFILLMENT" => Ok(Self::OrderFulfillment),
            _ => Err(AppError::Validation(format!(
                "unknown right type value '{value}'"
            ))),
        }
    }
}

impl std::fmt::Display for RightType {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Atomic named permission.
///
/// Two rights are the same right when their names are equal, whatever their
/// ids or descriptions say.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Right {
    id: RightId,
    name: NonEmptyString,
    right_type: RightType,
    description: Option<String>,
    attachments: BTreeSet<String>,
}

impl Right {
    /// Creates a right with a fresh identifier.
    pub fn new(name: impl Into<String>, right_type: RightType) -> AppResult<Self> {
        Self::with_id(RightId::new(), name, right_type, None)
    }

    /// Creates a right from stored values.
    pub fn with_id(
        id: RightId,
        name: impl Into<String>,
        right_type: RightType,
        description: Option<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            id,
            name: NonEmptyString::new(name)?,
            right_type,
            description,
            attachments: BTreeSet::new(),
        })
    }

    /// Returns the right identifier.
    #[must_use]
    pub fn id(&self) -> RightId {
        self.id
    }

    /// Returns the unique right name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the right category.
    #[must_use]
    pub fn right_type(&self) -> RightType {
        self.right_type
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns names of rights attached to this one.
    #[must_use]
    pub fn attachments(&self) -> &BTreeSet<String> {
        &self.attachments
    }

    /// Attaches related rights one-way. Rights of another type are skipped.
    pub fn attach<'a>(&mut self, attachments: impl IntoIterator<Item = &'a Right>) {
        for attachment in attachments {
            if attachment.right_type == self.right_type && attachment.name != self.name {
                self.attachments.insert(attachment.name().to_owned());
            }
        }
    }

    /// Removes all attachments.
    pub fn clear_attachments(&mut self) {
        self.attachments.clear();
    }
}

impl PartialEq for Right {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Right {}

impl Hash for Right {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

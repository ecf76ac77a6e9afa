//! UUID-backed identifiers for reference-data records.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID value.
            #[must_use]
            pub fn from_uuid(value: Uuid) -> Self {
                Self(value)
            }

            /// Returns the underlying UUID value.
            #[must_use]
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }
    };
}

uuid_identifier!(
    /// Unique identifier for a right record.
    RightId
);
uuid_identifier!(
    /// Unique identifier for a role record.
    RoleId
);
uuid_identifier!(
    /// Unique identifier for a user record.
    UserId
);
uuid_identifier!(
    /// Unique identifier for a program.
    ProgramId
);
uuid_identifier!(
    /// Unique identifier for a facility.
    FacilityId
);
uuid_identifier!(
    /// Unique identifier for a supervisory node.
    SupervisoryNodeId
);
uuid_identifier!(
    /// Unique identifier for a requisition group.
    RequisitionGroupId
);

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{FacilityId, UserId};

    #[test]
    fn identifier_formats_as_uuid() {
        assert_eq!(UserId::new().to_string().len(), 36);
    }

    #[test]
    fn identifier_preserves_uuid() {
        let value = Uuid::new_v4();
        assert_eq!(FacilityId::from_uuid(value).as_uuid(), value);
    }
}

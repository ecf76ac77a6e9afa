mod repositories;
mod staging;

pub use repositories::{RightAssignmentRepository, RoleAssignmentRepository};
pub use staging::RebuildStaging;

//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_right_assignment_repository;
mod in_memory_role_assignment_repository;
mod postgres_right_assignment_repository;
mod postgres_role_assignment_repository;

pub use in_memory_right_assignment_repository::InMemoryRightAssignmentRepository;
pub use in_memory_role_assignment_repository::InMemoryRoleAssignmentRepository;
pub use postgres_right_assignment_repository::PostgresRightAssignmentRepository;
pub use postgres_role_assignment_repository::PostgresRoleAssignmentRepository;

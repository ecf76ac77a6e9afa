//! Application services and ports.

#![forbid(unsafe_code)]

mod authorization_service;
mod hierarchy_cache;
mod right_assignment_ports;
mod right_assignment_service;
mod worker_pool;

pub use authorization_service::AuthorizationService;
pub use hierarchy_cache::{HierarchyCacheStats, HierarchyExpansionCache};
pub use right_assignment_ports::{
    RebuildStaging, RightAssignmentRepository, RoleAssignmentRepository,
};
pub use right_assignment_service::{RebuildReport, RightAssignmentConfig, RightAssignmentService};
pub use worker_pool::{WorkerPool, WorkerPoolConfig, WorkerPoolOutcome};

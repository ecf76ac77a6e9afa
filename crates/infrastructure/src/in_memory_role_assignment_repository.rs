use std::collections::HashMap;

use async_trait::async_trait;
use refdata_application::RoleAssignmentRepository;
use refdata_core::AppResult;
use refdata_domain::{SupervisionHierarchy, User, UserId};
use tokio::sync::RwLock;

/// In-memory source of users and the supervision hierarchy.
#[derive(Debug, Default)]
pub struct InMemoryRoleAssignmentRepository {
    users: RwLock<HashMap<UserId, User>>,
    hierarchy: RwLock<SupervisionHierarchy>,
}

impl InMemoryRoleAssignmentRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a user.
    pub async fn save_user(&self, user: User) {
        self.users.write().await.insert(user.id(), user);
    }

    /// Replaces the supervision hierarchy snapshot.
    pub async fn replace_hierarchy(&self, hierarchy: SupervisionHierarchy) {
        *self.hierarchy.write().await = hierarchy;
    }
}

#[async_trait]
impl RoleAssignmentRepository for InMemoryRoleAssignmentRepository {
    async fn list_users_with_role_assignments(&self) -> AppResult<Vec<User>> {
        let mut users: Vec<User> = self
            .users
            .read()
            .await
            .values()
            .filter(|user| user.role_assignment_count() > 0)
            .cloned()
            .collect();
        users.sort_by(|left, right| left.username().cmp(right.username()));
        Ok(users)
    }

    async fn find_user_with_role_assignments(&self, user_id: UserId) -> AppResult<Option<User>> {
        Ok(self.users.read().await.get(&user_id).cloned())
    }

    async fn load_supervision_hierarchy(&self) -> AppResult<SupervisionHierarchy> {
        Ok(self.hierarchy.read().await.clone())
    }
}

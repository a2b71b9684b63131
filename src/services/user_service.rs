use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::auth::Role;
use crate::database::models::User;
use crate::database::{UserFilter, UserStore};

use super::auth_service::AuthError;

/// User administration on top of the credential store.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    pub async fn list(&self, filter: &UserFilter) -> Result<(Vec<User>, i64), AuthError> {
        Ok(self.users.list(filter).await?)
    }

    pub async fn update_role(&self, id: Uuid, role: Role) -> Result<User, AuthError> {
        let user = self.users.update_role(id, role).await?.ok_or(AuthError::NotFound)?;
        info!("User {} role set to {}", id, role);
        Ok(user)
    }

    pub async fn set_active(&self, id: Uuid, active: bool) -> Result<User, AuthError> {
        let user = self.users.set_active(id, active).await?.ok_or(AuthError::NotFound)?;
        info!("User {} active={}", id, active);
        Ok(user)
    }

    pub async fn update_basic(&self, id: Uuid, name: &str) -> Result<User, AuthError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::InvalidInput("name is required".to_string()));
        }
        self.users
            .update_basic(id, name)
            .await?
            .ok_or(AuthError::NotFound)
    }

    pub async fn ping(&self) -> Result<(), AuthError> {
        Ok(self.users.ping().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryUserStore;
    use crate::database::models::NewUser;

    async fn seeded() -> (UserService, Vec<User>) {
        let store = Arc::new(MemoryUserStore::new());
        let mut created = Vec::new();
        for (email, role) in [
            ("ann@x.io", Role::Admin),
            ("bob@x.io", Role::Agent),
            ("cid@x.io", Role::EndUser),
        ] {
            created.push(
                store
                    .create(NewUser {
                        email: email.into(),
                        name: email.into(),
                        role,
                        password_hash: "x".into(),
                    })
                    .await
                    .unwrap(),
            );
        }
        (UserService::new(store), created)
    }

    #[tokio::test]
    async fn list_filters_and_counts() {
        let (service, _) = seeded().await;
        let filter = UserFilter {
            role: Some(Role::Agent),
            limit: 20,
            ..Default::default()
        };
        let (users, total) = service.list(&filter).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(users[0].email, "bob@x.io");

        let filter = UserFilter {
            q: "X.IO".into(),
            limit: 2,
            ..Default::default()
        };
        let (users, total) = service.list(&filter).await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn role_and_active_changes_persist() {
        let (service, users) = seeded().await;
        let cid = &users[2];

        let promoted = service.update_role(cid.id, Role::Supervisor).await.unwrap();
        assert_eq!(promoted.role, Role::Supervisor);

        let disabled = service.set_active(cid.id, false).await.unwrap();
        assert!(!disabled.active);

        let err = service.update_role(Uuid::new_v4(), Role::Admin).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let (service, users) = seeded().await;
        let err = service.update_basic(users[0].id, "  ").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidInput(_)));

        let renamed = service.update_basic(users[0].id, " Ann ").await.unwrap();
        assert_eq!(renamed.name, "Ann");
    }
}

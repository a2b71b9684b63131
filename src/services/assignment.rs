//! Assignee resolution for new tickets.
//!
//! A ticket opened by an `end_user` must be assigned to an active admin at
//! creation time. The admin is found by asking a ranked list of lookup
//! strategies in order; the first that answers wins.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::{Identity, Role};
use crate::database::AdminLookup;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AssignmentError {
    #[error("no active admin available for assignment")]
    NoActiveAdmin,
}

#[derive(Clone, Default)]
pub struct RankedAdminLookup {
    strategies: Vec<Arc<dyn AdminLookup>>,
}

impl RankedAdminLookup {
    pub fn new(strategies: Vec<Arc<dyn AdminLookup>>) -> Self {
        Self { strategies }
    }

    pub fn then(mut self, strategy: Arc<dyn AdminLookup>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Ask each strategy in rank order. A failing strategy is logged and
    /// skipped rather than aborting the lookup.
    pub async fn resolve(&self) -> Option<Uuid> {
        for strategy in &self.strategies {
            match strategy.first_active_admin_id().await {
                Ok(Some(id)) => {
                    debug!("Admin lookup '{}' resolved {}", strategy.name(), id);
                    return Some(id);
                }
                Ok(None) => debug!("Admin lookup '{}' found no active admin", strategy.name()),
                Err(e) => warn!("Admin lookup '{}' failed: {}", strategy.name(), e),
            }
        }
        None
    }
}

/// Decide the assignee a new ticket is stored with.
pub async fn resolve_assignee(
    identity: &Identity,
    requested: Option<Uuid>,
    admins: &RankedAdminLookup,
) -> Result<Option<Uuid>, AssignmentError> {
    match identity.role {
        Role::EndUser => {
            let admin = admins.resolve().await.ok_or(AssignmentError::NoActiveAdmin)?;
            if requested.is_some_and(|r| r != admin) {
                debug!("Overriding end-user requested assignee with admin {}", admin);
            }
            Ok(Some(admin))
        }
        Role::Admin => Ok(requested.or(Some(identity.user_id))),
        Role::Agent | Role::Supervisor => Ok(requested),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::StoreError;
    use async_trait::async_trait;
    use chrono::Utc;

    struct Fixed(Option<Uuid>);

    #[async_trait]
    impl AdminLookup for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn first_active_admin_id(&self) -> Result<Option<Uuid>, StoreError> {
            Ok(self.0)
        }
    }

    struct Broken;

    #[async_trait]
    impl AdminLookup for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn first_active_admin_id(&self) -> Result<Option<Uuid>, StoreError> {
            Err(StoreError::NotFound("users".into()))
        }
    }

    fn identity(role: Role) -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            role,
            issued_at: Utc::now(),
            expires_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn end_user_is_forced_to_admin() {
        let admin = Uuid::new_v4();
        let admins = RankedAdminLookup::default().then(Arc::new(Fixed(Some(admin))));
        let chosen = resolve_assignee(&identity(Role::EndUser), Some(Uuid::new_v4()), &admins)
            .await
            .unwrap();
        assert_eq!(chosen, Some(admin));
    }

    #[tokio::test]
    async fn end_user_without_admin_fails() {
        let admins = RankedAdminLookup::default().then(Arc::new(Fixed(None)));
        let err = resolve_assignee(&identity(Role::EndUser), None, &admins)
            .await
            .unwrap_err();
        assert_eq!(err, AssignmentError::NoActiveAdmin);
        assert_eq!(err.to_string(), "no active admin available for assignment");
    }

    #[tokio::test]
    async fn failing_strategy_falls_through_to_next() {
        let admin = Uuid::new_v4();
        let admins = RankedAdminLookup::new(vec![Arc::new(Broken), Arc::new(Fixed(Some(admin)))]);
        assert_eq!(admins.resolve().await, Some(admin));
    }

    #[tokio::test]
    async fn admin_defaults_to_self_and_staff_pass_through() {
        let admins = RankedAdminLookup::default();
        let admin = identity(Role::Admin);
        assert_eq!(
            resolve_assignee(&admin, None, &admins).await.unwrap(),
            Some(admin.user_id)
        );

        let other = Uuid::new_v4();
        assert_eq!(
            resolve_assignee(&admin, Some(other), &admins).await.unwrap(),
            Some(other)
        );
        assert_eq!(
            resolve_assignee(&identity(Role::Agent), None, &admins).await.unwrap(),
            None
        );
        assert_eq!(
            resolve_assignee(&identity(Role::Supervisor), Some(other), &admins)
                .await
                .unwrap(),
            Some(other)
        );
    }
}

//! Route guards as pure predicates over the caller's identity.
//!
//! Nothing here knows about HTTP; `middleware::guard` adapts a [`Guard`] to
//! an axum route layer.

use uuid::Uuid;

use super::{Identity, Role};

/// Roles allowed to administer users.
pub const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// Roles allowed to edit tickets. End users may only comment.
pub const TICKET_EDITORS: &[Role] = &[Role::Admin, Role::Agent, Role::Supervisor];

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("forbidden")]
    Forbidden,
}

#[derive(Debug, Clone, Copy)]
pub enum Guard {
    Authenticated,
    RoleIn(&'static [Role]),
    SelfOrRoleIn(&'static [Role]),
}

impl Guard {
    /// Decide for `identity`; `subject` is the path-supplied user id, if any.
    pub fn check<'a>(
        &self,
        identity: Option<&'a Identity>,
        subject: Option<&str>,
    ) -> Result<&'a Identity, AccessError> {
        match self {
            Guard::Authenticated => require_authenticated(identity),
            Guard::RoleIn(allowed) => require_role_in(identity, allowed),
            Guard::SelfOrRoleIn(allowed) => {
                require_self_or_role_in(identity, subject.unwrap_or_default(), allowed)
            }
        }
    }
}

pub fn require_authenticated(identity: Option<&Identity>) -> Result<&Identity, AccessError> {
    identity.ok_or(AccessError::Unauthenticated)
}

pub fn require_role_in<'a>(
    identity: Option<&'a Identity>,
    allowed: &[Role],
) -> Result<&'a Identity, AccessError> {
    let identity = require_authenticated(identity)?;
    if identity.role.is_in(allowed) {
        Ok(identity)
    } else {
        Err(AccessError::Forbidden)
    }
}

pub fn require_self_or_role_in<'a>(
    identity: Option<&'a Identity>,
    subject: &str,
    allowed: &[Role],
) -> Result<&'a Identity, AccessError> {
    let identity = require_authenticated(identity)?;
    if identity.role.is_in(allowed) {
        return Ok(identity);
    }
    match Uuid::parse_str(subject.trim()) {
        Ok(subject_id) if subject_id == identity.user_id => Ok(identity),
        _ => Err(AccessError::Forbidden),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn identity(role: Role) -> Identity {
        let now = Utc::now();
        Identity {
            user_id: Uuid::new_v4(),
            role,
            issued_at: now,
            expires_at: now + Duration::hours(1),
        }
    }

    #[test]
    fn authenticated_rejects_anonymous() {
        assert_eq!(
            Guard::Authenticated.check(None, None).unwrap_err(),
            AccessError::Unauthenticated
        );
        let caller = identity(Role::EndUser);
        assert!(Guard::Authenticated.check(Some(&caller), None).is_ok());
    }

    #[test]
    fn role_in_enumerates_roles_without_hierarchy() {
        let guard = Guard::RoleIn(&[Role::Supervisor]);
        let admin = identity(Role::Admin);
        let supervisor = identity(Role::Supervisor);

        // Admin is not implicitly a supervisor.
        assert_eq!(guard.check(Some(&admin), None).unwrap_err(), AccessError::Forbidden);
        assert!(guard.check(Some(&supervisor), None).is_ok());
        assert_eq!(guard.check(None, None).unwrap_err(), AccessError::Unauthenticated);
    }

    #[test]
    fn ticket_editors_exclude_end_users() {
        let guard = Guard::RoleIn(TICKET_EDITORS);
        for role in [Role::Admin, Role::Agent, Role::Supervisor] {
            assert!(guard.check(Some(&identity(role)), None).is_ok());
        }
        assert_eq!(
            guard.check(Some(&identity(Role::EndUser)), None).unwrap_err(),
            AccessError::Forbidden
        );
    }

    #[test]
    fn self_or_role_allows_self_and_listed_roles() {
        let guard = Guard::SelfOrRoleIn(ADMIN_ONLY);
        let caller = identity(Role::EndUser);
        let own_id = caller.user_id.to_string();
        let other_id = Uuid::new_v4().to_string();

        assert!(guard.check(Some(&caller), Some(own_id.as_str())).is_ok());
        assert!(guard.check(Some(&caller), Some(own_id.to_uppercase().as_str())).is_ok());
        assert_eq!(
            guard.check(Some(&caller), Some(other_id.as_str())).unwrap_err(),
            AccessError::Forbidden
        );
        assert_eq!(
            guard.check(Some(&caller), None).unwrap_err(),
            AccessError::Forbidden
        );

        let admin = identity(Role::Admin);
        assert!(guard.check(Some(&admin), Some(other_id.as_str())).is_ok());
        assert_eq!(
            guard.check(None, Some(own_id.as_str())).unwrap_err(),
            AccessError::Unauthenticated
        );
    }
}

//! Registration, login and password management.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::password::{self, PasswordError, MIN_PASSWORD_LEN};
use crate::auth::{Role, SessionCodec, TokenError};
use crate::database::models::{NewUser, User};
use crate::database::{StoreError, UserStore};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("email already registered")]
    EmailTaken,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user not found")]
    NotFound,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    sessions: Arc<SessionCodec>,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, sessions: Arc<SessionCodec>, bcrypt_cost: u32) -> Self {
        Self {
            users,
            sessions,
            bcrypt_cost,
        }
    }

    /// Self-registration. Whatever role was asked for, the account is an
    /// `end_user`.
    pub async fn register(
        &self,
        email: &str,
        name: &str,
        password: &str,
        requested_role: Option<&str>,
    ) -> Result<User, AuthError> {
        if let Some(role) = requested_role.filter(|r| !r.trim().eq_ignore_ascii_case("end_user")) {
            info!("Ignoring requested role '{}' on self-registration", role.trim());
        }
        self.create_user(email, name, password, Role::EndUser).await
    }

    /// Create an account with an explicit role. Used by registration and the
    /// `create-user` command.
    pub async fn create_user(
        &self,
        email: &str,
        name: &str,
        password: &str,
        role: Role,
    ) -> Result<User, AuthError> {
        let email = normalize_email(email);
        let name = name.trim().to_string();
        if email.is_empty() || name.is_empty() || password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::InvalidInput("invalid input".to_string()));
        }

        let password_hash = self.hash(password).await?;
        let user = self
            .users
            .create(NewUser {
                email,
                name,
                role,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => AuthError::EmailTaken,
                other => AuthError::Store(other),
            })?;

        info!("Created user {} ({})", user.id, user.role);
        Ok(user)
    }

    /// Check credentials and mint a session token.
    pub async fn login(&self, email: &str, password: &str) -> Result<(String, User), AuthError> {
        let email = normalize_email(email);
        let Some((user, hash)) = self.users.get_by_email(&email).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        if !self.verify(password, hash).await? {
            warn!("Failed login for user {}", user.id);
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.sessions.mint(user.id, user.role)?;
        info!("User {} logged in", user.id);
        Ok((token, user))
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::NotFound)
    }

    /// Replace a user's password. The new password is hashed here.
    pub async fn change_password(&self, user_id: Uuid, password: &str) -> Result<(), AuthError> {
        let hash = self.hash(password).await?;
        if !self.users.update_password_hash(user_id, &hash).await? {
            return Err(AuthError::NotFound);
        }
        info!("Password changed for user {}", user_id);
        Ok(())
    }

    async fn hash(&self, password: &str) -> Result<String, AuthError> {
        let password = password.to_string();
        let cost = self.bcrypt_cost;
        let hashed = tokio::task::spawn_blocking(move || password::hash_password(&password, cost))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))??;
        Ok(hashed)
    }

    async fn verify(&self, password: &str, hash: String) -> Result<bool, AuthError> {
        let password = password.to_string();
        tokio::task::spawn_blocking(move || password::verify_password(&password, &hash))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))
    }
}

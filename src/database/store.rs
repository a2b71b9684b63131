//! Storage contracts.
//!
//! A ticket backend always provides [`TicketStore`]. [`AdvancedTicketQuery`]
//! and [`TicketCounters`] are optional capabilities; which ones a backend
//! offers is declared once when the `TicketFacade` is built.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::filter::{TicketFilter, UserFilter};
use super::models::{Comment, NewTicket, NewUser, Ticket, User};
use crate::auth::Role;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A write pointed at a row that does not exist, e.g. an unknown assignee.
    #[error("Unknown reference: {0}")]
    UnknownReference(String),

    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Credential store: user records and their password hashes.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with [`StoreError::Conflict`] when the email is taken.
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;

    /// The user together with its password hash.
    async fn get_by_email(&self, email: &str) -> Result<Option<(User, String)>, StoreError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// A page of users matching `filter` and the total match count.
    async fn list(&self, filter: &UserFilter) -> Result<(Vec<User>, i64), StoreError>;

    async fn update_role(&self, id: Uuid, role: Role) -> Result<Option<User>, StoreError>;

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<User>, StoreError>;

    async fn update_basic(&self, id: Uuid, name: &str) -> Result<Option<User>, StoreError>;

    /// Returns false when no such user exists.
    async fn update_password_hash(&self, id: Uuid, hash: &str) -> Result<bool, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// The minimal ticket contract every backend supports.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Free-text over title/description plus an exact status match,
    /// newest activity first.
    async fn list(
        &self,
        q: &str,
        status: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Ticket>, StoreError>;

    /// The ticket with its comments in creation order.
    async fn get(&self, id: Uuid) -> Result<Option<Ticket>, StoreError>;

    async fn create(&self, ticket: NewTicket) -> Result<Ticket, StoreError>;

    /// Persist every mutable field of `ticket` and bump `updated_at`.
    async fn update(&self, ticket: &Ticket) -> Result<Ticket, StoreError>;

    async fn add_comment(&self, ticket_id: Uuid, text: &str) -> Result<Comment, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Filtered, sorted listing with a count over the same predicate. Returned
/// tickets carry assignee name/email.
#[async_trait]
pub trait AdvancedTicketQuery: Send + Sync {
    async fn list_filtered(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, StoreError>;

    async fn count_filtered(&self, filter: &TicketFilter) -> Result<i64, StoreError>;
}

/// Storage-side counters used by the report summary.
#[async_trait]
pub trait TicketCounters: Send + Sync {
    /// Count tickets whose status is (`inclusive`) or is not in `statuses`.
    async fn count_by_status(&self, statuses: &[&str], inclusive: bool) -> Result<i64, StoreError>;

    /// Closed tickets last touched at or after `since`.
    async fn count_resolved_since(&self, since: DateTime<Utc>) -> Result<i64, StoreError>;

    /// Open tickets with one of `priorities`.
    async fn count_open_by_priorities(&self, priorities: &[&str]) -> Result<i64, StoreError>;
}

/// One way of finding the earliest-created active admin.
#[async_trait]
pub trait AdminLookup: Send + Sync {
    fn name(&self) -> &'static str;

    async fn first_active_admin_id(&self) -> Result<Option<Uuid>, StoreError>;
}

//! In-process stores behind `tokio::sync::RwLock`. Selected with
//! `STORE_BACKEND=memory` and used by the test suite.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::filter::{clamp_page, SortColumn, SortDirection, TicketFilter, UserFilter};
use super::models::ticket::{alias_for, STATUS_NEW};
use super::models::{Comment, NewTicket, NewUser, Ticket, User};
use super::store::{
    AdminLookup, AdvancedTicketQuery, StoreError, TicketCounters, TicketStore, UserStore,
};
use crate::auth::Role;

struct StoredUser {
    user: User,
    password_hash: String,
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<Vec<StoredUser>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn modify<F>(&self, id: Uuid, apply: F) -> Option<User>
    where
        F: FnOnce(&mut StoredUser),
    {
        let mut users = self.users.write().await;
        let stored = users.iter_mut().find(|s| s.user.id == id)?;
        apply(stored);
        stored.user.updated_at = Utc::now();
        Some(stored.user.clone())
    }

    async fn display_fields(&self, id: Uuid) -> Option<(String, String)> {
        let users = self.users.read().await;
        users
            .iter()
            .find(|s| s.user.id == id)
            .map(|s| (s.user.name.clone(), s.user.email.clone()))
    }
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.iter().any(|s| s.user.email == user.email) {
            return Err(StoreError::Conflict(format!(
                "email {} already registered",
                user.email
            )));
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            role: user.role,
            active: true,
            created_at: now,
            updated_at: now,
        };
        users.push(StoredUser {
            user: created.clone(),
            password_hash: user.password_hash,
        });
        Ok(created)
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<(User, String)>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .find(|s| s.user.email == email)
            .map(|s| (s.user.clone(), s.password_hash.clone())))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|s| s.user.id == id).map(|s| s.user.clone()))
    }

    async fn list(&self, filter: &UserFilter) -> Result<(Vec<User>, i64), StoreError> {
        let (limit, offset) = filter.window();
        let q = filter.q.trim().to_lowercase();
        let users = self.users.read().await;

        let mut matched: Vec<User> = users
            .iter()
            .map(|s| &s.user)
            .filter(|u| q.is_empty() || contains_ci(&u.email, &q) || contains_ci(&u.name, &q))
            .filter(|u| filter.role.map_or(true, |r| u.role == r))
            .filter(|u| filter.active.map_or(true, |a| u.active == a))
            .cloned()
            .collect();
        matched.reverse();

        let total = matched.len() as i64;
        let page = matched
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn update_role(&self, id: Uuid, role: Role) -> Result<Option<User>, StoreError> {
        Ok(self.modify(id, |s| s.user.role = role).await)
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<User>, StoreError> {
        Ok(self.modify(id, |s| s.user.active = active).await)
    }

    async fn update_basic(&self, id: Uuid, name: &str) -> Result<Option<User>, StoreError> {
        Ok(self.modify(id, |s| s.user.name = name.to_string()).await)
    }

    async fn update_password_hash(&self, id: Uuid, hash: &str) -> Result<bool, StoreError> {
        Ok(self
            .modify(id, |s| s.password_hash = hash.to_string())
            .await
            .is_some())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl AdminLookup for MemoryUserStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn first_active_admin_id(&self) -> Result<Option<Uuid>, StoreError> {
        let users = self.users.read().await;
        // min_by_key keeps the first of equal keys, so insertion order breaks ties.
        Ok(users
            .iter()
            .map(|s| &s.user)
            .filter(|u| u.role == Role::Admin && u.active)
            .min_by_key(|u| u.created_at)
            .map(|u| u.id))
    }
}

#[derive(Default)]
struct TicketTable {
    seq: i64,
    tickets: Vec<Ticket>,
    comments: Vec<Comment>,
}

#[derive(Default)]
pub struct MemoryTicketStore {
    table: RwLock<TicketTable>,
    users: Option<Arc<MemoryUserStore>>,
}

impl MemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve assignee name/email from `users`, and reject assignees it
    /// does not know.
    pub fn with_users(users: Arc<MemoryUserStore>) -> Self {
        Self {
            table: RwLock::default(),
            users: Some(users),
        }
    }

    fn matches_text(ticket: &Ticket, q_lower: &str) -> bool {
        q_lower.is_empty()
            || contains_ci(&ticket.title, q_lower)
            || contains_ci(&ticket.description, q_lower)
    }

    fn matches(ticket: &Ticket, filter: &TicketFilter, q_lower: &str) -> bool {
        Self::matches_text(ticket, q_lower)
            && (filter.status.is_empty() || ticket.status == filter.status)
            && (filter.priority.is_empty() || ticket.priority == filter.priority)
            && (filter.category.is_empty() || ticket.category == filter.category)
            && filter.assignee.map_or(true, |a| ticket.assignee == Some(a))
    }

    fn compare(a: &Ticket, b: &Ticket, sort: SortColumn, order: SortDirection) -> Ordering {
        let ordering = match sort {
            SortColumn::CreatedAt => a.created_at.cmp(&b.created_at),
            SortColumn::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortColumn::Priority => a.priority.cmp(&b.priority),
        };
        match order {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }

    fn page(tickets: Vec<Ticket>, limit: i64, offset: i64) -> Vec<Ticket> {
        let (limit, offset) = clamp_page(limit, offset);
        tickets.into_iter().skip(offset as usize).take(limit as usize).collect()
    }

    async fn enrich(&self, mut ticket: Ticket) -> Ticket {
        if let (Some(users), Some(assignee)) = (&self.users, ticket.assignee) {
            if let Some((name, email)) = users.display_fields(assignee).await {
                ticket.assignee_name = Some(name);
                ticket.assignee_email = Some(email);
            }
        }
        ticket
    }

    /// Mirrors the assignee foreign key when a user store is attached.
    async fn check_assignee(&self, assignee: Option<Uuid>) -> Result<(), StoreError> {
        if let (Some(users), Some(id)) = (&self.users, assignee) {
            if users.get_by_id(id).await?.is_none() {
                return Err(StoreError::UnknownReference(format!("assignee {}", id)));
            }
        }
        Ok(())
    }

    /// Most recently inserted first, so stable sorts keep newer tickets ahead on ties.
    async fn newest_first(&self) -> Vec<Ticket> {
        let table = self.table.read().await;
        table.tickets.iter().rev().cloned().collect()
    }
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
    async fn list(
        &self,
        q: &str,
        status: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Ticket>, StoreError> {
        let q = q.trim().to_lowercase();
        let mut matched: Vec<Ticket> = self
            .newest_first()
            .await
            .into_iter()
            .filter(|t| Self::matches_text(t, &q))
            .filter(|t| status.is_empty() || t.status == status)
            .collect();
        matched.sort_by(|a, b| Self::compare(a, b, SortColumn::UpdatedAt, SortDirection::Desc));
        Ok(Self::page(matched, limit, offset))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Ticket>, StoreError> {
        let found = {
            let table = self.table.read().await;
            table.tickets.iter().find(|t| t.id == id).cloned().map(|mut t| {
                t.comments = table
                    .comments
                    .iter()
                    .filter(|c| c.ticket_id == id)
                    .cloned()
                    .collect();
                t
            })
        };
        match found {
            Some(ticket) => Ok(Some(self.enrich(ticket).await)),
            None => Ok(None),
        }
    }

    async fn create(&self, ticket: NewTicket) -> Result<Ticket, StoreError> {
        self.check_assignee(ticket.assignee).await?;
        let created = {
            let mut table = self.table.write().await;
            table.seq += 1;
            let now = Utc::now();
            let created = Ticket {
                id: Uuid::new_v4(),
                alias: alias_for(table.seq),
                title: ticket.title,
                description: ticket.description,
                category: ticket.category,
                priority: ticket.priority,
                status: STATUS_NEW.to_string(),
                assignee: ticket.assignee,
                department: ticket.department,
                created_by: ticket.created_by,
                created_at: now,
                updated_at: now,
                comments: Vec::new(),
                assignee_name: None,
                assignee_email: None,
            };
            table.tickets.push(created.clone());
            created
        };
        Ok(self.enrich(created).await)
    }

    async fn update(&self, ticket: &Ticket) -> Result<Ticket, StoreError> {
        self.check_assignee(ticket.assignee).await?;
        {
            let mut table = self.table.write().await;
            let stored = table
                .tickets
                .iter_mut()
                .find(|t| t.id == ticket.id)
                .ok_or_else(|| StoreError::NotFound(format!("ticket {}", ticket.id)))?;

            stored.title = ticket.title.clone();
            stored.description = ticket.description.clone();
            stored.category = ticket.category.clone();
            stored.priority = ticket.priority.clone();
            stored.status = ticket.status.clone();
            stored.assignee = ticket.assignee;
            stored.department = ticket.department.clone();
            stored.updated_at = Utc::now();
        }

        self.get(ticket.id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("ticket {}", ticket.id)))
    }

    async fn add_comment(&self, ticket_id: Uuid, text: &str) -> Result<Comment, StoreError> {
        let mut table = self.table.write().await;
        if !table.tickets.iter().any(|t| t.id == ticket_id) {
            return Err(StoreError::NotFound(format!("ticket {}", ticket_id)));
        }
        let comment = Comment {
            id: Uuid::new_v4(),
            ticket_id,
            text: text.to_string(),
            created_at: Utc::now(),
        };
        table.comments.push(comment.clone());
        Ok(comment)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl AdvancedTicketQuery for MemoryTicketStore {
    async fn list_filtered(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, StoreError> {
        let q = filter.q.trim().to_lowercase();
        let mut matched: Vec<Ticket> = self
            .newest_first()
            .await
            .into_iter()
            .filter(|t| Self::matches(t, filter, &q))
            .collect();
        matched.sort_by(|a, b| Self::compare(a, b, filter.sort, filter.order));

        let mut page = Vec::new();
        for ticket in Self::page(matched, filter.limit, filter.offset) {
            page.push(self.enrich(ticket).await);
        }
        Ok(page)
    }

    async fn count_filtered(&self, filter: &TicketFilter) -> Result<i64, StoreError> {
        let q = filter.q.trim().to_lowercase();
        let table = self.table.read().await;
        Ok(table
            .tickets
            .iter()
            .filter(|t| Self::matches(t, filter, &q))
            .count() as i64)
    }
}

#[async_trait]
impl TicketCounters for MemoryTicketStore {
    async fn count_by_status(&self, statuses: &[&str], inclusive: bool) -> Result<i64, StoreError> {
        let table = self.table.read().await;
        Ok(table
            .tickets
            .iter()
            .filter(|t| statuses.contains(&t.status.as_str()) == inclusive)
            .count() as i64)
    }

    async fn count_resolved_since(&self, since: DateTime<Utc>) -> Result<i64, StoreError> {
        let table = self.table.read().await;
        Ok(table
            .tickets
            .iter()
            .filter(|t| t.is_closed() && t.updated_at >= since)
            .count() as i64)
    }

    async fn count_open_by_priorities(&self, priorities: &[&str]) -> Result<i64, StoreError> {
        let table = self.table.read().await;
        Ok(table
            .tickets
            .iter()
            .filter(|t| !t.is_closed() && priorities.contains(&t.priority.as_str()))
            .count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str, role: Role) -> NewUser {
        NewUser {
            email: email.into(),
            name: email.into(),
            role,
            password_hash: "hash".into(),
        }
    }

    fn new_ticket(title: &str, priority: &str) -> NewTicket {
        NewTicket {
            title: title.into(),
            priority: priority.into(),
            created_by: Uuid::new_v4(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = MemoryUserStore::new();
        store.create(new_user("a@x.io", Role::Agent)).await.unwrap();
        let err = store.create(new_user("a@x.io", Role::Admin)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn first_active_admin_prefers_earliest_and_skips_inactive() {
        let store = MemoryUserStore::new();
        assert_eq!(store.first_active_admin_id().await.unwrap(), None);

        let first = store.create(new_user("first@x.io", Role::Admin)).await.unwrap();
        let second = store.create(new_user("second@x.io", Role::Admin)).await.unwrap();
        store.create(new_user("agent@x.io", Role::Agent)).await.unwrap();
        assert_eq!(store.first_active_admin_id().await.unwrap(), Some(first.id));

        store.set_active(first.id, false).await.unwrap();
        assert_eq!(store.first_active_admin_id().await.unwrap(), Some(second.id));
    }

    #[tokio::test]
    async fn aliases_follow_insertion_sequence() {
        let store = MemoryTicketStore::new();
        let a = store.create(new_ticket("one", "Low")).await.unwrap();
        let b = store.create(new_ticket("two", "Low")).await.unwrap();
        assert_eq!(a.alias, "TKT-000001");
        assert_eq!(b.alias, "TKT-000002");
        assert_eq!(a.status, STATUS_NEW);
    }

    #[tokio::test]
    async fn comments_come_back_in_creation_order() {
        let store = MemoryTicketStore::new();
        let ticket = store.create(new_ticket("printer", "Low")).await.unwrap();
        store.add_comment(ticket.id, "first").await.unwrap();
        store.add_comment(ticket.id, "second").await.unwrap();

        let fetched = store.get(ticket.id).await.unwrap().unwrap();
        let texts: Vec<&str> = fetched.comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);

        let err = store.add_comment(Uuid::new_v4(), "orphan").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn filtered_listing_counts_full_match_set() {
        let store = MemoryTicketStore::new();
        for i in 0..5 {
            store.create(new_ticket(&format!("vpn {}", i), "High")).await.unwrap();
        }
        store.create(new_ticket("printer", "Low")).await.unwrap();

        let filter = TicketFilter {
            q: "VPN".into(),
            limit: 2,
            ..Default::default()
        };
        assert_eq!(store.list_filtered(&filter).await.unwrap().len(), 2);
        assert_eq!(store.count_filtered(&filter).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn advanced_listing_enriches_assignee() {
        let users = Arc::new(MemoryUserStore::new());
        let admin = users.create(new_user("boss@x.io", Role::Admin)).await.unwrap();
        let store = MemoryTicketStore::with_users(users.clone());

        let mut ticket = new_ticket("broken", "Low");
        ticket.assignee = Some(admin.id);
        store.create(ticket).await.unwrap();

        let listed = store.list_filtered(&TicketFilter::default()).await.unwrap();
        assert_eq!(listed[0].assignee_email.as_deref(), Some("boss@x.io"));
    }

    #[tokio::test]
    async fn unknown_assignee_is_rejected_when_users_attached() {
        let users = Arc::new(MemoryUserStore::new());
        let store = MemoryTicketStore::with_users(users);

        let mut ticket = new_ticket("ghost", "Low");
        ticket.assignee = Some(Uuid::new_v4());
        let err = store.create(ticket).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownReference(_)));
        assert!(store.list("", "", 10, 0).await.unwrap().is_empty());
    }
}

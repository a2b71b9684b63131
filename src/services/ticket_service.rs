use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::{AccessError, Identity};
use crate::database::models::{NewTicket, Ticket};
use crate::database::{StoreError, TicketFilter};

use super::assignment::{resolve_assignee, AssignmentError, RankedAdminLookup};
use super::reporting::ReportSummary;
use super::ticket_facade::{TicketFacade, TicketPage};
use super::visibility;

#[derive(Debug, Error)]
pub enum TicketError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("{0}")]
    Validation(String),

    #[error("ticket not found")]
    NotFound,

    #[error(transparent)]
    Assignment(#[from] AssignmentError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTicket {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub assignee: Option<String>,
}

/// Partial update. Absent fields are left alone; present ones are trimmed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTicket {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub assignee: Option<String>,
    pub department: Option<String>,
}

/// Parse a client-supplied assignee. Blank means unassigned.
pub fn parse_assignee(raw: Option<&str>) -> Result<Option<Uuid>, TicketError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => Uuid::parse_str(value)
            .map(Some)
            .map_err(|_| TicketError::Validation(format!("invalid assignee: {}", value))),
    }
}

fn invalid_assignee() -> TicketError {
    TicketError::Validation("invalid assignee".to_string())
}

fn trimmed(value: &str) -> String {
    value.trim().to_string()
}

#[derive(Clone)]
pub struct TicketService {
    facade: TicketFacade,
    admins: RankedAdminLookup,
}

impl TicketService {
    pub fn new(facade: TicketFacade, admins: RankedAdminLookup) -> Self {
        Self { facade, admins }
    }

    pub fn facade(&self) -> &TicketFacade {
        &self.facade
    }

    pub async fn list(
        &self,
        identity: Option<&Identity>,
        filter: &TicketFilter,
    ) -> Result<TicketPage, TicketError> {
        let page = self.facade.search(filter).await?;
        Ok(visibility::scope_page(identity, page))
    }

    pub async fn get(&self, identity: Option<&Identity>, id: Uuid) -> Result<Ticket, TicketError> {
        let ticket = self.facade.get(id).await?.ok_or(TicketError::NotFound)?;
        visibility::ensure_can_read(identity, &ticket)?;
        Ok(ticket)
    }

    /// Create a ticket on behalf of `identity`. Nothing is written when the
    /// assignee cannot be resolved.
    pub async fn create(&self, identity: &Identity, input: CreateTicket) -> Result<Ticket, TicketError> {
        let title = trimmed(&input.title);
        if title.is_empty() {
            return Err(TicketError::Validation("title is required".to_string()));
        }

        let requested = parse_assignee(input.assignee.as_deref())?;
        let assignee = resolve_assignee(identity, requested, &self.admins).await?;

        let created = match self
            .facade
            .create(NewTicket {
                title,
                description: trimmed(&input.description),
                category: trimmed(&input.category),
                priority: trimmed(&input.priority),
                department: trimmed(&input.department),
                assignee,
                created_by: identity.user_id,
            })
            .await
        {
            Err(StoreError::UnknownReference(_)) => return Err(invalid_assignee()),
            other => other?,
        };

        info!(
            "Ticket {} created by {} ({})",
            created.alias, identity.user_id, identity.role
        );

        // Re-read so the response carries joined assignee fields.
        let ticket = self.facade.get(created.id).await?.unwrap_or(created);
        Ok(ticket)
    }

    pub async fn update(
        &self,
        identity: &Identity,
        id: Uuid,
        patch: UpdateTicket,
    ) -> Result<Ticket, TicketError> {
        visibility::ensure_can_update(identity)?;

        let mut ticket = self.facade.get(id).await?.ok_or(TicketError::NotFound)?;

        if let Some(title) = patch.title {
            let title = trimmed(&title);
            if title.is_empty() {
                return Err(TicketError::Validation("title cannot be empty".to_string()));
            }
            ticket.title = title;
        }
        if let Some(description) = patch.description {
            ticket.description = trimmed(&description);
        }
        if let Some(category) = patch.category {
            ticket.category = trimmed(&category);
        }
        if let Some(priority) = patch.priority {
            ticket.priority = trimmed(&priority);
        }
        if let Some(status) = patch.status {
            ticket.status = trimmed(&status);
        }
        if let Some(assignee) = patch.assignee {
            ticket.assignee = parse_assignee(Some(assignee.as_str()))?;
        }
        if let Some(department) = patch.department {
            ticket.department = trimmed(&department);
        }

        let updated = match self.facade.update(&ticket).await {
            Err(StoreError::NotFound(_)) => return Err(TicketError::NotFound),
            Err(StoreError::UnknownReference(_)) => return Err(invalid_assignee()),
            other => other?,
        };
        debug!("Ticket {} updated by {}", updated.alias, identity.user_id);
        Ok(updated)
    }

    /// Append a comment and return the ticket with its full comment list.
    pub async fn add_comment(&self, identity: &Identity, id: Uuid, text: &str) -> Result<Ticket, TicketError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TicketError::Validation("text is required".to_string()));
        }

        if self.facade.get(id).await?.is_none() {
            return Err(TicketError::NotFound);
        }

        match self.facade.add_comment(id, text).await {
            Err(StoreError::NotFound(_)) => return Err(TicketError::NotFound),
            other => other?,
        };
        debug!("Comment added to ticket {} by {}", id, identity.user_id);

        self.facade.get(id).await?.ok_or(TicketError::NotFound)
    }

    pub async fn summary(&self) -> Result<ReportSummary, TicketError> {
        Ok(self.facade.summary(Utc::now()).await?)
    }
}

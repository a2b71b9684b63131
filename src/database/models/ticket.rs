use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const STATUS_NEW: &str = "New";
pub const STATUS_RESOLVED: &str = "Resolved";
pub const STATUS_CLOSED: &str = "Closed";

/// Statuses that count as no longer open.
pub const CLOSED_STATUSES: [&str; 2] = [STATUS_RESOLVED, STATUS_CLOSED];

/// Priorities reported as urgent.
pub const URGENT_PRIORITIES: [&str; 2] = ["High", "Critical"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Uuid,
    pub alias: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub priority: String,
    pub status: String,
    pub assignee: Option<Uuid>,
    pub department: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<Comment>,

    // Display fields, filled when the store joins the assignee.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_email: Option<String>,
}

impl Ticket {
    pub fn is_closed(&self) -> bool {
        CLOSED_STATUSES.contains(&self.status.as_str())
    }

    pub fn is_urgent(&self) -> bool {
        URGENT_PRIORITIES.contains(&self.priority.as_str())
    }
}

/// Human-facing ticket reference derived from the insertion sequence.
pub fn alias_for(seq: i64) -> String {
    format!("TKT-{:06}", seq)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload. Status always starts as `New`.
#[derive(Debug, Clone, Default)]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    pub category: String,
    pub priority: String,
    pub department: String,
    pub assignee: Option<Uuid>,
    pub created_by: Uuid,
}

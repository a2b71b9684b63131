use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::database::models::Ticket;

/// Window for the "resolved recently" counter.
pub const RESOLVED_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub open: i64,
    #[serde(rename = "resolved7d")]
    pub resolved_7d: i64,
    pub high_critical_open: i64,
}

pub fn resolved_since(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(RESOLVED_WINDOW_DAYS)
}

/// Reduce a ticket sample to the summary counters.
pub fn summarize(tickets: &[Ticket], now: DateTime<Utc>) -> ReportSummary {
    let since = resolved_since(now);
    tickets.iter().fold(ReportSummary::default(), |mut acc, t| {
        if t.is_closed() {
            if t.updated_at >= since {
                acc.resolved_7d += 1;
            }
        } else {
            acc.open += 1;
            if t.is_urgent() {
                acc.high_critical_open += 1;
            }
        }
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::ticket::alias_for;
    use uuid::Uuid;

    fn ticket(status: &str, priority: &str, updated_at: DateTime<Utc>) -> Ticket {
        Ticket {
            id: Uuid::new_v4(),
            alias: alias_for(1),
            title: "t".into(),
            description: String::new(),
            category: String::new(),
            priority: priority.into(),
            status: status.into(),
            assignee: None,
            department: String::new(),
            created_by: Uuid::new_v4(),
            created_at: updated_at,
            updated_at,
            comments: vec![],
            assignee_name: None,
            assignee_email: None,
        }
    }

    #[test]
    fn counts_open_and_urgent() {
        let now = Utc::now();
        let tickets = vec![
            ticket("New", "Low", now),
            ticket("New", "High", now),
            ticket("Resolved", "Critical", now),
            ticket("Closed", "Low", now),
        ];
        let summary = summarize(&tickets, now);
        assert_eq!(summary.open, 2);
        assert_eq!(summary.high_critical_open, 1);
        assert_eq!(summary.resolved_7d, 2);
    }

    #[test]
    fn resolved_outside_window_is_not_counted() {
        let now = Utc::now();
        let tickets = vec![
            ticket("Resolved", "Low", now - Duration::days(8)),
            ticket("Closed", "Low", now - Duration::days(6)),
        ];
        assert_eq!(summarize(&tickets, now).resolved_7d, 1);
    }

    #[test]
    fn serializes_wire_names() {
        let json = serde_json::to_value(ReportSummary {
            open: 1,
            resolved_7d: 2,
            high_critical_open: 3,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"open": 1, "resolved7d": 2, "highCriticalOpen": 3}));
    }
}

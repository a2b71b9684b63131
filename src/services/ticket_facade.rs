//! One query contract over ticket backends of differing capability.
//!
//! Which optional capabilities a backend has is fixed when the facade is
//! built. A call never mixes the advanced and basic paths.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::database::filter::MAX_PAGE_SIZE;
use crate::database::models::ticket::{CLOSED_STATUSES, URGENT_PRIORITIES};
use crate::database::models::{Comment, NewTicket, Ticket};
use crate::database::{AdvancedTicketQuery, StoreError, TicketCounters, TicketFilter, TicketStore};

use super::reporting::{resolved_since, summarize, ReportSummary};

/// Upper bound on tickets read when the summary has to be computed in memory.
pub const SCAN_CAP: i64 = 1000;

#[derive(Debug, Clone, Serialize)]
pub struct TicketPage {
    pub items: Vec<Ticket>,
    pub total: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub advanced_query: bool,
    pub counters: bool,
}

#[derive(Clone)]
enum QueryPath {
    Basic,
    Advanced(Arc<dyn AdvancedTicketQuery>),
}

#[derive(Clone)]
enum ReportPath {
    Scan,
    Counters(Arc<dyn TicketCounters>),
}

#[derive(Clone)]
pub struct TicketFacade {
    store: Arc<dyn TicketStore>,
    query: QueryPath,
    report: ReportPath,
}

impl TicketFacade {
    /// A facade that only relies on the minimal store contract.
    pub fn basic(store: Arc<dyn TicketStore>) -> Self {
        Self {
            store,
            query: QueryPath::Basic,
            report: ReportPath::Scan,
        }
    }

    pub fn with_advanced_query(mut self, query: Arc<dyn AdvancedTicketQuery>) -> Self {
        self.query = QueryPath::Advanced(query);
        self
    }

    pub fn with_counters(mut self, counters: Arc<dyn TicketCounters>) -> Self {
        self.report = ReportPath::Counters(counters);
        self
    }

    /// A backend offering every capability.
    pub fn full<S>(store: Arc<S>) -> Self
    where
        S: TicketStore + AdvancedTicketQuery + TicketCounters + 'static,
    {
        Self::basic(store.clone())
            .with_advanced_query(store.clone())
            .with_counters(store)
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            advanced_query: matches!(self.query, QueryPath::Advanced(_)),
            counters: matches!(self.report, ReportPath::Counters(_)),
        }
    }

    /// Search tickets. The basic path honours only `q`, `status` and the
    /// window, and reports the page length as the total.
    pub async fn search(&self, filter: &TicketFilter) -> Result<TicketPage, StoreError> {
        match &self.query {
            QueryPath::Advanced(query) => {
                debug!("Ticket search via advanced query");
                let items = query.list_filtered(filter).await?;
                let total = query.count_filtered(filter).await?;
                Ok(TicketPage { items, total })
            }
            QueryPath::Basic => {
                debug!("Ticket search via basic listing");
                let (limit, offset) = filter.window();
                let items = self
                    .store
                    .list(&filter.q, &filter.status, limit, offset)
                    .await?;
                let total = items.len() as i64;
                Ok(TicketPage { items, total })
            }
        }
    }

    pub async fn summary(&self, now: DateTime<Utc>) -> Result<ReportSummary, StoreError> {
        match &self.report {
            ReportPath::Counters(counters) => {
                debug!("Report summary via storage counters");
                Ok(ReportSummary {
                    open: counters.count_by_status(&CLOSED_STATUSES, false).await?,
                    resolved_7d: counters.count_resolved_since(resolved_since(now)).await?,
                    high_critical_open: counters
                        .count_open_by_priorities(&URGENT_PRIORITIES)
                        .await?,
                })
            }
            ReportPath::Scan => {
                let tickets = self.scan().await?;
                debug!("Report summary via scan of {} tickets", tickets.len());
                Ok(summarize(&tickets, now))
            }
        }
    }

    /// Read up to `SCAN_CAP` tickets, a store-sized page at a time.
    async fn scan(&self) -> Result<Vec<Ticket>, StoreError> {
        let mut tickets = Vec::new();
        while (tickets.len() as i64) < SCAN_CAP {
            let want = MAX_PAGE_SIZE.min(SCAN_CAP - tickets.len() as i64);
            let page = self.store.list("", "", want, tickets.len() as i64).await?;
            let short = (page.len() as i64) < want;
            tickets.extend(page);
            if short {
                break;
            }
        }
        Ok(tickets)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Ticket>, StoreError> {
        self.store.get(id).await
    }

    pub async fn create(&self, ticket: NewTicket) -> Result<Ticket, StoreError> {
        self.store.create(ticket).await
    }

    pub async fn update(&self, ticket: &Ticket) -> Result<Ticket, StoreError> {
        self.store.update(ticket).await
    }

    pub async fn add_comment(&self, ticket_id: Uuid, text: &str) -> Result<Comment, StoreError> {
        self.store.add_comment(ticket_id, text).await
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.store.ping().await
    }
}

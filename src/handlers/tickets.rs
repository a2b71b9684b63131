use std::collections::HashMap;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::auth::access::require_authenticated;
use crate::database::models::Ticket;
use crate::database::{SortColumn, SortDirection, TicketFilter};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, RequestIdentity};
use crate::services::ticket_service::{parse_assignee, CreateTicket, UpdateTicket};
use crate::services::TicketPage;

use super::util::{json_body, parse_id, query_int, query_str};

/// Page size when the client does not ask for one.
pub const DEFAULT_TICKET_LIMIT: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub text: String,
}

fn ticket_filter(params: &HashMap<String, String>) -> Result<TicketFilter, ApiError> {
    let assignee = parse_assignee(Some(query_str(params, "assignee").as_str()))?;
    Ok(TicketFilter {
        q: query_str(params, "q"),
        status: query_str(params, "status"),
        priority: query_str(params, "priority"),
        category: query_str(params, "category"),
        assignee,
        sort: SortColumn::parse(&query_str(params, "sort")),
        order: SortDirection::parse(&query_str(params, "order")),
        limit: query_int(params, "limit", DEFAULT_TICKET_LIMIT),
        offset: query_int(params, "offset", 0),
    })
}

/// GET /api/tickets - Search tickets visible to the caller
pub async fn list(
    State(state): State<AppState>,
    identity: RequestIdentity,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<TicketPage> {
    let filter = ticket_filter(&params)?;
    let page = state.tickets.list(identity.get(), &filter).await?;
    let total = page.total;
    Ok(ApiResponse::success(page).with_total_count(total))
}

/// POST /api/tickets - Open a ticket
pub async fn create(
    State(state): State<AppState>,
    identity: RequestIdentity,
    payload: Result<Json<CreateTicket>, JsonRejection>,
) -> ApiResult<Ticket> {
    let input = json_body(payload)?;
    let caller = require_authenticated(identity.get())?;
    let ticket = state.tickets.create(caller, input).await?;
    Ok(ApiResponse::created(ticket))
}

/// GET /api/tickets/:id - One ticket with its comments
pub async fn show(
    State(state): State<AppState>,
    identity: RequestIdentity,
    Path(id): Path<String>,
) -> ApiResult<Ticket> {
    let id = parse_id(&id)?;
    let ticket = state.tickets.get(identity.get(), id).await?;
    Ok(ApiResponse::success(ticket))
}

/// PATCH /api/tickets/:id - Partial update by staff
pub async fn update(
    State(state): State<AppState>,
    identity: RequestIdentity,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTicket>, JsonRejection>,
) -> ApiResult<Ticket> {
    let caller = require_authenticated(identity.get())?;
    let id = parse_id(&id)?;
    let patch = json_body(payload)?;
    let ticket = state.tickets.update(caller, id, patch).await?;
    Ok(ApiResponse::success(ticket))
}

/// POST /api/tickets/:id/comments - Append a comment
pub async fn comment(
    State(state): State<AppState>,
    identity: RequestIdentity,
    Path(id): Path<String>,
    payload: Result<Json<CommentRequest>, JsonRejection>,
) -> ApiResult<Ticket> {
    let caller = require_authenticated(identity.get())?;
    let id = parse_id(&id)?;
    let req = json_body(payload)?;
    let ticket = state.tickets.add_comment(caller, id, &req.text).await?;
    Ok(ApiResponse::success(ticket))
}

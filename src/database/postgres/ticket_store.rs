use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::database::filter::{clamp_page, TicketFilter};
use crate::database::models::ticket::{alias_for, CLOSED_STATUSES};
use crate::database::models::{Comment, NewTicket, Ticket};
use crate::database::store::{AdvancedTicketQuery, StoreError, TicketCounters, TicketStore};

const TICKET_COLUMNS: &str = "t.id, t.seq, t.title, t.description, t.category, t.priority, \
     t.status, t.assignee, t.department, t.created_by, t.created_at, t.updated_at";

#[derive(FromRow)]
struct TicketRow {
    id: Uuid,
    seq: i64,
    title: String,
    description: String,
    category: String,
    priority: String,
    status: String,
    assignee: Option<Uuid>,
    department: String,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    assignee_name: Option<String>,
    assignee_email: Option<String>,
}

impl From<TicketRow> for Ticket {
    fn from(row: TicketRow) -> Self {
        Ticket {
            id: row.id,
            alias: alias_for(row.seq),
            title: row.title,
            description: row.description,
            category: row.category,
            priority: row.priority,
            status: row.status,
            assignee: row.assignee,
            department: row.department,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
            comments: Vec::new(),
            assignee_name: row.assignee_name,
            assignee_email: row.assignee_email,
        }
    }
}

#[derive(FromRow)]
struct CommentRow {
    id: Uuid,
    ticket_id: Uuid,
    text: String,
    created_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            ticket_id: row.ticket_id,
            text: row.text,
            created_at: row.created_at,
        }
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23503"))
}

/// Named in `sql/schema.sql`.
const ASSIGNEE_FK: &str = "tickets_assignee_fkey";

fn is_assignee_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.constraint() == Some(ASSIGNEE_FK))
}

fn assignee_error(err: sqlx::Error, assignee: Option<Uuid>) -> StoreError {
    match assignee {
        Some(id) if is_assignee_violation(&err) => {
            StoreError::UnknownReference(format!("assignee {}", id))
        }
        _ => err.into(),
    }
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

pub struct PgTicketStore {
    pool: PgPool,
}

impl PgTicketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Select every ticket column plus joined assignee display fields.
    fn joined_select() -> QueryBuilder<'static, Postgres> {
        QueryBuilder::new(format!(
            "SELECT {}, u.name AS assignee_name, u.email AS assignee_email \
             FROM tickets t LEFT JOIN users u ON u.id = t.assignee",
            TICKET_COLUMNS
        ))
    }

    fn push_text_search(builder: &mut QueryBuilder<'_, Postgres>, q: &str) {
        let q = q.trim();
        if q.is_empty() {
            return;
        }
        let pattern = format!("%{}%", q);
        builder
            .push(" AND (t.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR t.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &TicketFilter) {
        builder.push(" WHERE TRUE");
        Self::push_text_search(builder, &filter.q);
        if !filter.status.is_empty() {
            builder.push(" AND t.status = ").push_bind(filter.status.clone());
        }
        if !filter.priority.is_empty() {
            builder.push(" AND t.priority = ").push_bind(filter.priority.clone());
        }
        if !filter.category.is_empty() {
            builder.push(" AND t.category = ").push_bind(filter.category.clone());
        }
        if let Some(assignee) = filter.assignee {
            builder.push(" AND t.assignee = ").push_bind(assignee);
        }
    }

    async fn fetch_one(&self, id: Uuid) -> Result<Option<Ticket>, StoreError> {
        let mut select = Self::joined_select();
        select.push(" WHERE t.id = ").push_bind(id);
        let row: Option<TicketRow> = select.build_query_as().fetch_optional(&self.pool).await?;
        Ok(row.map(Ticket::from))
    }
}

#[async_trait]
impl TicketStore for PgTicketStore {
    async fn list(
        &self,
        q: &str,
        status: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Ticket>, StoreError> {
        let (limit, offset) = clamp_page(limit, offset);

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {}, NULL::text AS assignee_name, NULL::text AS assignee_email FROM tickets t WHERE TRUE",
            TICKET_COLUMNS
        ));
        Self::push_text_search(&mut select, q);
        if !status.is_empty() {
            select.push(" AND t.status = ").push_bind(status.to_string());
        }
        select
            .push(" ORDER BY t.updated_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows: Vec<TicketRow> = select.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Ticket::from).collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Ticket>, StoreError> {
        let Some(mut ticket) = self.fetch_one(id).await? else {
            return Ok(None);
        };

        let comments = sqlx::query_as::<_, CommentRow>(
            "SELECT id, ticket_id, text, created_at FROM comments WHERE ticket_id = $1 ORDER BY created_at ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        ticket.comments = comments.into_iter().map(Comment::from).collect();
        Ok(Some(ticket))
    }

    async fn create(&self, ticket: NewTicket) -> Result<Ticket, StoreError> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO tickets (title, description, category, priority, department, assignee, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
        )
        .bind(&ticket.title)
        .bind(&ticket.description)
        .bind(&ticket.category)
        .bind(&ticket.priority)
        .bind(&ticket.department)
        .bind(ticket.assignee)
        .bind(ticket.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| assignee_error(e, ticket.assignee))?;

        self.fetch_one(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("ticket {}", id)))
    }

    async fn update(&self, ticket: &Ticket) -> Result<Ticket, StoreError> {
        let result = sqlx::query(
            "UPDATE tickets SET title = $2, description = $3, category = $4, priority = $5, \
             status = $6, assignee = $7, department = $8, updated_at = now() WHERE id = $1",
        )
        .bind(ticket.id)
        .bind(&ticket.title)
        .bind(&ticket.description)
        .bind(&ticket.category)
        .bind(&ticket.priority)
        .bind(&ticket.status)
        .bind(ticket.assignee)
        .bind(&ticket.department)
        .execute(&self.pool)
        .await
        .map_err(|e| assignee_error(e, ticket.assignee))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("ticket {}", ticket.id)));
        }

        self.get(ticket.id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("ticket {}", ticket.id)))
    }

    async fn add_comment(&self, ticket_id: Uuid, text: &str) -> Result<Comment, StoreError> {
        let result = sqlx::query_as::<_, CommentRow>(
            "INSERT INTO comments (ticket_id, text) VALUES ($1, $2) RETURNING id, ticket_id, text, created_at",
        )
        .bind(ticket_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(row.into()),
            Err(e) if is_foreign_key_violation(&e) => {
                Err(StoreError::NotFound(format!("ticket {}", ticket_id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        super::ping(&self.pool).await
    }
}

#[async_trait]
impl AdvancedTicketQuery for PgTicketStore {
    async fn list_filtered(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, StoreError> {
        let (limit, offset) = filter.window();

        let mut select = Self::joined_select();
        Self::push_filter(&mut select, filter);
        select
            .push(format!(
                " ORDER BY t.{} {}, t.id {}",
                filter.sort.as_sql(),
                filter.order.to_sql(),
                filter.order.to_sql()
            ))
            .push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows: Vec<TicketRow> = select.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Ticket::from).collect())
    }

    async fn count_filtered(&self, filter: &TicketFilter) -> Result<i64, StoreError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tickets t");
        Self::push_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(total)
    }
}

#[async_trait]
impl TicketCounters for PgTicketStore {
    async fn count_by_status(&self, statuses: &[&str], inclusive: bool) -> Result<i64, StoreError> {
        let sql = if inclusive {
            "SELECT COUNT(*) FROM tickets WHERE status = ANY($1)"
        } else {
            "SELECT COUNT(*) FROM tickets WHERE NOT (status = ANY($1))"
        };
        let total: i64 = sqlx::query_scalar(sql)
            .bind(owned(statuses))
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn count_resolved_since(&self, since: DateTime<Utc>) -> Result<i64, StoreError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tickets WHERE status = ANY($1) AND updated_at >= $2",
        )
        .bind(owned(&CLOSED_STATUSES))
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    async fn count_open_by_priorities(&self, priorities: &[&str]) -> Result<i64, StoreError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tickets WHERE NOT (status = ANY($1)) AND priority = ANY($2)",
        )
        .bind(owned(&CLOSED_STATUSES))
        .bind(owned(priorities))
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }
}

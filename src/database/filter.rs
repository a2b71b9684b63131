use uuid::Uuid;

use crate::auth::Role;

/// Largest page a store will return.
pub const MAX_PAGE_SIZE: i64 = 200;

/// Page size a store falls back to when asked for something outside `(0, MAX_PAGE_SIZE]`.
pub const STORE_DEFAULT_LIMIT: i64 = 50;

/// Normalize a requested window: out-of-range limits fall back to the store
/// default, negative offsets become zero.
pub fn clamp_page(limit: i64, offset: i64) -> (i64, i64) {
    let limit = if limit <= 0 || limit > MAX_PAGE_SIZE {
        STORE_DEFAULT_LIMIT
    } else {
        limit
    };
    (limit, offset.max(0))
}

/// Sortable ticket columns. Anything else falls back to `updated_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortColumn {
    CreatedAt,
    #[default]
    UpdatedAt,
    Priority,
}

impl SortColumn {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "created_at" => SortColumn::CreatedAt,
            "updated_at" => SortColumn::UpdatedAt,
            "priority" => SortColumn::Priority,
            other => {
                if !other.is_empty() {
                    tracing::debug!("Ignoring unsupported sort column '{}'", other);
                }
                SortColumn::default()
            }
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortColumn::CreatedAt => "created_at",
            SortColumn::UpdatedAt => "updated_at",
            SortColumn::Priority => "priority",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" => SortDirection::Asc,
            "desc" => SortDirection::Desc,
            _ => SortDirection::default(),
        }
    }

    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Ticket search parameters. Empty strings mean "no filter".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketFilter {
    pub q: String,
    pub status: String,
    pub priority: String,
    pub category: String,
    pub assignee: Option<Uuid>,
    pub sort: SortColumn,
    pub order: SortDirection,
    pub limit: i64,
    pub offset: i64,
}

impl Default for TicketFilter {
    fn default() -> Self {
        Self {
            q: String::new(),
            status: String::new(),
            priority: String::new(),
            category: String::new(),
            assignee: None,
            sort: SortColumn::default(),
            order: SortDirection::default(),
            limit: STORE_DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl TicketFilter {
    pub fn window(&self) -> (i64, i64) {
        clamp_page(self.limit, self.offset)
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub q: String,
    pub role: Option<Role>,
    pub active: Option<bool>,
    pub limit: i64,
    pub offset: i64,
}

impl UserFilter {
    pub fn window(&self) -> (i64, i64) {
        clamp_page(self.limit, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_sort_falls_back_to_updated_at_desc() {
        assert_eq!(SortColumn::parse("dropTable"), SortColumn::UpdatedAt);
        assert_eq!(SortColumn::parse("priority; DROP TABLE tickets"), SortColumn::UpdatedAt);
        assert_eq!(SortColumn::parse(""), SortColumn::UpdatedAt);
        assert_eq!(SortDirection::parse("sideways"), SortDirection::Desc);
    }

    #[test]
    fn allowed_sort_values_parse() {
        assert_eq!(SortColumn::parse("CREATED_AT"), SortColumn::CreatedAt);
        assert_eq!(SortColumn::parse("priority"), SortColumn::Priority);
        assert_eq!(SortDirection::parse("ASC"), SortDirection::Asc);
    }

    #[test]
    fn page_window_is_clamped() {
        assert_eq!(clamp_page(10, 5), (10, 5));
        assert_eq!(clamp_page(200, 0), (200, 0));
        assert_eq!(clamp_page(0, 0), (STORE_DEFAULT_LIMIT, 0));
        assert_eq!(clamp_page(201, -3), (STORE_DEFAULT_LIMIT, 0));
        assert_eq!(clamp_page(-1, 7), (STORE_DEFAULT_LIMIT, 7));
    }
}

//! Role-scoped ticket visibility, applied after the store has answered.

use crate::auth::access::TICKET_EDITORS;
use crate::auth::{AccessError, Identity, Role};
use crate::database::models::Ticket;

use super::ticket_facade::TicketPage;

fn is_foreign_to_end_user(identity: Option<&Identity>, ticket: &Ticket) -> bool {
    matches!(identity, Some(id) if id.is(Role::EndUser) && ticket.created_by != id.user_id)
}

/// Drop tickets an end user did not open. The total becomes the size of
/// what is left, so it can undercount when the store paginated first.
pub fn scope_page(identity: Option<&Identity>, page: TicketPage) -> TicketPage {
    match identity {
        Some(id) if id.is(Role::EndUser) => {
            let items: Vec<Ticket> = page
                .items
                .into_iter()
                .filter(|t| t.created_by == id.user_id)
                .collect();
            let total = items.len() as i64;
            TicketPage { items, total }
        }
        _ => page,
    }
}

pub fn ensure_can_read(identity: Option<&Identity>, ticket: &Ticket) -> Result<(), AccessError> {
    if is_foreign_to_end_user(identity, ticket) {
        return Err(AccessError::Forbidden);
    }
    Ok(())
}

/// End users may never edit a ticket, not even their own.
pub fn ensure_can_update(identity: &Identity) -> Result<(), AccessError> {
    if identity.role.is_in(TICKET_EDITORS) {
        Ok(())
    } else {
        Err(AccessError::Forbidden)
    }
}

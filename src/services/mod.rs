pub mod assignment;
pub mod auth_service;
pub mod reporting;
pub mod ticket_facade;
pub mod ticket_service;
pub mod user_service;
pub mod visibility;

pub use assignment::{AssignmentError, RankedAdminLookup};
pub use auth_service::{AuthError, AuthService};
pub use reporting::ReportSummary;
pub use ticket_facade::{Capabilities, TicketFacade, TicketPage};
pub use ticket_service::{TicketError, TicketService};
pub use user_service::UserService;

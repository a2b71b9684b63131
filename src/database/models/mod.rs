pub mod ticket;
pub mod user;

pub use ticket::{Comment, NewTicket, Ticket};
pub use user::{NewUser, User};

pub mod filter;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use filter::{SortColumn, SortDirection, TicketFilter, UserFilter};
pub use store::{
    AdminLookup, AdvancedTicketQuery, StoreError, TicketCounters, TicketStore, UserStore,
};

pub mod guard;
pub mod identity;
pub mod response;

pub use guard::enforce_guard;
pub use identity::{
    clear_session_cookie, propagate_identity, session_cookie, IdentityState, RequestIdentity,
};
pub use response::{ApiResponse, ApiResult};

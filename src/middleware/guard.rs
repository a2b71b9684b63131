use std::collections::HashMap;

use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use super::identity::RequestIdentity;
use crate::auth::Guard;
use crate::error::ApiError;

/// Route layer enforcing `guard` before the handler runs. The `:id` path
/// parameter, when present, is the subject for self-or-role guards.
pub async fn enforce_guard(
    State(guard): State<Guard>,
    identity: RequestIdentity,
    params: Option<Path<HashMap<String, String>>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let subject = params.as_ref().and_then(|Path(p)| p.get("id")).map(String::as_str);

    if let Err(e) = guard.check(identity.get(), subject) {
        debug!(
            "{:?} denied {} {}: {}",
            guard,
            request.method(),
            request.uri().path(),
            e
        );
        return Err(e.into());
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::access::{ADMIN_ONLY, TICKET_EDITORS};
    use crate::auth::{Identity, Role};
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Extension, Router};
    use chrono::Utc;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn identity(role: Role) -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            role,
            issued_at: Utc::now(),
            expires_at: Utc::now(),
        }
    }

    fn guarded(path: &str, guard: Guard, caller: Option<Identity>) -> Router {
        Router::new()
            .route(
                path,
                get(|| async { "ok" })
                    .route_layer(middleware::from_fn_with_state(guard, enforce_guard)),
            )
            .layer(Extension(RequestIdentity(caller)))
    }

    async fn status(app: Router, uri: &str) -> StatusCode {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        app.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn anonymous_gets_401_and_wrong_role_403() {
        let app = guarded("/admin", Guard::RoleIn(ADMIN_ONLY), None);
        assert_eq!(status(app, "/admin").await, StatusCode::UNAUTHORIZED);

        let app = guarded("/admin", Guard::RoleIn(ADMIN_ONLY), Some(identity(Role::Agent)));
        assert_eq!(status(app, "/admin").await, StatusCode::FORBIDDEN);

        let app = guarded("/admin", Guard::RoleIn(TICKET_EDITORS), Some(identity(Role::Agent)));
        assert_eq!(status(app, "/admin").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn self_or_admin_uses_path_id() {
        let me = identity(Role::EndUser);
        let own = format!("/users/{}", me.user_id);
        let other = format!("/users/{}", Uuid::new_v4());

        let app = guarded("/users/:id", Guard::SelfOrRoleIn(ADMIN_ONLY), Some(me.clone()));
        assert_eq!(status(app, &own).await, StatusCode::OK);

        let app = guarded("/users/:id", Guard::SelfOrRoleIn(ADMIN_ONLY), Some(me));
        assert_eq!(status(app, &other).await, StatusCode::FORBIDDEN);

        let app = guarded("/users/:id", Guard::SelfOrRoleIn(ADMIN_ONLY), Some(identity(Role::Admin)));
        assert_eq!(status(app, &other).await, StatusCode::OK);
    }
}

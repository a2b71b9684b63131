use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::warn;

use crate::auth::{Identity, SessionCodec, SESSION_COOKIE, SESSION_TTL_HOURS};

/// The caller's identity, if a valid session came with the request.
///
/// Always present in request extensions once [`propagate_identity`] has run.
#[derive(Clone, Debug, Default)]
pub struct RequestIdentity(pub Option<Identity>);

impl RequestIdentity {
    pub fn get(&self) -> Option<&Identity> {
        self.0.as_ref()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestIdentity>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Session token from the `session` cookie, else from `Authorization: Bearer`.
fn session_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// State for [`propagate_identity`].
#[derive(Clone)]
pub struct IdentityState {
    pub sessions: Arc<SessionCodec>,
    pub secure_cookie: bool,
}

fn sets_session_cookie(headers: &HeaderMap) -> bool {
    let prefix = format!("{}=", SESSION_COOKIE);
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&prefix))
}

/// Best-effort identity middleware. Never rejects: a missing or bad token
/// just leaves the request anonymous, and a bad one also clears the cookie
/// unless the handler already issued a new one.
pub async fn propagate_identity(
    State(state): State<IdentityState>,
    mut request: Request,
    next: Next,
) -> Response {
    let mut rejected = false;
    let identity = match session_token(request.headers()) {
        Some(token) => match state.sessions.verify(&token) {
            Ok(identity) => Some(identity),
            Err(e) => {
                warn!("Ignoring rejected session token: {}", e);
                rejected = true;
                None
            }
        },
        None => None,
    };

    request.extensions_mut().insert(RequestIdentity(identity));
    let mut response = next.run(request).await;

    if rejected && !sets_session_cookie(response.headers()) {
        match HeaderValue::from_str(&clear_session_cookie(state.secure_cookie).to_string()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => warn!("Could not encode session clearing cookie: {}", e),
        }
    }

    response
}

/// The cookie set on login.
pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::hours(SESSION_TTL_HOURS))
        .build()
}

/// A cookie that overwrites and immediately expires the session cookie.
pub fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .expires(time::OffsetDateTime::UNIX_EPOCH)
        .build()
}

//! Application wiring: shared state, store selection and the route table.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, patch, post, MethodRouter},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::auth::access::{ADMIN_ONLY, TICKET_EDITORS};
use crate::auth::{Guard, SessionCodec};
use crate::config::{AppConfig, StoreBackend};
use crate::database::memory::{MemoryTicketStore, MemoryUserStore};
use crate::database::postgres::{self, LenientAdminLookup, PgTicketStore, PgUserStore, StrictAdminLookup};
use crate::database::UserStore;
use crate::handlers::{auth, health, reports, tickets, users};
use crate::middleware::{enforce_guard, propagate_identity, IdentityState};
use crate::services::{AuthService, RankedAdminLookup, TicketFacade, TicketService, UserService};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sessions: Arc<SessionCodec>,
    pub auth: AuthService,
    pub users: UserService,
    pub tickets: TicketService,
}

fn assemble(
    config: AppConfig,
    users: Arc<dyn UserStore>,
    facade: TicketFacade,
    admins: RankedAdminLookup,
) -> anyhow::Result<AppState> {
    let sessions = Arc::new(SessionCodec::new(&config.security.session_secret)?);
    let capabilities = facade.capabilities();
    info!(
        "Ticket store capabilities: advanced_query={} counters={}",
        capabilities.advanced_query, capabilities.counters
    );

    Ok(AppState {
        auth: AuthService::new(users.clone(), sessions.clone(), config.security.bcrypt_cost),
        users: UserService::new(users),
        tickets: TicketService::new(facade, admins),
        sessions,
        config: Arc::new(config),
    })
}

/// State backed by the in-process stores.
pub fn memory_state(config: AppConfig) -> anyhow::Result<AppState> {
    let users = Arc::new(MemoryUserStore::new());
    let tickets = Arc::new(MemoryTicketStore::with_users(users.clone()));
    let admins = RankedAdminLookup::default().then(users.clone());
    assemble(config, users, TicketFacade::full(tickets), admins)
}

/// Build state for the configured backend, bootstrapping the schema when
/// running against PostgreSQL.
pub async fn build_state(config: AppConfig) -> anyhow::Result<AppState> {
    info!("Using {} store backend", config.database.backend.as_str());
    match config.database.backend {
        StoreBackend::Memory => memory_state(config),
        StoreBackend::Postgres => {
            let pool = postgres::connect(&config.database).await?;
            postgres::apply_schema(&pool).await?;

            let users = Arc::new(PgUserStore::new(pool.clone()));
            let facade = TicketFacade::full(Arc::new(PgTicketStore::new(pool.clone())));
            let admins = RankedAdminLookup::default()
                .then(Arc::new(StrictAdminLookup::new(pool.clone())))
                .then(Arc::new(LenientAdminLookup::new(pool)));
            assemble(config, users, facade, admins)
        }
    }
}

fn guarded(route: MethodRouter<AppState>, guard: Guard) -> MethodRouter<AppState> {
    route.route_layer(from_fn_with_state(guard, enforce_guard))
}

/// Reads are anonymous unless public reads are switched off.
fn read(route: MethodRouter<AppState>, public_reads: bool) -> MethodRouter<AppState> {
    if public_reads {
        route
    } else {
        guarded(route, Guard::Authenticated)
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_headers([header::HeaderName::from_static("x-total-count")])
}

pub fn router(state: AppState) -> Router {
    let public_reads = state.config.api.public_reads;
    let config = state.config.clone();
    let identity = IdentityState {
        sessions: state.sessions.clone(),
        secure_cookie: config.security.cookie_secure,
    };

    Router::new()
        .route("/healthz", get(health::health))
        .route("/api/healthz", get(health::health))
        // Auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route(
            "/api/auth/me",
            guarded(get(auth::me), Guard::Authenticated),
        )
        // Tickets
        .route(
            "/api/tickets",
            read(get(tickets::list), public_reads)
                .merge(guarded(post(tickets::create), Guard::Authenticated)),
        )
        .route(
            "/api/tickets/:id",
            read(get(tickets::show), public_reads)
                .merge(guarded(patch(tickets::update), Guard::RoleIn(TICKET_EDITORS))),
        )
        .route(
            "/api/tickets/:id/comments",
            guarded(post(tickets::comment), Guard::Authenticated),
        )
        // Reports
        .route(
            "/api/reports/summary",
            read(get(reports::summary), public_reads),
        )
        // Users
        .route("/api/users", guarded(get(users::list), Guard::RoleIn(ADMIN_ONLY)))
        .route(
            "/api/users/:id/role",
            guarded(patch(users::update_role), Guard::RoleIn(ADMIN_ONLY)),
        )
        .route(
            "/api/users/:id/active",
            guarded(patch(users::set_active), Guard::RoleIn(ADMIN_ONLY)),
        )
        .route(
            "/api/users/:id/basic",
            guarded(patch(users::update_basic), Guard::SelfOrRoleIn(ADMIN_ONLY)),
        )
        .route(
            "/api/users/:id/password",
            guarded(patch(users::update_password), Guard::SelfOrRoleIn(ADMIN_ONLY)),
        )
        // Identity is resolved for every route before any guard runs.
        .layer(from_fn_with_state(identity, propagate_identity))
        .layer(RequestBodyLimitLayer::new(config.api.max_request_size_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs)))
        .layer(cors_layer(&config.security.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

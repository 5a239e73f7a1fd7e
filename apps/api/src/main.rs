//! Keygate API composition root.

#![forbid(unsafe_code)]

mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

use axum::Router;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post, put};
use keygate_application::{
    AccessAdminService, AuthorizationService, CredentialService, DEFAULT_TOKEN_TTL_MINUTES,
    TokenService, ensure_baseline_access,
};
use keygate_core::AppError;
use keygate_infrastructure::{
    Argon2PasswordHasher, PostgresAccessRepository, PostgresPrincipalRepository,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

    let database_url = required_env("DATABASE_URL")?;
    let token_secret = required_env("TOKEN_SECRET")?;

    if token_secret.len() < 32 {
        return Err(AppError::Validation(
            "TOKEN_SECRET must be at least 32 characters".to_owned(),
        ));
    }

    let token_ttl_minutes = env::var("TOKEN_TTL_MINUTES")
        .ok()
        .and_then(|value| value.parse::<i64>().ok())
        .unwrap_or(DEFAULT_TOKEN_TTL_MINUTES);

    let frontend_url =
        env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());
    let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
    let api_port = env::var("API_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3001);

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    if migrate_only {
        info!("database migrations applied successfully");
        return Ok(());
    }

    let principal_repository = Arc::new(PostgresPrincipalRepository::new(pool.clone()));
    let access_repository = Arc::new(PostgresAccessRepository::new(pool.clone()));

    // Baseline permissions and roles exist before the first request.
    ensure_baseline_access(access_repository.as_ref()).await?;

    let password_hasher = Arc::new(Argon2PasswordHasher::new());

    let app_state = AppState {
        credential_service: CredentialService::new(principal_repository, password_hasher),
        token_service: TokenService::new(token_secret.as_bytes(), token_ttl_minutes),
        authorization_service: AuthorizationService::new(access_repository.clone()),
        access_admin_service: AccessAdminService::new(access_repository),
    };

    let admin_routes = Router::new()
        .route(
            "/rbac/permissions",
            get(handlers::access::list_permissions_handler)
                .post(handlers::access::create_permission_handler),
        )
        .route(
            "/rbac/permissions/{permission_id}",
            delete(handlers::access::delete_permission_handler),
        )
        .route(
            "/rbac/roles",
            get(handlers::access::list_roles_handler).post(handlers::access::create_role_handler),
        )
        .route(
            "/rbac/roles/{role_id}",
            delete(handlers::access::delete_role_handler),
        )
        .route(
            "/rbac/roles/{role_id}/permissions",
            post(handlers::access::attach_permissions_handler)
                .delete(handlers::access::detach_permissions_handler),
        )
        .route(
            "/rbac/users/{principal_id}/roles",
            get(handlers::access::list_assigned_roles_handler)
                .post(handlers::access::assign_roles_handler),
        )
        .route(
            "/rbac/users/{principal_id}/roles/{role_id}",
            delete(handlers::access::revoke_role_handler),
        )
        .route(
            "/rbac/users/{principal_id}/override",
            put(handlers::users::set_admin_override_handler),
        )
        .route(
            "/rbac/users/{principal_id}/active",
            put(handlers::users::set_active_handler),
        )
        .route(
            "/rbac/check-permission",
            post(handlers::access::check_permission_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_admin,
        ));

    let protected_routes = Router::new()
        .route("/auth/me", get(handlers::auth::me_handler))
        .route(
            "/profile/password",
            put(handlers::auth::change_password_handler),
        )
        .route("/users", get(handlers::users::list_users_handler))
        .route(
            "/users/{principal_id}",
            get(handlers::users::get_user_handler),
        )
        .merge(admin_routes)
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_auth,
        ));

    let cors_layer = CorsLayer::new()
        .allow_origin(
            HeaderValue::from_str(&frontend_url)
                .map_err(|error| AppError::Internal(format!("invalid FRONTEND_URL: {error}")))?,
        )
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    let app = Router::new()
        .route("/health", get(handlers::health::health_handler))
        .route("/auth/register", post(handlers::auth::register_handler))
        .route("/auth/login", post(handlers::auth::login_handler))
        .route("/auth/refresh", post(handlers::auth::refresh_handler))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(app_state);

    let host = IpAddr::from_str(&api_host)
        .map_err(|error| AppError::Internal(format!("invalid API_HOST '{api_host}': {error}")))?;
    let address = SocketAddr::from((host, api_port));

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "keygate-api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use keygate_core::AppError;
use keygate_domain::{Principal, SUPER_ACTION, SUPER_RESOURCE};

use crate::error::ApiResult;
use crate::state::AppState;

/// Verifies the bearer token and attaches the principal to the request.
///
/// Every failure on this path collapses into the same
/// [`AppError::Unauthenticated`]: missing header, wrong scheme, invalid
/// or expired token, unknown or deactivated principal all produce an
/// identical 401, so a probe cannot learn which check failed.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let token = bearer_token(&request).ok_or(AppError::Unauthenticated)?;

    let principal_id = state
        .token_service
        .verify(token)
        .map_err(|_| AppError::Unauthenticated)?;

    let principal = state
        .credential_service
        .principal_by_id(principal_id)
        .await
        .map_err(|_| AppError::Unauthenticated)?;

    if !principal.is_active {
        return Err(AppError::Unauthenticated.into());
    }

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Gates a route on super-access.
///
/// Runs after [`require_auth`], so the principal extension is present.
/// The decision rules grant for the admin-override flag or a role
/// carrying the super-permission; everyone else gets a 403.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let principal = request
        .extensions()
        .get::<Principal>()
        .ok_or(AppError::Unauthenticated)?;

    state
        .authorization_service
        .require(principal, SUPER_RESOURCE, SUPER_ACTION)
        .await?;

    Ok(next.run(request).await)
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

use axum::Json;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use keygate_domain::Principal;

use crate::dto::{
    ChangePasswordRequest, LoginRequest, PrincipalResponse, RefreshRequest, RegisterRequest,
    TokenResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

/// POST /auth/register - Create a new account with email+password.
pub async fn register_handler(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<PrincipalResponse>)> {
    let principal = state
        .credential_service
        .register(&payload.email, &payload.password)
        .await?;

    Ok((StatusCode::CREATED, Json(principal.into())))
}

/// POST /auth/login - Authenticate with email+password, returning a
/// signed bearer token.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let principal = state
        .credential_service
        .verify(&payload.email, &payload.password)
        .await?;

    let token = state.token_service.issue(principal.id)?;
    Ok(Json(token.into()))
}

/// POST /auth/refresh - Trade a still-valid token for a fresh one.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let token = state.token_service.refresh(&payload.token)?;
    Ok(Json(token.into()))
}

/// GET /auth/me - Return the authenticated principal.
pub async fn me_handler(Extension(principal): Extension<Principal>) -> Json<PrincipalResponse> {
    Json(principal.into())
}

/// PUT /profile/password - Change the secret after verifying the
/// current one.
pub async fn change_password_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    state
        .credential_service
        .change_password(
            principal.id,
            &payload.current_password,
            &payload.new_password,
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

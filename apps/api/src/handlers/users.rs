use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use keygate_domain::{Principal, PrincipalId};
use uuid::Uuid;

use crate::dto::{PrincipalResponse, SetActiveRequest, SetAdminOverrideRequest};
use crate::error::ApiResult;
use crate::state::AppState;

/// GET /users - List principals. Requires `user:read`.
pub async fn list_users_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Vec<PrincipalResponse>>> {
    state
        .authorization_service
        .require(&principal, "user", "read")
        .await?;

    let principals = state.credential_service.list_principals().await?;
    Ok(Json(
        principals.into_iter().map(PrincipalResponse::from).collect(),
    ))
}

/// GET /users/{id} - Load one principal. Requires `user:read`.
pub async fn get_user_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(principal_id): Path<Uuid>,
) -> ApiResult<Json<PrincipalResponse>> {
    state
        .authorization_service
        .require(&principal, "user", "read")
        .await?;

    let found = state
        .credential_service
        .principal_by_id(PrincipalId::from_uuid(principal_id))
        .await?;

    Ok(Json(found.into()))
}

/// PUT /rbac/users/{id}/override - Toggle the admin-override flag.
pub async fn set_admin_override_handler(
    State(state): State<AppState>,
    Path(principal_id): Path<Uuid>,
    Json(payload): Json<SetAdminOverrideRequest>,
) -> ApiResult<StatusCode> {
    state
        .credential_service
        .set_admin_override(PrincipalId::from_uuid(principal_id), payload.enabled)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// PUT /rbac/users/{id}/active - Activate or soft-deactivate a
/// principal. Deactivation is the only removal path; rows are never
/// deleted.
pub async fn set_active_handler(
    State(state): State<AppState>,
    Path(principal_id): Path<Uuid>,
    Json(payload): Json<SetActiveRequest>,
) -> ApiResult<StatusCode> {
    state
        .credential_service
        .set_active(PrincipalId::from_uuid(principal_id), payload.active)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

//! Registry and assignment-graph administration handlers.
//!
//! All routes here sit behind the admin gate in the router.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use keygate_domain::{PermissionId, PrincipalId, RoleId};
use uuid::Uuid;

use crate::dto::{
    CheckPermissionRequest, CheckPermissionResponse, CreatePermissionRequest, CreateRoleRequest,
    PermissionIdsRequest, PermissionResponse, RoleIdsRequest, RoleResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

/// GET /rbac/permissions - List all permissions.
pub async fn list_permissions_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<PermissionResponse>>> {
    let permissions = state.access_admin_service.list_permissions().await?;
    Ok(Json(
        permissions
            .into_iter()
            .map(PermissionResponse::from)
            .collect(),
    ))
}

/// POST /rbac/permissions - Register a permission.
pub async fn create_permission_handler(
    State(state): State<AppState>,
    Json(payload): Json<CreatePermissionRequest>,
) -> ApiResult<(StatusCode, Json<PermissionResponse>)> {
    let permission = state
        .access_admin_service
        .create_permission(
            &payload.name,
            &payload.resource,
            &payload.action,
            payload.description.as_deref(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(permission.into())))
}

/// DELETE /rbac/permissions/{id} - Delete an unreferenced permission.
pub async fn delete_permission_handler(
    State(state): State<AppState>,
    Path(permission_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .access_admin_service
        .delete_permission(PermissionId::from_uuid(permission_id))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /rbac/roles - List all roles with their permissions.
pub async fn list_roles_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<RoleResponse>>> {
    let roles = state.access_admin_service.list_roles().await?;
    Ok(Json(roles.into_iter().map(RoleResponse::from).collect()))
}

/// POST /rbac/roles - Register a role.
pub async fn create_role_handler(
    State(state): State<AppState>,
    Json(payload): Json<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleResponse>)> {
    let role = state
        .access_admin_service
        .create_role(
            &payload.name,
            payload.description.as_deref(),
            payload.is_default,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(role.into())))
}

/// DELETE /rbac/roles/{id} - Delete a role, cascading its assignments.
pub async fn delete_role_handler(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .access_admin_service
        .delete_role(RoleId::from_uuid(role_id))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /rbac/roles/{id}/permissions - Attach permissions to a role.
pub async fn attach_permissions_handler(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
    Json(payload): Json<PermissionIdsRequest>,
) -> ApiResult<StatusCode> {
    let permission_ids: Vec<PermissionId> = payload
        .permission_ids
        .into_iter()
        .map(PermissionId::from_uuid)
        .collect();

    state
        .access_admin_service
        .attach_permissions(RoleId::from_uuid(role_id), &permission_ids)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /rbac/roles/{id}/permissions - Detach permissions from a role.
pub async fn detach_permissions_handler(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
    Json(payload): Json<PermissionIdsRequest>,
) -> ApiResult<StatusCode> {
    let permission_ids: Vec<PermissionId> = payload
        .permission_ids
        .into_iter()
        .map(PermissionId::from_uuid)
        .collect();

    state
        .access_admin_service
        .detach_permissions(RoleId::from_uuid(role_id), &permission_ids)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /rbac/users/{id}/roles - List a principal's roles.
pub async fn list_assigned_roles_handler(
    State(state): State<AppState>,
    Path(principal_id): Path<Uuid>,
) -> ApiResult<Json<Vec<RoleResponse>>> {
    let roles = state
        .access_admin_service
        .roles_of(PrincipalId::from_uuid(principal_id))
        .await?;

    Ok(Json(roles.into_iter().map(RoleResponse::from).collect()))
}

/// POST /rbac/users/{id}/roles - Assign roles as one atomic batch.
pub async fn assign_roles_handler(
    State(state): State<AppState>,
    Path(principal_id): Path<Uuid>,
    Json(payload): Json<RoleIdsRequest>,
) -> ApiResult<StatusCode> {
    let role_ids: Vec<RoleId> = payload.role_ids.into_iter().map(RoleId::from_uuid).collect();

    state
        .access_admin_service
        .assign_roles(PrincipalId::from_uuid(principal_id), &role_ids)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /rbac/check-permission - Evaluate the decision rules for a
/// principal without side effects.
pub async fn check_permission_handler(
    State(state): State<AppState>,
    Json(payload): Json<CheckPermissionRequest>,
) -> ApiResult<Json<CheckPermissionResponse>> {
    let principal = state
        .credential_service
        .principal_by_id(PrincipalId::from_uuid(payload.principal_id))
        .await?;

    let granted = state
        .authorization_service
        .authorize(&principal, &payload.resource, &payload.action)
        .await?;

    Ok(Json(CheckPermissionResponse { granted }))
}

/// DELETE /rbac/users/{id}/roles/{role_id} - Revoke one assignment.
pub async fn revoke_role_handler(
    State(state): State<AppState>,
    Path((principal_id, role_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state
        .access_admin_service
        .revoke_role(
            PrincipalId::from_uuid(principal_id),
            RoleId::from_uuid(role_id),
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

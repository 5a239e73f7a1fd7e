//! Wire types for the HTTP surface.
//!
//! Responses never carry secret material; the hash stays behind the
//! service boundary.

use chrono::{DateTime, Utc};
use keygate_application::SignedToken;
use keygate_domain::{Permission, Principal, Role};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Incoming payload for email/password registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// Incoming payload for email/password login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Incoming payload for token refresh.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub token: String,
}

/// Incoming payload for a password change.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Issued bearer token with its expiry.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
}

impl From<SignedToken> for TokenResponse {
    fn from(value: SignedToken) -> Self {
        Self {
            access_token: value.token,
            token_type: "bearer",
            expires_at: value.expires_at,
        }
    }
}

/// Principal projection without secret material.
#[derive(Debug, Serialize)]
pub struct PrincipalResponse {
    pub id: Uuid,
    pub email: String,
    pub is_active: bool,
    pub admin_override: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Principal> for PrincipalResponse {
    fn from(value: Principal) -> Self {
        Self {
            id: value.id.as_uuid(),
            email: value.email,
            is_active: value.is_active,
            admin_override: value.admin_override,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

/// Incoming payload for permission creation.
#[derive(Debug, Deserialize)]
pub struct CreatePermissionRequest {
    pub name: String,
    pub resource: String,
    pub action: String,
    pub description: Option<String>,
}

/// Registered permission.
#[derive(Debug, Serialize)]
pub struct PermissionResponse {
    pub id: Uuid,
    pub name: String,
    pub resource: String,
    pub action: String,
    pub description: Option<String>,
}

impl From<Permission> for PermissionResponse {
    fn from(value: Permission) -> Self {
        Self {
            id: value.id.as_uuid(),
            name: value.name,
            resource: value.resource,
            action: value.action,
            description: value.description,
        }
    }
}

/// Incoming payload for role creation.
#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

/// Registered role with its permission set.
#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_default: bool,
    pub permissions: Vec<PermissionResponse>,
}

impl From<Role> for RoleResponse {
    fn from(value: Role) -> Self {
        Self {
            id: value.id.as_uuid(),
            name: value.name,
            description: value.description,
            is_default: value.is_default,
            permissions: value
                .permissions
                .into_iter()
                .map(PermissionResponse::from)
                .collect(),
        }
    }
}

/// Incoming payload for the admin-override toggle.
#[derive(Debug, Deserialize)]
pub struct SetAdminOverrideRequest {
    pub enabled: bool,
}

/// Incoming payload for the active-flag toggle.
#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

/// Incoming payload for an authorization check.
#[derive(Debug, Deserialize)]
pub struct CheckPermissionRequest {
    pub principal_id: Uuid,
    pub resource: String,
    pub action: String,
}

/// Decision outcome for an authorization check.
#[derive(Debug, Serialize)]
pub struct CheckPermissionResponse {
    pub granted: bool,
}

/// Incoming payload for attaching or detaching permissions.
#[derive(Debug, Deserialize)]
pub struct PermissionIdsRequest {
    pub permission_ids: Vec<Uuid>,
}

/// Incoming payload for a batch role assignment.
#[derive(Debug, Deserialize)]
pub struct RoleIdsRequest {
    pub role_ids: Vec<Uuid>,
}

/// Health probe response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

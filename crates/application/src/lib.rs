//! Application services and ports.

#![forbid(unsafe_code)]

mod access_admin_service;
mod authorization_service;
mod bootstrap;
mod credential_service;
mod token_service;

pub use access_admin_service::{AccessAdminService, AccessRepository};
pub use authorization_service::{AuthorizationService, RoleAssignmentReader};
pub use bootstrap::{BASELINE_PERMISSIONS, BASELINE_ROLES, ensure_baseline_access};
pub use credential_service::{
    CredentialService, PasswordHasher, PrincipalRecord, PrincipalRepository,
};
pub use token_service::{DEFAULT_TOKEN_TTL_MINUTES, SignedToken, TokenService};

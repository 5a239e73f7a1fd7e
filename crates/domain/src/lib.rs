//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod access;
mod principal;
mod token;

pub use access::{
    AccessDecision, Permission, PermissionId, Role, RoleId, SUPER_ACTION, SUPER_RESOURCE,
    decide_access, validate_registry_name,
};
pub use principal::{
    EmailAddress, PASSWORD_MAX_LENGTH, PASSWORD_MIN_LENGTH, Principal, PrincipalId,
    validate_password,
};
pub use token::AccessClaims;

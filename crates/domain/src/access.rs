//! Permissions, roles, and the access decision function.

use keygate_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Resource component of the role-level super-permission.
pub const SUPER_RESOURCE: &str = "admin";

/// Action component of the role-level super-permission.
pub const SUPER_ACTION: &str = "all";

/// Unique identifier for a permission record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PermissionId(Uuid);

impl PermissionId {
    /// Creates a new random permission identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a permission identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PermissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PermissionId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Unique identifier for a role record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleId(Uuid);

impl RoleId {
    /// Creates a new random role identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a role identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RoleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// An atomic (resource, action) capability.
///
/// The name is unique across the deployment. The (resource, action) pair
/// typically is too, but uniqueness is only enforced on the name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Stable permission identifier.
    pub id: PermissionId,
    /// Unique permission name, conventionally `resource:action`.
    pub name: String,
    /// Resource the permission applies to.
    pub resource: String,
    /// Action the permission allows on the resource.
    pub action: String,
    /// Optional human-readable description.
    pub description: Option<String>,
}

impl Permission {
    /// Returns whether this is the `admin:all` super-permission.
    #[must_use]
    pub fn is_super(&self) -> bool {
        self.resource == SUPER_RESOURCE && self.action == SUPER_ACTION
    }

    /// Returns whether the permission grants exactly the requested pair.
    #[must_use]
    pub fn matches(&self, resource: &str, action: &str) -> bool {
        self.resource == resource && self.action == action
    }
}

/// A named, reusable bundle of permissions assignable to principals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Stable role identifier.
    pub id: RoleId,
    /// Unique role name.
    pub name: String,
    /// Optional human-readable description.
    pub description: Option<String>,
    /// Roles flagged default are assigned to every newly registered
    /// principal. Multiple defaults are allowed and all are applied.
    pub is_default: bool,
    /// Permissions attached to the role.
    pub permissions: Vec<Permission>,
}

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// The principal may perform the action.
    Grant,
    /// No matching grant exists. There is no explicit-deny concept.
    Deny,
}

impl AccessDecision {
    /// Returns `true` for [`AccessDecision::Grant`].
    #[must_use]
    pub fn is_grant(&self) -> bool {
        matches!(self, Self::Grant)
    }
}

/// Decides whether a principal may perform `action` on `resource`.
///
/// Rules evaluate in order and the first match wins:
///
/// 1. `admin_override` grants unconditionally. This principal-level flag
///    supersedes role evaluation entirely and is distinct from any role
///    named "admin".
/// 2. Holding the `admin:all` super-permission via any role grants
///    unconditionally. Both escape hatches exist independently; either is
///    sufficient on its own.
/// 3. An exact (resource, action) match in the union of role permissions
///    grants.
/// 4. Anything else denies.
///
/// Pure function over an already-loaded snapshot: no I/O, no mutation,
/// safe to re-evaluate per request.
#[must_use]
pub fn decide_access(
    admin_override: bool,
    roles: &[Role],
    resource: &str,
    action: &str,
) -> AccessDecision {
    if admin_override {
        return AccessDecision::Grant;
    }

    let mut permissions = roles.iter().flat_map(|role| role.permissions.iter());

    if permissions.any(|permission| permission.is_super() || permission.matches(resource, action))
    {
        return AccessDecision::Grant;
    }

    AccessDecision::Deny
}

/// Validates a permission or role name for registry writes.
pub fn validate_registry_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("name must not be empty".to_owned()));
    }

    if name.len() > 100 {
        return Err(AppError::Validation(
            "name must not exceed 100 characters".to_owned(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn permission(resource: &str, action: &str) -> Permission {
        Permission {
            id: PermissionId::new(),
            name: format!("{resource}:{action}"),
            resource: resource.to_owned(),
            action: action.to_owned(),
            description: None,
        }
    }

    fn role(name: &str, permissions: Vec<Permission>) -> Role {
        Role {
            id: RoleId::new(),
            name: name.to_owned(),
            description: None,
            is_default: false,
            permissions,
        }
    }

    #[test]
    fn exact_match_grants() {
        let roles = vec![role("editor", vec![permission("post", "write")])];
        assert!(decide_access(false, &roles, "post", "write").is_grant());
    }

    #[test]
    fn missing_pair_denies() {
        let roles = vec![role("editor", vec![permission("post", "write")])];
        assert!(!decide_access(false, &roles, "post", "delete").is_grant());
        assert!(!decide_access(false, &roles, "user", "write").is_grant());
    }

    #[test]
    fn super_permission_grants_everything() {
        let roles = vec![role("admin", vec![permission(SUPER_RESOURCE, SUPER_ACTION)])];
        assert!(decide_access(false, &roles, "anything", "anything").is_grant());
    }

    #[test]
    fn union_across_roles_is_consulted() {
        let roles = vec![
            role("reader", vec![permission("post", "read")]),
            role("writer", vec![permission("post", "write")]),
        ];
        assert!(decide_access(false, &roles, "post", "read").is_grant());
        assert!(decide_access(false, &roles, "post", "write").is_grant());
    }

    #[test]
    fn admin_resource_without_all_action_is_not_super() {
        let roles = vec![role("auditor", vec![permission("admin", "read")])];
        assert!(decide_access(false, &roles, "admin", "read").is_grant());
        assert!(!decide_access(false, &roles, "post", "write").is_grant());
    }

    proptest! {
        #[test]
        fn override_grants_for_any_request(resource in "[a-z]{1,12}", action in "[a-z]{1,12}") {
            prop_assert!(decide_access(true, &[], &resource, &action).is_grant());
        }

        #[test]
        fn no_roles_no_override_denies_everything(
            resource in "[a-z]{1,12}",
            action in "[a-z]{1,12}",
        ) {
            prop_assert!(!decide_access(false, &[], &resource, &action).is_grant());
        }

        #[test]
        fn empty_roles_grant_nothing(resource in "[a-z]{1,12}", action in "[a-z]{1,12}") {
            let roles = vec![role("shell", vec![])];
            prop_assert!(!decide_access(false, &roles, &resource, &action).is_grant());
        }
    }
}

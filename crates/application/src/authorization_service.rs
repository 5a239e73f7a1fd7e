//! Authorization decision point.

use std::sync::Arc;

use async_trait::async_trait;

use keygate_core::{AppError, AppResult};
use keygate_domain::{Principal, PrincipalId, Role, decide_access};

/// Read-only port over the assignment graph.
///
/// The decision point only ever reads assignments; mutation lives behind
/// [`crate::AccessRepository`].
#[async_trait]
pub trait RoleAssignmentReader: Send + Sync {
    /// Returns the roles a principal holds, with permissions loaded.
    async fn roles_of(&self, principal_id: PrincipalId) -> AppResult<Vec<Role>>;
}

/// Application service answering grant/deny questions.
///
/// Stateless and idempotent: each call evaluates the decision rules over
/// the current snapshot of assignments, roles, and permissions, with no
/// side effects.
#[derive(Clone)]
pub struct AuthorizationService {
    assignments: Arc<dyn RoleAssignmentReader>,
}

impl AuthorizationService {
    /// Creates a new service from an assignment reader implementation.
    #[must_use]
    pub fn new(assignments: Arc<dyn RoleAssignmentReader>) -> Self {
        Self { assignments }
    }

    /// Returns whether the principal may perform `action` on `resource`.
    ///
    /// The admin-override flag short-circuits before any store round
    /// trip; everything else defers to the pure decision function over
    /// the loaded role set.
    pub async fn authorize(
        &self,
        principal: &Principal,
        resource: &str,
        action: &str,
    ) -> AppResult<bool> {
        if principal.admin_override {
            return Ok(true);
        }

        let roles = self.assignments.roles_of(principal.id).await?;
        Ok(decide_access(false, &roles, resource, action).is_grant())
    }

    /// Ensures the principal may perform `action` on `resource`.
    ///
    /// Denial is terminal and never retried; callers translate the
    /// [`AppError::Forbidden`] into their 403-equivalent outcome.
    pub async fn require(
        &self,
        principal: &Principal,
        resource: &str,
        action: &str,
    ) -> AppResult<()> {
        if self.authorize(principal, resource, action).await? {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "principal '{}' may not perform '{action}' on '{resource}'",
            principal.id
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;
    use keygate_core::{AppError, AppResult};
    use keygate_domain::{
        Permission, PermissionId, Principal, PrincipalId, Role, RoleId, SUPER_ACTION,
        SUPER_RESOURCE,
    };

    use super::{AuthorizationService, RoleAssignmentReader};

    struct FakeAssignments {
        map: HashMap<PrincipalId, Vec<Role>>,
    }

    #[async_trait]
    impl RoleAssignmentReader for FakeAssignments {
        async fn roles_of(&self, principal_id: PrincipalId) -> AppResult<Vec<Role>> {
            Ok(self.map.get(&principal_id).cloned().unwrap_or_default())
        }
    }

    fn principal(admin_override: bool) -> Principal {
        let now = Utc::now();
        Principal {
            id: PrincipalId::new(),
            email: "subject@example.com".to_owned(),
            is_active: true,
            admin_override,
            created_at: now,
            updated_at: now,
        }
    }

    fn role_with(resource: &str, action: &str) -> Role {
        Role {
            id: RoleId::new(),
            name: format!("{resource}-{action}"),
            description: None,
            is_default: false,
            permissions: vec![Permission {
                id: PermissionId::new(),
                name: format!("{resource}:{action}"),
                resource: resource.to_owned(),
                action: action.to_owned(),
                description: None,
            }],
        }
    }

    fn service_for(principal: &Principal, roles: Vec<Role>) -> AuthorizationService {
        AuthorizationService::new(Arc::new(FakeAssignments {
            map: HashMap::from([(principal.id, roles)]),
        }))
    }

    #[tokio::test]
    async fn override_grants_with_zero_roles() {
        let principal = principal(true);
        let service = service_for(&principal, vec![]);

        let granted = service.authorize(&principal, "anything", "at-all").await;
        assert_eq!(granted.ok(), Some(true));
    }

    #[tokio::test]
    async fn no_roles_denies_everything() {
        let principal = principal(false);
        let service = service_for(&principal, vec![]);

        let granted = service.authorize(&principal, "post", "read").await;
        assert_eq!(granted.ok(), Some(false));
    }

    #[tokio::test]
    async fn super_permission_role_grants_everything() {
        let principal = principal(false);
        let service = service_for(&principal, vec![role_with(SUPER_RESOURCE, SUPER_ACTION)]);

        let granted = service.authorize(&principal, "anything", "anything").await;
        assert_eq!(granted.ok(), Some(true));
    }

    #[tokio::test]
    async fn exact_pair_is_required_otherwise() {
        let principal = principal(false);
        let service = service_for(&principal, vec![role_with("post", "write")]);

        let write = service.authorize(&principal, "post", "write").await;
        let delete = service.authorize(&principal, "post", "delete").await;
        assert_eq!(write.ok(), Some(true));
        assert_eq!(delete.ok(), Some(false));
    }

    #[tokio::test]
    async fn require_maps_deny_to_forbidden() {
        let principal = principal(false);
        let service = service_for(&principal, vec![]);

        let result = service.require(&principal, "post", "write").await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}

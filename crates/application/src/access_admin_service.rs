//! Permission registry, role registry, and assignment graph
//! administration.

use std::sync::Arc;

use async_trait::async_trait;

use keygate_core::{AppError, AppResult};
use keygate_domain::{
    Permission, PermissionId, PrincipalId, Role, RoleId, validate_registry_name,
};

/// Repository port for the permission/role registries and the assignment
/// graph. The graph is the sole authority on which roles a principal
/// holds; nothing else mutates it.
#[async_trait]
pub trait AccessRepository: Send + Sync {
    /// Creates a permission. Fails with [`AppError::DuplicateName`] when
    /// the name is taken.
    async fn create_permission(
        &self,
        name: &str,
        resource: &str,
        action: &str,
        description: Option<&str>,
    ) -> AppResult<Permission>;

    /// Finds a permission by unique name.
    async fn find_permission_by_name(&self, name: &str) -> AppResult<Option<Permission>>;

    /// Lists all permissions, ordered by name.
    async fn list_permissions(&self) -> AppResult<Vec<Permission>>;

    /// Deletes an unreferenced permission. Fails with
    /// [`AppError::Conflict`] while any role still references it and
    /// with [`AppError::NotFound`] when it does not exist.
    async fn delete_permission(&self, permission_id: PermissionId) -> AppResult<()>;

    /// Creates a role. Fails with [`AppError::DuplicateName`] when the
    /// name is taken.
    async fn create_role(
        &self,
        name: &str,
        description: Option<&str>,
        is_default: bool,
    ) -> AppResult<Role>;

    /// Finds a role by unique name.
    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>>;

    /// Lists all roles with their permissions, ordered by name.
    async fn list_roles(&self) -> AppResult<Vec<Role>>;

    /// Deletes a role, cascading removal of its permission attachments
    /// and of every assignment in the graph. Principals and permissions
    /// survive. Fails with [`AppError::NotFound`] when absent.
    async fn delete_role(&self, role_id: RoleId) -> AppResult<()>;

    /// Attaches permissions to a role. Idempotent set operation:
    /// already-attached permissions are no-ops. Unknown role or
    /// permission identifiers fail with [`AppError::NotFound`].
    async fn attach_permissions(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> AppResult<()>;

    /// Detaches permissions from a role. Detaching an absent attachment
    /// is a no-op, not an error.
    async fn detach_permissions(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> AppResult<()>;

    /// Assigns the given roles to a principal as one atomic batch.
    ///
    /// Any unknown role identifier fails the whole batch with
    /// [`AppError::NotFound`]; either all requested roles are assigned
    /// or none are. Already-held roles are no-ops.
    async fn assign_roles(&self, principal_id: PrincipalId, role_ids: &[RoleId]) -> AppResult<()>;

    /// Revokes one assignment. Revoking an absent assignment is a no-op.
    async fn revoke_role(&self, principal_id: PrincipalId, role_id: RoleId) -> AppResult<()>;

    /// Returns the roles a principal holds, with permissions loaded.
    async fn roles_of(&self, principal_id: PrincipalId) -> AppResult<Vec<Role>>;
}

/// Application service for administering the registries and the
/// assignment graph.
#[derive(Clone)]
pub struct AccessAdminService {
    repository: Arc<dyn AccessRepository>,
}

impl AccessAdminService {
    /// Creates a new service from a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn AccessRepository>) -> Self {
        Self { repository }
    }

    /// Creates a permission after validating its parts.
    pub async fn create_permission(
        &self,
        name: &str,
        resource: &str,
        action: &str,
        description: Option<&str>,
    ) -> AppResult<Permission> {
        validate_registry_name(name)?;

        if resource.trim().is_empty() || action.trim().is_empty() {
            return Err(AppError::Validation(
                "resource and action must not be empty".to_owned(),
            ));
        }

        self.repository
            .create_permission(name, resource, action, description)
            .await
    }

    /// Lists all registered permissions.
    pub async fn list_permissions(&self) -> AppResult<Vec<Permission>> {
        self.repository.list_permissions().await
    }

    /// Deletes a permission that no role references.
    ///
    /// Referenced permissions are immutable; a rename is a delete and
    /// recreate, which this refusal makes explicit.
    pub async fn delete_permission(&self, permission_id: PermissionId) -> AppResult<()> {
        self.repository.delete_permission(permission_id).await
    }

    /// Creates a role.
    pub async fn create_role(
        &self,
        name: &str,
        description: Option<&str>,
        is_default: bool,
    ) -> AppResult<Role> {
        validate_registry_name(name)?;
        self.repository
            .create_role(name, description, is_default)
            .await
    }

    /// Lists all roles with their permission sets.
    pub async fn list_roles(&self) -> AppResult<Vec<Role>> {
        self.repository.list_roles().await
    }

    /// Deletes a role and cascades assignment removal.
    pub async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
        self.repository.delete_role(role_id).await
    }

    /// Attaches permissions to a role. Idempotent.
    pub async fn attach_permissions(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> AppResult<()> {
        self.repository
            .attach_permissions(role_id, permission_ids)
            .await
    }

    /// Detaches permissions from a role. Idempotent.
    pub async fn detach_permissions(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> AppResult<()> {
        self.repository
            .detach_permissions(role_id, permission_ids)
            .await
    }

    /// Grants roles to a principal atomically.
    pub async fn assign_roles(
        &self,
        principal_id: PrincipalId,
        role_ids: &[RoleId],
    ) -> AppResult<()> {
        self.repository.assign_roles(principal_id, role_ids).await
    }

    /// Revokes one role from a principal.
    pub async fn revoke_role(&self, principal_id: PrincipalId, role_id: RoleId) -> AppResult<()> {
        self.repository.revoke_role(principal_id, role_id).await
    }

    /// Returns the roles a principal currently holds.
    pub async fn roles_of(&self, principal_id: PrincipalId) -> AppResult<Vec<Role>> {
        self.repository.roles_of(principal_id).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use keygate_core::{AppError, AppResult};
    use keygate_domain::{Permission, PermissionId, PrincipalId, Role, RoleId};

    use super::{AccessAdminService, AccessRepository};

    /// Minimal stub asserting that validation rejects bad input before
    /// the repository is reached.
    struct UnreachableRepository;

    #[async_trait]
    impl AccessRepository for UnreachableRepository {
        async fn create_permission(
            &self,
            _name: &str,
            _resource: &str,
            _action: &str,
            _description: Option<&str>,
        ) -> AppResult<Permission> {
            panic!("repository must not be reached")
        }

        async fn find_permission_by_name(&self, _name: &str) -> AppResult<Option<Permission>> {
            panic!("repository must not be reached")
        }

        async fn list_permissions(&self) -> AppResult<Vec<Permission>> {
            panic!("repository must not be reached")
        }

        async fn delete_permission(&self, _permission_id: PermissionId) -> AppResult<()> {
            panic!("repository must not be reached")
        }

        async fn create_role(
            &self,
            _name: &str,
            _description: Option<&str>,
            _is_default: bool,
        ) -> AppResult<Role> {
            panic!("repository must not be reached")
        }

        async fn find_role_by_name(&self, _name: &str) -> AppResult<Option<Role>> {
            panic!("repository must not be reached")
        }

        async fn list_roles(&self) -> AppResult<Vec<Role>> {
            panic!("repository must not be reached")
        }

        async fn delete_role(&self, _role_id: RoleId) -> AppResult<()> {
            panic!("repository must not be reached")
        }

        async fn attach_permissions(
            &self,
            _role_id: RoleId,
            _permission_ids: &[PermissionId],
        ) -> AppResult<()> {
            panic!("repository must not be reached")
        }

        async fn detach_permissions(
            &self,
            _role_id: RoleId,
            _permission_ids: &[PermissionId],
        ) -> AppResult<()> {
            panic!("repository must not be reached")
        }

        async fn assign_roles(
            &self,
            _principal_id: PrincipalId,
            _role_ids: &[RoleId],
        ) -> AppResult<()> {
            panic!("repository must not be reached")
        }

        async fn revoke_role(
            &self,
            _principal_id: PrincipalId,
            _role_id: RoleId,
        ) -> AppResult<()> {
            panic!("repository must not be reached")
        }

        async fn roles_of(&self, _principal_id: PrincipalId) -> AppResult<Vec<Role>> {
            panic!("repository must not be reached")
        }
    }

    #[tokio::test]
    async fn empty_permission_name_is_rejected() {
        let service = AccessAdminService::new(Arc::new(UnreachableRepository));

        let result = service.create_permission("  ", "post", "write", None).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn empty_resource_or_action_is_rejected() {
        let service = AccessAdminService::new(Arc::new(UnreachableRepository));

        let no_resource = service.create_permission("post:write", " ", "write", None).await;
        assert!(matches!(no_resource, Err(AppError::Validation(_))));

        let no_action = service.create_permission("post:write", "post", "", None).await;
        assert!(matches!(no_action, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn empty_role_name_is_rejected() {
        let service = AccessAdminService::new(Arc::new(UnreachableRepository));

        let result = service.create_role("", None, false).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}

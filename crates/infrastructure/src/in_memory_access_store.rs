//! In-memory implementation of the persistence ports.
//!
//! Mirrors the PostgreSQL adapters' semantics (uniqueness, cascades,
//! batch atomicity) over a single mutex-guarded state so services can be
//! exercised without a database.

use std::collections::{BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use keygate_application::{
    AccessRepository, PrincipalRecord, PrincipalRepository, RoleAssignmentReader,
};
use keygate_core::{AppError, AppResult};
use keygate_domain::{Permission, PermissionId, PrincipalId, Role, RoleId};

#[derive(Debug, Clone)]
struct RoleRecord {
    id: RoleId,
    name: String,
    description: Option<String>,
    is_default: bool,
    permission_ids: BTreeSet<PermissionId>,
}

#[derive(Default)]
struct StoreState {
    principals: HashMap<PrincipalId, PrincipalRecord>,
    permissions: HashMap<PermissionId, Permission>,
    roles: HashMap<RoleId, RoleRecord>,
    assignments: HashSet<(PrincipalId, RoleId)>,
}

impl StoreState {
    fn materialize(&self, record: &RoleRecord) -> Role {
        let mut permissions: Vec<Permission> = record
            .permission_ids
            .iter()
            .filter_map(|permission_id| self.permissions.get(permission_id).cloned())
            .collect();
        permissions.sort_by(|left, right| left.name.cmp(&right.name));

        Role {
            id: record.id,
            name: record.name.clone(),
            description: record.description.clone(),
            is_default: record.is_default,
            permissions,
        }
    }
}

/// In-memory store implementing every persistence port.
#[derive(Default)]
pub struct InMemoryAccessStore {
    state: Mutex<StoreState>,
}

impl InMemoryAccessStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PrincipalRepository for InMemoryAccessStore {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<PrincipalRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .principals
            .values()
            .find(|record| record.email == email)
            .cloned())
    }

    async fn find_by_id(&self, principal_id: PrincipalId) -> AppResult<Option<PrincipalRecord>> {
        let state = self.state.lock().await;
        Ok(state.principals.get(&principal_id).cloned())
    }

    async fn list(&self) -> AppResult<Vec<PrincipalRecord>> {
        let state = self.state.lock().await;
        let mut records: Vec<PrincipalRecord> = state.principals.values().cloned().collect();
        records.sort_by_key(|record| record.created_at);
        Ok(records)
    }

    async fn create(&self, email: &str, password_hash: &str) -> AppResult<PrincipalRecord> {
        let mut state = self.state.lock().await;

        if state.principals.values().any(|record| record.email == email) {
            return Err(AppError::DuplicateEmail);
        }

        let now = Utc::now();
        let record = PrincipalRecord {
            id: PrincipalId::new(),
            email: email.to_owned(),
            password_hash: password_hash.to_owned(),
            is_active: true,
            admin_override: false,
            created_at: now,
            updated_at: now,
        };

        // One lock guards the whole write, so the principal and its
        // default roles appear together, like the SQL transaction.
        let default_roles: Vec<RoleId> = state
            .roles
            .values()
            .filter(|role| role.is_default)
            .map(|role| role.id)
            .collect();
        for role_id in default_roles {
            state.assignments.insert((record.id, role_id));
        }

        state.principals.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_password(
        &self,
        principal_id: PrincipalId,
        password_hash: &str,
    ) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let record = state
            .principals
            .get_mut(&principal_id)
            .ok_or_else(|| AppError::NotFound(format!("principal '{principal_id}'")))?;
        record.password_hash = password_hash.to_owned();
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn set_admin_override(&self, principal_id: PrincipalId, enabled: bool) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let record = state
            .principals
            .get_mut(&principal_id)
            .ok_or_else(|| AppError::NotFound(format!("principal '{principal_id}'")))?;
        record.admin_override = enabled;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn set_active(&self, principal_id: PrincipalId, active: bool) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let record = state
            .principals
            .get_mut(&principal_id)
            .ok_or_else(|| AppError::NotFound(format!("principal '{principal_id}'")))?;
        record.is_active = active;
        record.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl AccessRepository for InMemoryAccessStore {
    async fn create_permission(
        &self,
        name: &str,
        resource: &str,
        action: &str,
        description: Option<&str>,
    ) -> AppResult<Permission> {
        let mut state = self.state.lock().await;

        if state.permissions.values().any(|entry| entry.name == name) {
            return Err(AppError::DuplicateName(name.to_owned()));
        }

        let permission = Permission {
            id: PermissionId::new(),
            name: name.to_owned(),
            resource: resource.to_owned(),
            action: action.to_owned(),
            description: description.map(ToOwned::to_owned),
        };
        state.permissions.insert(permission.id, permission.clone());
        Ok(permission)
    }

    async fn find_permission_by_name(&self, name: &str) -> AppResult<Option<Permission>> {
        let state = self.state.lock().await;
        Ok(state
            .permissions
            .values()
            .find(|entry| entry.name == name)
            .cloned())
    }

    async fn list_permissions(&self) -> AppResult<Vec<Permission>> {
        let state = self.state.lock().await;
        let mut permissions: Vec<Permission> = state.permissions.values().cloned().collect();
        permissions.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(permissions)
    }

    async fn delete_permission(&self, permission_id: PermissionId) -> AppResult<()> {
        let mut state = self.state.lock().await;

        if !state.permissions.contains_key(&permission_id) {
            return Err(AppError::NotFound(format!("permission '{permission_id}'")));
        }

        let referenced = state
            .roles
            .values()
            .any(|role| role.permission_ids.contains(&permission_id));
        if referenced {
            return Err(AppError::Conflict(format!(
                "permission '{permission_id}' is still attached to a role"
            )));
        }

        state.permissions.remove(&permission_id);
        Ok(())
    }

    async fn create_role(
        &self,
        name: &str,
        description: Option<&str>,
        is_default: bool,
    ) -> AppResult<Role> {
        let mut state = self.state.lock().await;

        if state.roles.values().any(|entry| entry.name == name) {
            return Err(AppError::DuplicateName(name.to_owned()));
        }

        let record = RoleRecord {
            id: RoleId::new(),
            name: name.to_owned(),
            description: description.map(ToOwned::to_owned),
            is_default,
            permission_ids: BTreeSet::new(),
        };
        let role = state.materialize(&record);
        state.roles.insert(record.id, record);
        Ok(role)
    }

    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        let state = self.state.lock().await;
        Ok(state
            .roles
            .values()
            .find(|entry| entry.name == name)
            .map(|record| state.materialize(record)))
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        let state = self.state.lock().await;
        let mut roles: Vec<Role> = state
            .roles
            .values()
            .map(|record| state.materialize(record))
            .collect();
        roles.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(roles)
    }

    async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
        let mut state = self.state.lock().await;

        if state.roles.remove(&role_id).is_none() {
            return Err(AppError::NotFound(format!("role '{role_id}'")));
        }

        state
            .assignments
            .retain(|(_, assigned_role)| *assigned_role != role_id);
        Ok(())
    }

    async fn attach_permissions(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> AppResult<()> {
        let mut state = self.state.lock().await;

        for permission_id in permission_ids {
            if !state.permissions.contains_key(permission_id) {
                return Err(AppError::NotFound(format!("permission '{permission_id}'")));
            }
        }

        let role = state
            .roles
            .get_mut(&role_id)
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}'")))?;

        for permission_id in permission_ids {
            role.permission_ids.insert(*permission_id);
        }
        Ok(())
    }

    async fn detach_permissions(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> AppResult<()> {
        let mut state = self.state.lock().await;

        if let Some(role) = state.roles.get_mut(&role_id) {
            for permission_id in permission_ids {
                role.permission_ids.remove(permission_id);
            }
        }
        Ok(())
    }

    async fn assign_roles(&self, principal_id: PrincipalId, role_ids: &[RoleId]) -> AppResult<()> {
        let mut state = self.state.lock().await;

        if !state.principals.contains_key(&principal_id) {
            return Err(AppError::NotFound(format!("principal '{principal_id}'")));
        }

        // Validate the whole batch before the first write.
        for role_id in role_ids {
            if !state.roles.contains_key(role_id) {
                return Err(AppError::NotFound(format!("role '{role_id}'")));
            }
        }

        for role_id in role_ids {
            state.assignments.insert((principal_id, *role_id));
        }
        Ok(())
    }

    async fn revoke_role(&self, principal_id: PrincipalId, role_id: RoleId) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.assignments.remove(&(principal_id, role_id));
        Ok(())
    }

    async fn roles_of(&self, principal_id: PrincipalId) -> AppResult<Vec<Role>> {
        let state = self.state.lock().await;
        let mut roles: Vec<Role> = state
            .assignments
            .iter()
            .filter(|(assigned_principal, _)| *assigned_principal == principal_id)
            .filter_map(|(_, role_id)| state.roles.get(role_id))
            .map(|record| state.materialize(record))
            .collect();
        roles.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(roles)
    }
}

#[async_trait]
impl RoleAssignmentReader for InMemoryAccessStore {
    async fn roles_of(&self, principal_id: PrincipalId) -> AppResult<Vec<Role>> {
        AccessRepository::roles_of(self, principal_id).await
    }
}

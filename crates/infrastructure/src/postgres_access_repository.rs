//! PostgreSQL-backed registries and assignment graph.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use keygate_application::{AccessRepository, RoleAssignmentReader};
use keygate_core::{AppError, AppResult};
use keygate_domain::{Permission, PermissionId, PrincipalId, Role, RoleId};

/// PostgreSQL-backed repository for permissions, roles, and assignments.
#[derive(Clone)]
pub struct PostgresAccessRepository {
    pool: PgPool,
}

impl PostgresAccessRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PermissionRow {
    id: uuid::Uuid,
    name: String,
    resource: String,
    action: String,
    description: Option<String>,
}

impl From<PermissionRow> for Permission {
    fn from(row: PermissionRow) -> Self {
        Self {
            id: PermissionId::from_uuid(row.id),
            name: row.name,
            resource: row.resource,
            action: row.action,
            description: row.description,
        }
    }
}

/// One row of the role/permission LEFT JOIN; permission columns are
/// NULL for roles without attachments.
#[derive(Debug, FromRow)]
struct RoleJoinRow {
    role_id: uuid::Uuid,
    role_name: String,
    role_description: Option<String>,
    is_default: bool,
    permission_id: Option<uuid::Uuid>,
    permission_name: Option<String>,
    resource: Option<String>,
    action: Option<String>,
    permission_description: Option<String>,
}

const ROLE_JOIN_SELECT: &str = r#"
    SELECT
        roles.id AS role_id,
        roles.name AS role_name,
        roles.description AS role_description,
        roles.is_default,
        permissions.id AS permission_id,
        permissions.name AS permission_name,
        permissions.resource,
        permissions.action,
        permissions.description AS permission_description
    FROM roles
    LEFT JOIN role_permissions ON role_permissions.role_id = roles.id
    LEFT JOIN permissions ON permissions.id = role_permissions.permission_id
"#;

fn aggregate_roles(rows: Vec<RoleJoinRow>) -> Vec<Role> {
    let mut order: Vec<RoleId> = Vec::new();
    let mut roles: HashMap<RoleId, Role> = HashMap::new();

    for row in rows {
        let role_id = RoleId::from_uuid(row.role_id);
        let role = roles.entry(role_id).or_insert_with(|| {
            order.push(role_id);
            Role {
                id: role_id,
                name: row.role_name.clone(),
                description: row.role_description.clone(),
                is_default: row.is_default,
                permissions: Vec::new(),
            }
        });

        if let (Some(id), Some(name), Some(resource), Some(action)) = (
            row.permission_id,
            row.permission_name,
            row.resource,
            row.action,
        ) {
            role.permissions.push(Permission {
                id: PermissionId::from_uuid(id),
                name,
                resource,
                action,
                description: row.permission_description,
            });
        }
    }

    order
        .into_iter()
        .filter_map(|role_id| roles.remove(&role_id))
        .collect()
}

#[async_trait]
impl AccessRepository for PostgresAccessRepository {
    async fn create_permission(
        &self,
        name: &str,
        resource: &str,
        action: &str,
        description: Option<&str>,
    ) -> AppResult<Permission> {
        let row = sqlx::query_as::<_, PermissionRow>(
            r#"
            INSERT INTO permissions (id, name, resource, action, description)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, resource, action, description
            "#,
        )
        .bind(PermissionId::new().as_uuid())
        .bind(name)
        .bind(resource)
        .bind(action)
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| map_name_conflict(error, name, "create permission"))?;

        Ok(Permission::from(row))
    }

    async fn find_permission_by_name(&self, name: &str) -> AppResult<Option<Permission>> {
        let row = sqlx::query_as::<_, PermissionRow>(
            "SELECT id, name, resource, action, description FROM permissions WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load permission: {error}")))?;

        Ok(row.map(Permission::from))
    }

    async fn list_permissions(&self) -> AppResult<Vec<Permission>> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            "SELECT id, name, resource, action, description FROM permissions ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list permissions: {error}")))?;

        Ok(rows.into_iter().map(Permission::from).collect())
    }

    async fn delete_permission(&self, permission_id: PermissionId) -> AppResult<()> {
        // role_permissions restricts deletion, so a referenced permission
        // surfaces as a foreign key violation here.
        let result = sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(permission_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|error| {
                if error
                    .as_database_error()
                    .is_some_and(|database_error| database_error.is_foreign_key_violation())
                {
                    return AppError::Conflict(format!(
                        "permission '{permission_id}' is still attached to a role"
                    ));
                }

                AppError::Internal(format!("failed to delete permission: {error}"))
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("permission '{permission_id}'")));
        }

        Ok(())
    }

    async fn create_role(
        &self,
        name: &str,
        description: Option<&str>,
        is_default: bool,
    ) -> AppResult<Role> {
        let role_id = RoleId::new();

        sqlx::query(
            r#"
            INSERT INTO roles (id, name, description, is_default)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(role_id.as_uuid())
        .bind(name)
        .bind(description)
        .bind(is_default)
        .execute(&self.pool)
        .await
        .map_err(|error| map_name_conflict(error, name, "create role"))?;

        Ok(Role {
            id: role_id,
            name: name.to_owned(),
            description: description.map(ToOwned::to_owned),
            is_default,
            permissions: Vec::new(),
        })
    }

    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        let rows = sqlx::query_as::<_, RoleJoinRow>(&format!(
            "{ROLE_JOIN_SELECT} WHERE roles.name = $1 ORDER BY permissions.name"
        ))
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load role: {error}")))?;

        Ok(aggregate_roles(rows).into_iter().next())
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleJoinRow>(&format!(
            "{ROLE_JOIN_SELECT} ORDER BY roles.name, permissions.name"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list roles: {error}")))?;

        Ok(aggregate_roles(rows))
    }

    async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
        // Attachments and assignments cascade; principals and
        // permissions survive.
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(role_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to delete role: {error}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("role '{role_id}'")));
        }

        Ok(())
    }

    async fn attach_permissions(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        let role_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM roles WHERE id = $1)",
        )
        .bind(role_id.as_uuid())
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to check role: {error}")))?;

        if !role_exists {
            return Err(AppError::NotFound(format!("role '{role_id}'")));
        }

        for permission_id in permission_ids {
            sqlx::query(
                r#"
                INSERT INTO role_permissions (role_id, permission_id)
                VALUES ($1, $2)
                ON CONFLICT (role_id, permission_id) DO NOTHING
                "#,
            )
            .bind(role_id.as_uuid())
            .bind(permission_id.as_uuid())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                if error
                    .as_database_error()
                    .is_some_and(|database_error| database_error.is_foreign_key_violation())
                {
                    return AppError::NotFound(format!("permission '{permission_id}'"));
                }

                AppError::Internal(format!("failed to attach permission: {error}"))
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })
    }

    async fn detach_permissions(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> AppResult<()> {
        let ids: Vec<uuid::Uuid> = permission_ids
            .iter()
            .map(PermissionId::as_uuid)
            .collect();

        sqlx::query(
            "DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = ANY($2)",
        )
        .bind(role_id.as_uuid())
        .bind(&ids)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to detach permissions: {error}")))?;

        Ok(())
    }

    async fn assign_roles(&self, principal_id: PrincipalId, role_ids: &[RoleId]) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        // Checked up front so an empty batch against a nonexistent
        // principal fails the same way a non-empty one would.
        let principal_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM principals WHERE id = $1)",
        )
        .bind(principal_id.as_uuid())
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to check principal: {error}")))?;

        if !principal_exists {
            return Err(AppError::NotFound(format!("principal '{principal_id}'")));
        }

        let requested: Vec<uuid::Uuid> = role_ids.iter().map(RoleId::as_uuid).collect();

        let known = sqlx::query_scalar::<_, uuid::Uuid>(
            "SELECT id FROM roles WHERE id = ANY($1)",
        )
        .bind(&requested)
        .fetch_all(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to check roles: {error}")))?;

        // Whole batch or nothing: one unknown role rejects the call
        // before any row is written.
        if let Some(missing) = requested.iter().find(|id| !known.contains(id)) {
            return Err(AppError::NotFound(format!("role '{missing}'")));
        }

        for role_id in &requested {
            sqlx::query(
                r#"
                INSERT INTO principal_roles (principal_id, role_id)
                VALUES ($1, $2)
                ON CONFLICT (principal_id, role_id) DO NOTHING
                "#,
            )
            .bind(principal_id.as_uuid())
            .bind(role_id)
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                if error
                    .as_database_error()
                    .is_some_and(|database_error| database_error.is_foreign_key_violation())
                {
                    return AppError::NotFound(format!("principal '{principal_id}'"));
                }

                AppError::Internal(format!("failed to assign role: {error}"))
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })
    }

    async fn revoke_role(&self, principal_id: PrincipalId, role_id: RoleId) -> AppResult<()> {
        sqlx::query("DELETE FROM principal_roles WHERE principal_id = $1 AND role_id = $2")
            .bind(principal_id.as_uuid())
            .bind(role_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to revoke role: {error}")))?;

        Ok(())
    }

    async fn roles_of(&self, principal_id: PrincipalId) -> AppResult<Vec<Role>> {
        load_roles_of(&self.pool, principal_id).await
    }
}

#[async_trait]
impl RoleAssignmentReader for PostgresAccessRepository {
    async fn roles_of(&self, principal_id: PrincipalId) -> AppResult<Vec<Role>> {
        load_roles_of(&self.pool, principal_id).await
    }
}

async fn load_roles_of(pool: &PgPool, principal_id: PrincipalId) -> AppResult<Vec<Role>> {
    let rows = sqlx::query_as::<_, RoleJoinRow>(&format!(
        r#"
        {ROLE_JOIN_SELECT}
        INNER JOIN principal_roles ON principal_roles.role_id = roles.id
        WHERE principal_roles.principal_id = $1
        ORDER BY roles.name, permissions.name
        "#
    ))
    .bind(principal_id.as_uuid())
    .fetch_all(pool)
    .await
    .map_err(|error| AppError::Internal(format!("failed to load assigned roles: {error}")))?;

    Ok(aggregate_roles(rows))
}

fn map_name_conflict(error: sqlx::Error, name: &str, operation: &str) -> AppError {
    if error
        .as_database_error()
        .is_some_and(|database_error| database_error.is_unique_violation())
    {
        return AppError::DuplicateName(name.to_owned());
    }

    AppError::Internal(format!("failed to {operation}: {error}"))
}

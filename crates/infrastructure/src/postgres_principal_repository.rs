//! PostgreSQL-backed credential store persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use keygate_application::{PrincipalRecord, PrincipalRepository};
use keygate_core::{AppError, AppResult};
use keygate_domain::PrincipalId;

/// PostgreSQL-backed repository for principal records.
#[derive(Clone)]
pub struct PostgresPrincipalRepository {
    pool: PgPool,
}

impl PostgresPrincipalRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PrincipalRow {
    id: uuid::Uuid,
    email: String,
    password_hash: String,
    is_active: bool,
    admin_override: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PrincipalRow> for PrincipalRecord {
    fn from(row: PrincipalRow) -> Self {
        Self {
            id: PrincipalId::from_uuid(row.id),
            email: row.email,
            password_hash: row.password_hash,
            is_active: row.is_active,
            admin_override: row.admin_override,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl PrincipalRepository for PostgresPrincipalRepository {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<PrincipalRecord>> {
        let row = sqlx::query_as::<_, PrincipalRow>(
            r#"
            SELECT id, email, password_hash, is_active, admin_override, created_at, updated_at
            FROM principals
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load principal: {error}")))?;

        Ok(row.map(PrincipalRecord::from))
    }

    async fn find_by_id(&self, principal_id: PrincipalId) -> AppResult<Option<PrincipalRecord>> {
        let row = sqlx::query_as::<_, PrincipalRow>(
            r#"
            SELECT id, email, password_hash, is_active, admin_override, created_at, updated_at
            FROM principals
            WHERE id = $1
            "#,
        )
        .bind(principal_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load principal: {error}")))?;

        Ok(row.map(PrincipalRecord::from))
    }

    async fn list(&self) -> AppResult<Vec<PrincipalRecord>> {
        let rows = sqlx::query_as::<_, PrincipalRow>(
            r#"
            SELECT id, email, password_hash, is_active, admin_override, created_at, updated_at
            FROM principals
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list principals: {error}")))?;

        Ok(rows.into_iter().map(PrincipalRecord::from).collect())
    }

    async fn create(&self, email: &str, password_hash: &str) -> AppResult<PrincipalRecord> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        let row = sqlx::query_as::<_, PrincipalRow>(
            r#"
            INSERT INTO principals (id, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, is_active, admin_override, created_at, updated_at
            "#,
        )
        .bind(PrincipalId::new().as_uuid())
        .bind(email)
        .bind(password_hash)
        .fetch_one(&mut *transaction)
        .await
        .map_err(map_email_conflict)?;

        // Default roles land in the same transaction: a principal is
        // never observable without them.
        sqlx::query(
            r#"
            INSERT INTO principal_roles (principal_id, role_id)
            SELECT $1, id FROM roles WHERE is_default
            "#,
        )
        .bind(row.id)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to assign default roles: {error}"))
        })?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(PrincipalRecord::from(row))
    }

    async fn update_password(
        &self,
        principal_id: PrincipalId,
        password_hash: &str,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE principals SET password_hash = $2, updated_at = now() WHERE id = $1",
        )
        .bind(principal_id.as_uuid())
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update password: {error}")))?;

        ensure_principal_touched(result.rows_affected(), principal_id)
    }

    async fn set_admin_override(&self, principal_id: PrincipalId, enabled: bool) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE principals SET admin_override = $2, updated_at = now() WHERE id = $1",
        )
        .bind(principal_id.as_uuid())
        .bind(enabled)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to update admin override: {error}"))
        })?;

        ensure_principal_touched(result.rows_affected(), principal_id)
    }

    async fn set_active(&self, principal_id: PrincipalId, active: bool) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE principals SET is_active = $2, updated_at = now() WHERE id = $1",
        )
        .bind(principal_id.as_uuid())
        .bind(active)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update active flag: {error}")))?;

        ensure_principal_touched(result.rows_affected(), principal_id)
    }
}

fn ensure_principal_touched(rows_affected: u64, principal_id: PrincipalId) -> AppResult<()> {
    if rows_affected == 0 {
        return Err(AppError::NotFound(format!("principal '{principal_id}'")));
    }

    Ok(())
}

fn map_email_conflict(error: sqlx::Error) -> AppError {
    if error
        .as_database_error()
        .is_some_and(|database_error| database_error.is_unique_violation())
    {
        return AppError::DuplicateEmail;
    }

    AppError::Internal(format!("failed to create principal: {error}"))
}

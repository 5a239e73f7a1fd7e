//! Idempotent baseline setup for the registries.

use keygate_core::{AppError, AppResult};

use crate::AccessRepository;

/// Baseline permissions as (name, resource, action, description).
pub const BASELINE_PERMISSIONS: &[(&str, &str, &str, &str)] = &[
    ("user:read", "user", "read", "Read user records"),
    ("user:write", "user", "write", "Create and update user records"),
    ("admin:all", "admin", "all", "Unrestricted access to every resource"),
];

/// Baseline roles as (name, description, is-default, permission names).
pub const BASELINE_ROLES: &[(&str, &str, bool, &[&str])] = &[
    ("user", "Standard account", true, &["user:read"]),
    ("moderator", "Elevated account", false, &["user:read", "user:write"]),
    ("admin", "Administrator account", false, &["admin:all"]),
];

/// Ensures the minimal permission and role sets exist and are wired.
///
/// Safe to run on every startup: existing rows are left untouched and
/// permission attachment is an idempotent set operation. Only the
/// `admin:all` wiring onto `admin` is load-bearing for the decision
/// rules; the rest mirrors the registration defaults.
pub async fn ensure_baseline_access(repository: &dyn AccessRepository) -> AppResult<()> {
    for (name, resource, action, description) in BASELINE_PERMISSIONS {
        if repository.find_permission_by_name(name).await?.is_none() {
            match repository
                .create_permission(name, resource, action, Some(description))
                .await
            {
                Ok(_) | Err(AppError::DuplicateName(_)) => {}
                Err(error) => return Err(error),
            }
        }
    }

    for (name, description, is_default, permission_names) in BASELINE_ROLES {
        let role = match repository.find_role_by_name(name).await? {
            Some(role) => role,
            None => match repository
                .create_role(name, Some(description), *is_default)
                .await
            {
                Ok(role) => role,
                // Lost a startup race; the winner's row is authoritative.
                Err(AppError::DuplicateName(_)) => repository
                    .find_role_by_name(name)
                    .await?
                    .ok_or_else(|| {
                        AppError::Internal(format!("baseline role '{name}' vanished"))
                    })?,
                Err(error) => return Err(error),
            },
        };

        let mut permission_ids = Vec::with_capacity(permission_names.len());
        for permission_name in *permission_names {
            let permission = repository
                .find_permission_by_name(permission_name)
                .await?
                .ok_or_else(|| {
                    AppError::Internal(format!(
                        "baseline permission '{permission_name}' missing after setup"
                    ))
                })?;
            permission_ids.push(permission.id);
        }

        repository
            .attach_permissions(role.id, &permission_ids)
            .await?;
    }

    Ok(())
}

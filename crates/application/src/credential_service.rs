//! Credential store ports and application service.
//!
//! Owns the principal lifecycle: registration, secret verification,
//! password changes, and the administrative flags. Follows OWASP
//! guidelines for generic error messages and constant-time responses.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use keygate_core::{AppError, AppResult};
use keygate_domain::{EmailAddress, Principal, PrincipalId, validate_password};

/// Principal record returned by repository queries.
///
/// This is the only type that carries the secret hash; it never crosses
/// the service boundary.
#[derive(Debug, Clone)]
pub struct PrincipalRecord {
    /// Unique principal identifier.
    pub id: PrincipalId,
    /// Canonical email address.
    pub email: String,
    /// Argon2id hash of the secret.
    pub password_hash: String,
    /// Whether the principal may authenticate.
    pub is_active: bool,
    /// Principal-level flag that bypasses role-based checks.
    pub admin_override: bool,
    /// Record creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl PrincipalRecord {
    /// Projects the record into the hash-free domain entity.
    #[must_use]
    pub fn to_principal(&self) -> Principal {
        Principal {
            id: self.id,
            email: self.email.clone(),
            is_active: self.is_active,
            admin_override: self.admin_override,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Repository port for principal persistence.
#[async_trait]
pub trait PrincipalRepository: Send + Sync {
    /// Finds a principal by canonical email.
    async fn find_by_email(&self, email: &str) -> AppResult<Option<PrincipalRecord>>;

    /// Finds a principal by identifier.
    async fn find_by_id(&self, principal_id: PrincipalId) -> AppResult<Option<PrincipalRecord>>;

    /// Lists all principals, ordered by creation time.
    async fn list(&self) -> AppResult<Vec<PrincipalRecord>>;

    /// Creates a principal and assigns every role currently flagged
    /// default, in one transaction. A failed default-role assignment
    /// must roll back the principal row as well.
    ///
    /// Fails with [`AppError::DuplicateEmail`] when the email is taken.
    async fn create(&self, email: &str, password_hash: &str) -> AppResult<PrincipalRecord>;

    /// Replaces the secret hash.
    async fn update_password(&self, principal_id: PrincipalId, password_hash: &str)
    -> AppResult<()>;

    /// Sets the admin-override flag. Idempotent.
    async fn set_admin_override(&self, principal_id: PrincipalId, enabled: bool) -> AppResult<()>;

    /// Sets the active flag. Idempotent. Principals are never deleted
    /// while referenced; deactivation is the only removal path.
    async fn set_active(&self, principal_id: PrincipalId, active: bool) -> AppResult<()>;
}

/// Port for one-way secret hashing.
pub trait PasswordHasher: Send + Sync {
    /// Produces a salted one-way hash of the secret.
    fn hash_password(&self, password: &str) -> AppResult<String>;

    /// Verifies a secret against a stored hash in constant time.
    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool>;
}

/// Application service for the credential store.
#[derive(Clone)]
pub struct CredentialService {
    principal_repository: Arc<dyn PrincipalRepository>,
    password_hasher: Arc<dyn PasswordHasher>,
}

impl CredentialService {
    /// Creates a new service from repository and hasher implementations.
    #[must_use]
    pub fn new(
        principal_repository: Arc<dyn PrincipalRepository>,
        password_hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            principal_repository,
            password_hasher,
        }
    }

    /// Registers a new principal with email and secret.
    ///
    /// The secret is hashed before anything is persisted; the returned
    /// principal carries no secret material. Default-flagged roles are
    /// assigned as part of the same transaction that creates the row.
    pub async fn register(&self, email: &str, password: &str) -> AppResult<Principal> {
        let email_address = EmailAddress::new(email)?;
        validate_password(password)?;

        let password_hash = self.password_hasher.hash_password(password)?;
        let record = self
            .principal_repository
            .create(email_address.as_str(), &password_hash)
            .await?;

        Ok(record.to_principal())
    }

    /// Verifies an email/secret pair.
    ///
    /// Fails with a uniform [`AppError::InvalidCredentials`] for unknown
    /// email, inactive principal, and hash mismatch alike. The miss paths
    /// still run the hash function so response timing does not reveal
    /// whether the email exists.
    pub async fn verify(&self, email: &str, password: &str) -> AppResult<Principal> {
        let record = self.principal_repository.find_by_email(email).await?;

        let Some(record) = record else {
            let _ = self.password_hasher.hash_password(password);
            return Err(AppError::InvalidCredentials);
        };

        if !record.is_active {
            let _ = self.password_hasher.hash_password(password);
            return Err(AppError::InvalidCredentials);
        }

        let password_valid = self
            .password_hasher
            .verify_password(password, &record.password_hash)?;

        if !password_valid {
            return Err(AppError::InvalidCredentials);
        }

        Ok(record.to_principal())
    }

    /// Loads a principal by identifier.
    pub async fn principal_by_id(&self, principal_id: PrincipalId) -> AppResult<Principal> {
        let record = self
            .principal_repository
            .find_by_id(principal_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("principal '{principal_id}'")))?;

        Ok(record.to_principal())
    }

    /// Lists all principals without secret material.
    pub async fn list_principals(&self) -> AppResult<Vec<Principal>> {
        let records = self.principal_repository.list().await?;
        Ok(records.iter().map(PrincipalRecord::to_principal).collect())
    }

    /// Replaces a principal's secret after verifying the current one.
    pub async fn change_password(
        &self,
        principal_id: PrincipalId,
        current_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let record = self
            .principal_repository
            .find_by_id(principal_id)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let current_valid = self
            .password_hasher
            .verify_password(current_password, &record.password_hash)?;

        if !current_valid {
            return Err(AppError::InvalidCredentials);
        }

        validate_password(new_password)?;
        let password_hash = self.password_hasher.hash_password(new_password)?;

        self.principal_repository
            .update_password(principal_id, &password_hash)
            .await
    }

    /// Sets the admin-override flag. Idempotent administrative operation.
    pub async fn set_admin_override(
        &self,
        principal_id: PrincipalId,
        enabled: bool,
    ) -> AppResult<()> {
        self.principal_repository
            .set_admin_override(principal_id, enabled)
            .await
    }

    /// Activates or soft-deactivates a principal. Idempotent.
    pub async fn set_active(&self, principal_id: PrincipalId, active: bool) -> AppResult<()> {
        self.principal_repository
            .set_active(principal_id, active)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;
    use keygate_core::{AppError, AppResult};
    use keygate_domain::PrincipalId;
    use tokio::sync::Mutex;

    use super::{CredentialService, PasswordHasher, PrincipalRecord, PrincipalRepository};

    /// Reversible stand-in for argon2; counts invocations so tests can
    /// assert the miss paths still hash.
    #[derive(Default)]
    struct FakeHasher {
        hash_calls: std::sync::atomic::AtomicUsize,
    }

    impl PasswordHasher for FakeHasher {
        fn hash_password(&self, password: &str) -> AppResult<String> {
            self.hash_calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(format!("hashed:{password}"))
        }

        fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
            Ok(hash == format!("hashed:{password}"))
        }
    }

    #[derive(Default)]
    struct FakePrincipalRepository {
        records: Mutex<HashMap<PrincipalId, PrincipalRecord>>,
    }

    #[async_trait]
    impl PrincipalRepository for FakePrincipalRepository {
        async fn find_by_email(&self, email: &str) -> AppResult<Option<PrincipalRecord>> {
            Ok(self
                .records
                .lock()
                .await
                .values()
                .find(|record| record.email == email)
                .cloned())
        }

        async fn find_by_id(
            &self,
            principal_id: PrincipalId,
        ) -> AppResult<Option<PrincipalRecord>> {
            Ok(self.records.lock().await.get(&principal_id).cloned())
        }

        async fn list(&self) -> AppResult<Vec<PrincipalRecord>> {
            let mut records: Vec<PrincipalRecord> =
                self.records.lock().await.values().cloned().collect();
            records.sort_by_key(|record| record.created_at);
            Ok(records)
        }

        async fn create(&self, email: &str, password_hash: &str) -> AppResult<PrincipalRecord> {
            let mut records = self.records.lock().await;
            if records.values().any(|record| record.email == email) {
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
            records.insert(record.id, record.clone());
            Ok(record)
        }

        async fn update_password(
            &self,
            principal_id: PrincipalId,
            password_hash: &str,
        ) -> AppResult<()> {
            let mut records = self.records.lock().await;
            let record = records
                .get_mut(&principal_id)
                .ok_or_else(|| AppError::NotFound(format!("principal '{principal_id}'")))?;
            record.password_hash = password_hash.to_owned();
            Ok(())
        }

        async fn set_admin_override(
            &self,
            principal_id: PrincipalId,
            enabled: bool,
        ) -> AppResult<()> {
            let mut records = self.records.lock().await;
            let record = records
                .get_mut(&principal_id)
                .ok_or_else(|| AppError::NotFound(format!("principal '{principal_id}'")))?;
            record.admin_override = enabled;
            Ok(())
        }

        async fn set_active(&self, principal_id: PrincipalId, active: bool) -> AppResult<()> {
            let mut records = self.records.lock().await;
            let record = records
                .get_mut(&principal_id)
                .ok_or_else(|| AppError::NotFound(format!("principal '{principal_id}'")))?;
            record.is_active = active;
            Ok(())
        }
    }

    fn service() -> (CredentialService, Arc<FakeHasher>) {
        let hasher = Arc::new(FakeHasher::default());
        let service = CredentialService::new(
            Arc::new(FakePrincipalRepository::default()),
            hasher.clone(),
        );
        (service, hasher)
    }

    #[tokio::test]
    async fn register_then_verify_succeeds() {
        let (service, _) = service();

        let registered = service
            .register("alice@example.com", "a-strong-passphrase")
            .await;
        assert!(registered.is_ok());

        let verified = service
            .verify("alice@example.com", "a-strong-passphrase")
            .await;
        assert!(verified.is_ok_and(|principal| {
            principal.email == "alice@example.com" && !principal.admin_override
        }));
    }

    #[tokio::test]
    async fn second_registration_with_same_email_is_rejected() {
        let (service, _) = service();

        let first = service
            .register("alice@example.com", "a-strong-passphrase")
            .await;
        assert!(first.is_ok());

        let second = service
            .register("alice@example.com", "another-passphrase")
            .await;
        assert!(matches!(second, Err(AppError::DuplicateEmail)));

        let principals = service.list_principals().await;
        assert!(principals.is_ok_and(|list| list.len() == 1));
    }

    #[tokio::test]
    async fn verify_unknown_email_fails_uniformly_and_still_hashes() {
        let (service, hasher) = service();

        let result = service.verify("ghost@example.com", "whatever-secret").await;
        assert!(matches!(result, Err(AppError::InvalidCredentials)));
        assert!(hasher.hash_calls.load(std::sync::atomic::Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn verify_wrong_password_fails_uniformly() {
        let (service, _) = service();

        let registered = service
            .register("alice@example.com", "a-strong-passphrase")
            .await;
        assert!(registered.is_ok());

        let result = service.verify("alice@example.com", "wrong-passphrase").await;
        assert!(matches!(result, Err(AppError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn inactive_principal_cannot_verify() {
        let (service, _) = service();

        let principal = match service
            .register("alice@example.com", "a-strong-passphrase")
            .await
        {
            Ok(principal) => principal,
            Err(error) => panic!("registration failed: {error}"),
        };

        let deactivated = service.set_active(principal.id, false).await;
        assert!(deactivated.is_ok());

        let result = service
            .verify("alice@example.com", "a-strong-passphrase")
            .await;
        assert!(matches!(result, Err(AppError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn set_admin_override_is_idempotent() {
        let (service, _) = service();

        let principal = match service
            .register("root@example.com", "a-strong-passphrase")
            .await
        {
            Ok(principal) => principal,
            Err(error) => panic!("registration failed: {error}"),
        };

        assert!(service.set_admin_override(principal.id, true).await.is_ok());
        assert!(service.set_admin_override(principal.id, true).await.is_ok());

        let reloaded = service.principal_by_id(principal.id).await;
        assert!(reloaded.is_ok_and(|principal| principal.admin_override));
    }

    #[tokio::test]
    async fn change_password_requires_current_secret() {
        let (service, _) = service();

        let principal = match service
            .register("alice@example.com", "a-strong-passphrase")
            .await
        {
            Ok(principal) => principal,
            Err(error) => panic!("registration failed: {error}"),
        };

        let rejected = service
            .change_password(principal.id, "wrong-passphrase", "the-next-passphrase")
            .await;
        assert!(matches!(rejected, Err(AppError::InvalidCredentials)));

        let changed = service
            .change_password(principal.id, "a-strong-passphrase", "the-next-passphrase")
            .await;
        assert!(changed.is_ok());

        let old_login = service
            .verify("alice@example.com", "a-strong-passphrase")
            .await;
        assert!(old_login.is_err());

        let new_login = service
            .verify("alice@example.com", "the-next-passphrase")
            .await;
        assert!(new_login.is_ok());
    }

    #[tokio::test]
    async fn weak_password_is_rejected_before_persistence() {
        let (service, _) = service();

        let result = service.register("alice@example.com", "short").await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let principals = service.list_principals().await;
        assert!(principals.is_ok_and(|list| list.is_empty()));
    }
}

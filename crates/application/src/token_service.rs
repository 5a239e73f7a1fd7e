//! Stateless signed-token issuance and verification.
//!
//! Tokens are HS256-signed JWTs carrying exactly the subject, issued-at,
//! and expiry claims. Verification is a pure computation over the token
//! and the signing key: no store access, so it scales horizontally and
//! never contends on a lock. Instant revocation is deliberately out of
//! scope; adding it would require a persisted deny-list consulted on
//! every verification.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use uuid::Uuid;

use keygate_core::{AppError, AppResult};
use keygate_domain::{AccessClaims, PrincipalId};

/// Default access-token lifetime in minutes.
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 30;

/// A freshly issued token together with its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedToken {
    /// Compact serialized token for the `Authorization: Bearer` header.
    pub token: String,
    /// Expiry instant, mirrored from the `exp` claim.
    pub expires_at: DateTime<Utc>,
}

/// Issues, verifies, and refreshes bearer tokens with a server-held
/// symmetric key.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

impl TokenService {
    /// Creates a token service from the signing secret and token lifetime
    /// in minutes.
    #[must_use]
    pub fn new(secret: &[u8], ttl_minutes: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Zero leeway: a token is invalid the second its expiry passes.
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            lifetime: Duration::minutes(ttl_minutes),
        }
    }

    /// Issues a signed token for the principal, valid from now until now
    /// plus the configured lifetime.
    pub fn issue(&self, principal_id: PrincipalId) -> AppResult<SignedToken> {
        self.issue_at(principal_id, Utc::now())
    }

    /// Verifies a token string and returns its subject.
    ///
    /// Fails with [`AppError::TokenExpired`] past the expiry and with
    /// [`AppError::TokenInvalid`] for a bad signature, malformed token,
    /// or non-UUID subject. Pure function of the token and the key.
    pub fn verify(&self, token: &str) -> AppResult<PrincipalId> {
        let data = decode::<AccessClaims>(token, &self.decoding_key, &self.validation).map_err(
            |error| match error.kind() {
                ErrorKind::ExpiredSignature => AppError::TokenExpired,
                _ => AppError::TokenInvalid,
            },
        )?;

        // The library's exp check is strict (now > exp); expiry here is
        // inclusive, so a token presented at exactly its expiry second
        // is already dead.
        if data.claims.exp <= Utc::now().timestamp() {
            return Err(AppError::TokenExpired);
        }

        let subject = Uuid::parse_str(&data.claims.sub).map_err(|_| AppError::TokenInvalid)?;
        Ok(PrincipalId::from_uuid(subject))
    }

    /// Re-issues a token for the same subject if the presented one still
    /// verifies. An already-expired token cannot be refreshed; there is
    /// no grace window.
    pub fn refresh(&self, token: &str) -> AppResult<SignedToken> {
        let principal_id = self.verify(token)?;
        self.issue(principal_id)
    }

    fn issue_at(
        &self,
        principal_id: PrincipalId,
        issued_at: DateTime<Utc>,
    ) -> AppResult<SignedToken> {
        let expires_at = issued_at + self.lifetime;
        let claims = AccessClaims {
            sub: principal_id.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|error| AppError::Internal(format!("failed to sign token: {error}")))?;

        Ok(SignedToken { token, expires_at })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use keygate_core::AppError;
    use keygate_domain::PrincipalId;

    use super::{DEFAULT_TOKEN_TTL_MINUTES, TokenService};

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn service() -> TokenService {
        TokenService::new(SECRET, DEFAULT_TOKEN_TTL_MINUTES)
    }

    #[test]
    fn issued_token_verifies_to_its_subject() {
        let service = service();
        let principal_id = PrincipalId::new();

        let verified = service
            .issue(principal_id)
            .and_then(|signed| service.verify(&signed.token));
        assert_eq!(verified.ok(), Some(principal_id));
    }

    #[test]
    fn expired_token_is_rejected_as_expired() {
        let service = service();
        let issued = service.issue_at(
            PrincipalId::new(),
            Utc::now() - Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES + 1),
        );

        let result = issued.and_then(|signed| service.verify(&signed.token));
        assert!(matches!(result, Err(AppError::TokenExpired)));
    }

    #[test]
    fn token_at_exact_expiry_second_is_rejected() {
        let service = service();
        // exp lands on the current second; inclusive expiry must reject.
        let issued = service.issue_at(
            PrincipalId::new(),
            Utc::now() - Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES),
        );

        let result = issued.and_then(|signed| service.verify(&signed.token));
        assert!(matches!(result, Err(AppError::TokenExpired)));
    }

    #[test]
    fn token_signed_with_other_key_is_invalid() {
        let service = service();
        let other = TokenService::new(b"another-secret-another-secret!!!", DEFAULT_TOKEN_TTL_MINUTES);

        let result = other
            .issue(PrincipalId::new())
            .and_then(|signed| service.verify(&signed.token));
        assert!(matches!(result, Err(AppError::TokenInvalid)));
    }

    #[test]
    fn malformed_token_is_invalid() {
        let service = service();
        assert!(matches!(
            service.verify("not-a-token"),
            Err(AppError::TokenInvalid)
        ));
    }

    #[test]
    fn tampered_token_is_invalid() {
        let service = service();
        let issued = service.issue(PrincipalId::new());

        let result = issued.and_then(|signed| {
            let mut tampered = signed.token;
            tampered.pop();
            tampered.push('x');
            service.verify(&tampered)
        });
        assert!(matches!(result, Err(AppError::TokenInvalid)));
    }

    #[test]
    fn refresh_keeps_the_subject() {
        let service = service();
        let principal_id = PrincipalId::new();

        let refreshed = service
            .issue(principal_id)
            .and_then(|signed| service.refresh(&signed.token))
            .and_then(|signed| service.verify(&signed.token));
        assert_eq!(refreshed.ok(), Some(principal_id));
    }

    #[test]
    fn expired_token_cannot_be_refreshed() {
        let service = service();
        let issued = service.issue_at(
            PrincipalId::new(),
            Utc::now() - Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES * 2),
        );

        let result = issued.and_then(|signed| service.refresh(&signed.token));
        assert!(matches!(result, Err(AppError::TokenExpired)));
    }

    #[test]
    fn expiry_tracks_configured_lifetime() {
        let service = TokenService::new(SECRET, 5);
        let before = Utc::now();

        let issued = service.issue(PrincipalId::new());
        assert!(issued.is_ok_and(|signed| {
            let lifetime = signed.expires_at - before;
            lifetime >= Duration::minutes(4) && lifetime <= Duration::minutes(6)
        }));
    }
}

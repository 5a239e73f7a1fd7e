//! Bearer token claims.

use serde::{Deserialize, Serialize};

/// Claims carried by a signed access token.
///
/// The wire format is a standard signed token with exactly three claims;
/// the signature covers all of them, so no field can be altered without
/// invalidating the token. Tokens are never persisted server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject: the principal identifier as a UUID string.
    pub sub: String,
    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

#[cfg(test)]
mod tests {
    use super::AccessClaims;

    #[test]
    fn claims_serialize_with_short_names() {
        let claims = AccessClaims {
            sub: "3fc2a3c0-0000-0000-0000-000000000000".to_owned(),
            iat: 1_700_000_000,
            exp: 1_700_001_800,
        };

        let encoded = serde_json::to_value(&claims);
        assert!(encoded.is_ok_and(|value| {
            value.get("sub").is_some() && value.get("iat").is_some() && value.get("exp").is_some()
        }));
    }
}

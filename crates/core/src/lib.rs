//! Shared primitives for all Rust crates in Keygate.

#![forbid(unsafe_code)]

use thiserror::Error;

/// Result type used across Keygate crates.
pub type AppResult<T> = Result<T, AppError>;

/// Common application error categories.
///
/// Credential and token failures deliberately carry no payload: callers
/// must not be able to distinguish an unknown email from a wrong secret,
/// or an expired token from a forged one, by inspecting the error.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// A principal with the given email address already exists.
    #[error("email address is already registered")]
    DuplicateEmail,

    /// A permission or role with the given name already exists.
    #[error("name '{0}' is already taken")]
    DuplicateName(String),

    /// Email/secret combination was rejected. Uniform for unknown email,
    /// inactive principal, and hash mismatch.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Token is past its expiry.
    #[error("token has expired")]
    TokenExpired,

    /// Token signature failed to verify or the token is malformed.
    #[error("token is invalid")]
    TokenInvalid,

    /// Request carries no usable identity.
    #[error("authentication required")]
    Unauthenticated,

    /// Caller is authenticated but blocked by authorization policy.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

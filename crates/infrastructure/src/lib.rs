//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod argon2_password_hasher;
mod in_memory_access_store;
mod postgres_access_repository;
mod postgres_principal_repository;

pub use argon2_password_hasher::Argon2PasswordHasher;
pub use in_memory_access_store::InMemoryAccessStore;
pub use postgres_access_repository::PostgresAccessRepository;
pub use postgres_principal_repository::PostgresPrincipalRepository;

//! HTTP request handlers.

pub mod access;
pub mod auth;
pub mod health;
pub mod users;

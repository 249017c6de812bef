//! Request middleware (authentication, security headers).

pub mod auth;
pub mod security;

//! # auth-adapters
//!
//! Implementations of `IdentityVerifier`. Authentication itself happens at
//! the identity provider; this crate only checks the tokens it issues.

pub mod jwt;

pub use jwt::{Claims, JwtVerifier};

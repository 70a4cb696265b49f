//! `labdesk-auth`: bearer-token verification boundary.
//!
//! This crate is decoupled from HTTP and storage: it turns a token string into
//! the [`UserId`](labdesk_core::UserId) it was issued to.

pub mod claims;
pub mod validator;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use validator::{Hs256JwtValidator, JwtValidator};

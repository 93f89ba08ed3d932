//! Authentication module
//!
//! Password hashing, signed-token issuance and validation, and the
//! registration and login flows built on them.

pub mod handlers;
mod password;
mod service;
mod token;

pub use password::CredentialHasher;
pub use service::{AuthService, RegisteredAccount, Session};
pub use token::{Claims, TokenCodec};

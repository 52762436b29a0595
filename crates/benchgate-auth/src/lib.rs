//! benchgate-auth: signed-request verification.
//!
//! Clients sign privileged requests with a per-user secret:
//!
//! ```text
//! Authorization: OSF <login>:base64(HMAC-SHA1(secret, canonical))
//! canonical = METHOD "\n\n" Content-Type "\n" myDate "\n" path
//! ```
//!
//! The secret is fetched from the credential service on every check.

pub mod error;
pub mod signature;
pub mod verifier;

pub use error::AuthError;
pub use signature::{AUTH_SCHEME, DATE_HEADER, PUBLIC_COMMANDS, canonical_string, is_public, sign};
pub use verifier::{HttpSecretLookup, SecretLookup, Verifier};

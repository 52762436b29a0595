//! Canonical string construction and HMAC-SHA1 signing.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::error::AuthError;

type HmacSha1 = Hmac<Sha1>;

/// Scheme word at the start of the `Authorization` header.
pub const AUTH_SCHEME: &str = "OSF";

/// Client-supplied timestamp header covered by the signature.
pub const DATE_HEADER: &str = "myDate";

/// Commands reachable without a signature (account bootstrap flows).
pub const PUBLIC_COMMANDS: &[&str] = &[
    "getToken",
    "validateUser",
    "resetPassword",
    "generatePasswordLnkRst",
    "createUser",
];

pub fn is_public(command: &str) -> bool {
    PUBLIC_COMMANDS.contains(&command)
}

/// The string a client signs. `path` excludes the query string.
pub fn canonical_string(method: &str, content_type: &str, date: &str, path: &str) -> String {
    format!("{method}\n\n{content_type}\n{date}\n{path}")
}

/// `base64(HMAC-SHA1(secret, canonical))`.
pub fn sign(secret: &str, canonical: &str) -> Result<String, AuthError> {
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidKey)?;
    mac.update(canonical.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Check `signature` against the canonical string in constant time.
pub(crate) fn verify(secret: &str, canonical: &str, signature: &str) -> Result<(), AuthError> {
    let expected = STANDARD
        .decode(signature)
        .map_err(|_| AuthError::BadSignature)?;
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidKey)?;
    mac.update(canonical.as_bytes());
    mac.verify_slice(&expected)
        .map_err(|_| AuthError::BadSignature)
}

/// Split `OSF <accessKey>:<signature>` into its two halves.
pub(crate) fn parse_authorization(value: &str) -> Result<(&str, &str), AuthError> {
    let mut words = value.split_whitespace();
    if words.next() != Some(AUTH_SCHEME) {
        return Err(AuthError::UnsupportedScheme);
    }
    let pair = words.next().ok_or(AuthError::MalformedKey)?;
    match pair.split_once(':') {
        Some((key, sig)) if !key.is_empty() && !sig.is_empty() => Ok((key, sig)),
        _ => Err(AuthError::MalformedKey),
    }
}

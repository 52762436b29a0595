use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingHeader,

    #[error("unsupported authorization scheme")]
    UnsupportedScheme,

    #[error("malformed access key pair")]
    MalformedKey,

    #[error("request carries no login")]
    MissingLogin,

    #[error("access key {access_key:?} does not match login {login:?}")]
    AccessKeyMismatch { access_key: String, login: String },

    #[error("secret lookup for {login:?} failed: {reason}")]
    Lookup { login: String, reason: String },

    #[error("invalid signing key")]
    InvalidKey,

    #[error("signature mismatch")]
    BadSignature,
}

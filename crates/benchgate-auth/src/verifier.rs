//! Request verification against secrets held by the credential service.

use std::future::Future;
use std::time::Duration;

use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, Method};
use serde::Deserialize;
use tracing::debug;

use crate::error::AuthError;
use crate::signature::{self, DATE_HEADER, canonical_string, is_public};

/// Upper bound on one secret fetch.
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of per-user signing secrets.
pub trait SecretLookup: Send + Sync {
    fn secret(&self, login: &str) -> impl Future<Output = Result<String, AuthError>> + Send;
}

/// Fetches secrets from `GET http://<credentials>/user/<login>/userGetInternalInfo`.
#[derive(Debug, Clone)]
pub struct HttpSecretLookup {
    client: reqwest::Client,
    credentials: String,
}

#[derive(Debug, Deserialize)]
struct InternalInfo {
    #[serde(rename = "TokenSecret", default)]
    token_secret: String,
}

impl HttpSecretLookup {
    pub fn new(credentials: impl Into<String>) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(LOOKUP_TIMEOUT).build()?;
        Ok(Self {
            client,
            credentials: credentials.into(),
        })
    }

    fn url(&self, login: &str) -> String {
        format!(
            "http://{}/user/{}/userGetInternalInfo",
            self.credentials, login
        )
    }
}

impl SecretLookup for HttpSecretLookup {
    async fn secret(&self, login: &str) -> Result<String, AuthError> {
        let lookup_err = |reason: String| AuthError::Lookup {
            login: login.to_string(),
            reason,
        };
        let info: InternalInfo = self
            .client
            .get(self.url(login))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| lookup_err(e.to_string()))?
            .json()
            .await
            .map_err(|e| lookup_err(e.to_string()))?;
        if info.token_secret.is_empty() {
            return Err(lookup_err("no secret on record".to_string()));
        }
        Ok(info.token_secret)
    }
}

/// Decides whether a request may run a command on behalf of a login.
#[derive(Debug, Clone)]
pub struct Verifier<S = HttpSecretLookup> {
    secrets: S,
}

impl<S: SecretLookup> Verifier<S> {
    pub fn new(secrets: S) -> Self {
        Self { secrets }
    }

    /// `Ok(())` when `command` is public or the request is correctly signed
    /// by `login`. `path` is the full request path without the query.
    pub async fn verify(
        &self,
        method: &Method,
        headers: &HeaderMap,
        path: &str,
        login: &str,
        command: &str,
    ) -> Result<(), AuthError> {
        if is_public(command) {
            return Ok(());
        }
        let authorization = header_str(headers, AUTHORIZATION.as_str())
            .filter(|value| !value.is_empty())
            .ok_or(AuthError::MissingHeader)?;
        let (access_key, sig) = signature::parse_authorization(authorization)?;
        if login.is_empty() {
            return Err(AuthError::MissingLogin);
        }
        if access_key != login {
            return Err(AuthError::AccessKeyMismatch {
                access_key: access_key.to_string(),
                login: login.to_string(),
            });
        }

        let secret = self.secrets.secret(login).await?;
        let canonical = canonical_string(
            method.as_str(),
            header_str(headers, CONTENT_TYPE.as_str()).unwrap_or_default(),
            header_str(headers, DATE_HEADER).unwrap_or_default(),
            path,
        );
        signature::verify(&secret, &canonical, sig)?;
        debug!(login, command, "signature verified");
        Ok(())
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

//! Plain-HTTP reverse proxy.
//!
//! Requests are rewritten to an absolute `http://<authority><path>` URI and
//! sent through a pooled hyper client. Bodies stream in both directions.
//! An upstream `101 Switching Protocols` turns the exchange into a raw byte
//! relay between the two upgraded connections.

use axum::body::Body;
use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::{Request, Response, StatusCode, Uri};
use http_body_util::BodyExt;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioIo};
use tracing::{debug, warn};

use crate::error::ProxyError;

const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

/// Headers that describe one hop and must not be forwarded.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Where a request is sent: `host:port` plus the rewritten path and query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub authority: String,
    pub path_and_query: String,
}

impl Target {
    pub fn new(authority: impl Into<String>, path_and_query: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            path_and_query: path_and_query.into(),
        }
    }

    fn uri(&self) -> Result<Uri, ProxyError> {
        Ok(Uri::builder()
            .scheme("http")
            .authority(self.authority.as_str())
            .path_and_query(self.path_and_query.as_str())
            .build()?)
    }
}

#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
}

impl Default for Forwarder {
    fn default() -> Self {
        Self::new()
    }
}

impl Forwarder {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client }
    }

    /// Send `req` to `target` and hand back the upstream response.
    pub async fn forward(
        &self,
        mut req: Request<Body>,
        target: &Target,
    ) -> Result<Response<Body>, ProxyError> {
        let upgrade = is_upgrade(req.headers());
        let client_upgrade = upgrade.then(|| hyper::upgrade::on(&mut req));

        let (mut parts, body) = req.into_parts();
        let original_host = parts.headers.get(header::HOST).cloned();
        strip_hop_by_hop(&mut parts.headers, upgrade);
        if let Some(host) = original_host {
            parts.headers.insert(X_FORWARDED_HOST, host);
        }
        parts.headers.insert(
            header::HOST,
            HeaderValue::from_str(&target.authority).map_err(http::Error::from)?,
        );
        parts.uri = target.uri()?;
        let outbound = Request::from_parts(parts, body);

        debug!(uri = %outbound.uri(), upgrade, "forwarding");
        let mut response = self.client.request(outbound).await?;

        if response.status() == StatusCode::SWITCHING_PROTOCOLS {
            if let Some(client_upgrade) = client_upgrade {
                let upstream_upgrade = hyper::upgrade::on(&mut response);
                tokio::spawn(async move {
                    let (client, upstream) = match tokio::join!(client_upgrade, upstream_upgrade) {
                        (Ok(client), Ok(upstream)) => (client, upstream),
                        (Err(e), _) | (_, Err(e)) => {
                            warn!(error = %e, "upgrade failed");
                            return;
                        }
                    };
                    let mut client = TokioIo::new(client);
                    let mut upstream = TokioIo::new(upstream);
                    match tokio::io::copy_bidirectional(&mut client, &mut upstream).await {
                        Ok((up, down)) => debug!(up, down, "upgraded relay closed"),
                        Err(e) => debug!(error = %e, "upgraded relay ended with error"),
                    }
                });
            }
            return Ok(response.map(Body::new));
        }

        strip_hop_by_hop(response.headers_mut(), false);
        Ok(response.map(Body::new))
    }

    /// `GET http://<authority><path>` and collect the whole body.
    pub async fn get(&self, authority: &str, path: &str) -> Result<Bytes, ProxyError> {
        let req = Request::builder()
            .uri(Target::new(authority, path).uri()?)
            .body(Body::empty())?;
        let response = self.client.request(req).await?;
        Ok(response.into_body().collect().await?.to_bytes())
    }
}

/// `Connection: upgrade` together with an `Upgrade` header.
fn is_upgrade(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));
    connection_upgrade && headers.contains_key(header::UPGRADE)
}

/// Drop hop-by-hop headers, keeping the upgrade handshake when relaying one.
fn strip_hop_by_hop(headers: &mut HeaderMap, keep_upgrade: bool) {
    for name in HOP_BY_HOP {
        if keep_upgrade && (name == header::CONNECTION || name == header::UPGRADE) {
            continue;
        }
        headers.remove(name);
    }
}

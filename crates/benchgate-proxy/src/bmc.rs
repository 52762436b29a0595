//! HTTPS relay to bench BMCs.
//!
//! BMCs ship self-signed certificates, so this client skips certificate
//! validation. Redirects are passed back to the browser untouched.

use std::time::Duration;

use axum::body::Body;
use http::header::{self, HeaderMap};
use http::{Request, Response};
use tracing::debug;

use crate::error::ProxyError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const TCP_KEEPALIVE: Duration = Duration::from_secs(30);

/// Largest request body relayed to a BMC (firmware images go elsewhere).
pub const MAX_BMC_REQUEST_BODY: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct BmcForwarder {
    client: reqwest::Client,
}

impl BmcForwarder {
    pub fn new() -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .connect_timeout(CONNECT_TIMEOUT)
            .tcp_keepalive(TCP_KEEPALIVE)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }

    /// Replay `req` against `https://<endpoint>` with the same path and query.
    ///
    /// `endpoint` is the BMC's `host:port`, normally `<bmc_ip>:443`.
    pub async fn forward(
        &self,
        req: Request<Body>,
        endpoint: &str,
    ) -> Result<Response<Body>, ProxyError> {
        let (parts, body) = req.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = format!("https://{endpoint}{path_and_query}");

        let mut headers = parts.headers;
        headers.remove(header::HOST);
        strip_hop_by_hop(&mut headers);
        let body = axum::body::to_bytes(body, MAX_BMC_REQUEST_BODY).await?;

        debug!(%url, method = %parts.method, "relaying to bmc");
        let upstream = self
            .client
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in [
        header::CONNECTION,
        header::PROXY_AUTHENTICATE,
        header::PROXY_AUTHORIZATION,
        header::TE,
        header::TRAILER,
        header::TRANSFER_ENCODING,
        header::UPGRADE,
    ] {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use http::StatusCode;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio_rustls::TlsAcceptor;
    use tokio_rustls::rustls;
    use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};

    /// TLS endpoint with a self-signed certificate. Answers one request with
    /// a redirect and reports the request head it received.
    async fn self_signed_bmc() -> (String, oneshot::Receiver<String>) {
        let key_pair = rcgen::KeyPair::generate().unwrap();
        let cert = rcgen::CertificateParams::new(vec!["bmc.local".to_string()])
            .unwrap()
            .self_signed(&key_pair)
            .unwrap();
        let config = rustls::ServerConfig::builder_with_provider(
            rustls::crypto::ring::default_provider().into(),
        )
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(
            vec![CertificateDer::from(cert.der().to_vec())],
            PrivateKeyDer::try_from(key_pair.serialize_der()).unwrap(),
        )
        .unwrap();
        let acceptor = TlsAcceptor::from(Arc::new(config));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (seen_tx, seen_rx) = oneshot::channel();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut tls = acceptor.accept(tcp).await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = tls.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            let _ = seen_tx.send(String::from_utf8_lossy(&head).into_owned());
            tls.write_all(
                b"HTTP/1.1 302 Found\r\nlocation: /login.html\r\nx-bmc: ilo\r\n\
                  connection: close\r\ncontent-length: 0\r\n\r\n",
            )
            .await
            .unwrap();
            let _ = tls.shutdown().await;
        });
        (addr, seen_rx)
    }

    #[tokio::test]
    async fn relays_to_self_signed_bmc_and_returns_redirects_untouched() {
        let (endpoint, seen) = self_signed_bmc().await;
        let req = Request::builder()
            .uri("/redfish/v1/Systems?expand=1")
            .header(header::HOST, "gateway.test")
            .header(header::COOKIE, "osfci_cookie=abc")
            .body(Body::empty())
            .unwrap();

        let response = BmcForwarder::new()
            .unwrap()
            .forward(req, &endpoint)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/login.html");
        assert_eq!(response.headers()["x-bmc"], "ilo");
        assert!(!response.headers().contains_key(header::CONNECTION));

        let head = seen.await.unwrap();
        assert!(
            head.starts_with("GET /redfish/v1/Systems?expand=1 HTTP/1.1\r\n"),
            "{head}"
        );
        assert!(head.contains("osfci_cookie=abc"));
        assert!(!head.contains("gateway.test"));
    }

    #[test]
    fn strips_connection_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, "close".parse().unwrap());
        headers.insert("keep-alive", "timeout=5".parse().unwrap());
        headers.insert(header::COOKIE, "osfci_cookie=abc".parse().unwrap());
        strip_hop_by_hop(&mut headers);
        assert_eq!(headers.len(), 1);
    }
}

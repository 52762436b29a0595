//! Session identification.

use axum::http::HeaderMap;
use axum::http::header::COOKIE;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "osfci_cookie";

/// Value of the session cookie, if the request carries a non-empty one.
pub fn osfci_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(cookies: &[&'static str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for cookie in cookies {
            headers.append(COOKIE, HeaderValue::from_static(cookie));
        }
        headers
    }

    #[test]
    fn finds_cookie_among_others() {
        let h = headers(&["theme=dark; osfci_cookie=abc123; lang=en"]);
        assert_eq!(osfci_cookie(&h).as_deref(), Some("abc123"));
    }

    #[test]
    fn scans_every_cookie_header() {
        let h = headers(&["theme=dark", "osfci_cookie=xyz"]);
        assert_eq!(osfci_cookie(&h).as_deref(), Some("xyz"));
    }

    #[test]
    fn missing_or_empty_is_none() {
        assert_eq!(osfci_cookie(&HeaderMap::new()), None);
        assert_eq!(osfci_cookie(&headers(&["osfci_cookie="])), None);
        assert_eq!(osfci_cookie(&headers(&["other_osfci_cookie=1"])), None);
    }
}

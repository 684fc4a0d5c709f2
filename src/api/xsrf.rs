//! Double-submit cookie protection for state-changing requests.

use axum::{
    extract::Request,
    http::{header, HeaderMap, Method},
    middleware::Next,
    response::Response,
};

use super::error::ApiError;

pub const XSRF_COOKIE: &str = "_xsrf";
pub const XSRF_HEADER: &str = "x-xsrf-token";

/// Value of a cookie in the request headers
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Reject unsafe methods whose `X-Xsrf-Token` header does not echo the cookie
pub async fn require_token(req: Request, next: Next) -> Result<Response, ApiError> {
    if [Method::GET, Method::HEAD, Method::OPTIONS].contains(req.method()) {
        return Ok(next.run(req).await);
    }
    let headers = req.headers();
    let cookie = cookie_value(headers, XSRF_COOKIE);
    let token = headers.get(XSRF_HEADER).and_then(|v| v.to_str().ok());
    let valid = matches!((cookie, token), (Some(c), Some(t)) if !c.is_empty() && c == t);
    if !valid {
        return Err(ApiError::Forbidden("missing or mismatched XSRF token".into()));
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_cookie_value() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; _xsrf=abc123"));
        assert_eq!(cookie_value(&headers, XSRF_COOKIE), Some("abc123"));
        assert_eq!(cookie_value(&headers, "theme"), Some("dark"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn test_multiple_cookie_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::COOKIE, HeaderValue::from_static("_xsrf=t"));
        assert_eq!(cookie_value(&headers, XSRF_COOKIE), Some("t"));
    }
}

//! Shared HTTP response helpers.
//!
//! Status-code checks (429 with `Retry-After`, any other non-success status)
//! and `Link` header pagination live here so the client methods only deal
//! with building requests and mapping bodies.

use reqwest::header::{HeaderMap, LINK, RETRY_AFTER};

use crate::error::ApiError;

/// Fallback wait when a 429 carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Check an HTTP response for error statuses.
///
/// Returns the response unchanged on success. A 429 becomes
/// [`ApiError::RateLimited`], any other non-success status becomes
/// [`ApiError::Status`] carrying the response body.
pub async fn check_response(
    endpoint: &str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status.as_u16() == 429 {
        return Err(ApiError::RateLimited {
            endpoint: endpoint.to_string(),
            retry_after_secs: parse_retry_after(resp.headers()),
        });
    }
    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            endpoint: endpoint.to_string(),
            message: resp.text().await.unwrap_or_default(),
        });
    }
    Ok(resp)
}

/// `Retry-After` in seconds, falling back to 60 s.
pub fn parse_retry_after(headers: &HeaderMap) -> u64 {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

/// Target of the `rel="next"` entry of a `Link` header, if any.
pub fn next_link(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(parse_next_link)
}

/// Parse `<url>; rel="next", <url>; rel="last"` and return the next URL.
pub fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let target = target.strip_prefix('<')?.strip_suffix('>')?;
        let is_next = parts.any(|param| {
            let param = param.trim();
            param
                .strip_prefix("rel=")
                .map(|rel| rel.trim_matches('"').split_whitespace().any(|r| r == "next"))
                .unwrap_or(false)
        });
        is_next.then(|| target.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn next_link_among_several() {
        let header = r#"<https://canvas.test/api/v1/courses?page=1&per_page=100>; rel="current", <https://canvas.test/api/v1/courses?page=2&per_page=100>; rel="next", <https://canvas.test/api/v1/courses?page=1&per_page=100>; rel="first", <https://canvas.test/api/v1/courses?page=5&per_page=100>; rel="last""#;
        assert_eq!(
            parse_next_link(header).as_deref(),
            Some("https://canvas.test/api/v1/courses?page=2&per_page=100")
        );
    }

    #[test]
    fn last_page_has_no_next() {
        let header = r#"<https://canvas.test/api/v1/courses?page=5>; rel="current", <https://canvas.test/api/v1/courses?page=1>; rel="first""#;
        assert_eq!(parse_next_link(header), None);
        assert_eq!(parse_next_link(""), None);
    }

    #[test]
    fn unquoted_rel_is_accepted() {
        assert_eq!(
            parse_next_link("<https://canvas.test/x?page=3>; rel=next").as_deref(),
            Some("https://canvas.test/x?page=3")
        );
    }

    #[test]
    fn next_link_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(next_link(&headers), None);

        headers.insert(
            LINK,
            HeaderValue::from_static(r#"<https://canvas.test/a?page=2>; rel="next""#),
        );
        assert_eq!(
            next_link(&headers).as_deref(),
            Some("https://canvas.test/a?page=2")
        );
    }

    #[test]
    fn retry_after_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), 60);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("120"));
        assert_eq!(parse_retry_after(&headers), 120);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(parse_retry_after(&headers), 60);
    }
}

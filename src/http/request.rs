//! Request inspection.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for every request
//! - Extract the matching-relevant parts: host and Basic credentials
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - HTTP/2 requests carry the host in the URI authority, not a Host header

use axum::http::{header, HeaderMap, HeaderValue, Request, Uri};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::security::Credentials;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates a fresh UUID v4 request ID.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = HeaderValue::from_str(&Uuid::new_v4().to_string()).ok()?;
        Some(RequestId::new(id))
    }
}

/// The host the client asked for, including any port.
pub fn request_host(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|authority| authority.to_string()))
        .filter(|host| !host.is_empty())
}

/// The request ID assigned by the request-id layer.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown")
}

/// Basic credentials from the `Authorization` header, if well-formed.
pub fn basic_credentials(headers: &HeaderMap) -> Option<Credentials> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(Credentials::from_basic_header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn host_of(request: &Request<Body>) -> Option<String> {
        request_host(request.headers(), request.uri())
    }

    #[test]
    fn host_from_header_or_authority() {
        let request = Request::builder()
            .uri("/path")
            .header(header::HOST, "a.com:8080")
            .body(Body::empty())
            .unwrap();
        assert_eq!(host_of(&request).as_deref(), Some("a.com:8080"));

        let request = Request::builder()
            .uri("http://b.com/path")
            .body(Body::empty())
            .unwrap();
        assert_eq!(host_of(&request).as_deref(), Some("b.com"));

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert_eq!(host_of(&request), None);
    }

    #[test]
    fn generated_ids_are_uuids() {
        let request = Request::builder().body(Body::empty()).unwrap();
        let id = UuidRequestId.make_request_id(&request).unwrap();
        let text = id.header_value().to_str().unwrap();
        assert!(Uuid::parse_str(text).is_ok());
    }
}

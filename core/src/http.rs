//! HTTP requests and responses as plain data.
//!
//! # Design
//! The client builds `HttpRequest` values and parses `HttpResponse` values;
//! the actual round-trip happens behind the [`crate::transport::HttpTransport`]
//! seam. Keeping both sides as owned plain data means request routing and
//! response interpretation stay deterministic and testable without a network.

/// HTTP method for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

/// An HTTP request described as plain data.
///
/// Built by `EntityClient::build_*` methods. `url` is the complete request
/// URL, including the base URL, API root, and any percent-encoded query
/// parameter.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// An HTTP response described as plain data.
///
/// Produced by an [`crate::transport::HttpTransport`] implementation, then
/// handed to `EntityClient::parse_*` methods for status interpretation and
/// decoding.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

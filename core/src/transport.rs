//! HTTP transport seam, retry wrapper, and the default ureq transport.
//!
//! # Design
//! [`HttpTransport`] executes exactly one request and reports failures on a
//! separate channel from error-status responses: a response that was
//! obtained, whatever its status code, comes back as `Ok` data for the
//! client's `parse_*` layer, while [`TransportError`] is reserved for the
//! transport's own failures. Retries key off that error channel only —
//! status codes never trigger a retry.
//!
//! [`send_with_retry`] is a pure function of (transport, request, retry
//! budget); the attempt counter is a loop-local, so a shared client stays
//! free of mutable request-scoped state.

use std::fmt;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::config::TlsOptions;
use crate::error::ClientError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Failures reported by an [`HttpTransport`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request never produced a response (connection failure, DNS,
    /// protocol error, interrupted body read).
    #[error("{0}")]
    Network(String),

    /// The transport surfaced an error-status response through its error
    /// channel. Carried for diagnostics; the default transport returns all
    /// obtained responses as data instead.
    #[error("error response with status {}", .response.status)]
    ErrorResponse { response: HttpResponse },
}

/// Executes one blocking HTTP round-trip.
///
/// Implementations must be safe for concurrent use; the client shares one
/// transport across all calls.
pub trait HttpTransport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Send `request`, retrying the identical request after each transport
/// error until the budget is spent: `retry_count` retries mean at most
/// `retry_count + 1` attempts, with a fixed `retry_wait` sleep between
/// them. A budget of 0 propagates the first failure immediately.
pub(crate) fn send_with_retry(
    transport: &dyn HttpTransport,
    request: &HttpRequest,
    retry_count: u32,
    retry_wait: Duration,
) -> Result<HttpResponse, TransportError> {
    let mut attempt: u32 = 0;
    loop {
        match transport.send(request) {
            Ok(response) => return Ok(response),
            Err(err) => {
                attempt += 1;
                if attempt > retry_count {
                    return Err(err);
                }
                warn!(
                    error = %err,
                    attempt,
                    retry_count,
                    wait_secs = retry_wait.as_secs_f64(),
                    "transport error, waiting before trying again"
                );
                thread::sleep(retry_wait);
            }
        }
    }
}

/// Default blocking transport backed by a [`ureq::Agent`].
///
/// The agent is built once at construction: status-as-error is disabled so
/// 4xx/5xx responses flow back as data, and any TLS material from
/// [`TlsOptions`] is applied. No client-side request deadline is set; the
/// server-side query timeout travels in a header.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(tls: &TlsOptions) -> Result<Self, ClientError> {
        let mut tls_config = ureq::tls::TlsConfig::builder();

        if tls.insecure {
            tls_config = tls_config.disable_verification(true);
        }

        if let Some(ca_pem) = &tls.ca_bundle_pem {
            let ca = ureq::tls::Certificate::from_pem(ca_pem)
                .map_err(|e| ClientError::InvalidConfig(e.to_string()))?
                .to_owned();
            tls_config = tls_config.root_certs(ureq::tls::RootCerts::new_with_certs(&[ca]));
        }

        match (&tls.client_cert_pem, &tls.client_key_pem) {
            (Some(cert_pem), Some(key_pem)) => {
                let cert = ureq::tls::Certificate::from_pem(cert_pem)
                    .map_err(|e| ClientError::InvalidConfig(e.to_string()))?
                    .to_owned();
                let key = ureq::tls::PrivateKey::from_pem(key_pem)
                    .map_err(|e| ClientError::InvalidConfig(e.to_string()))?
                    .to_owned();
                let client_cert = ureq::tls::ClientCert::new_with_certs(&[cert], key);
                tls_config = tls_config.client_cert(Some(client_cert));
            }
            (None, None) => {}
            _ => {
                return Err(ClientError::InvalidConfig(
                    "client certificate and key must be provided together".to_string(),
                ))
            }
        }

        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .tls_config(tls_config.build())
            .build();

        Ok(Self {
            agent: config.new_agent(),
        })
    }
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

impl HttpTransport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let result = match (&request.method, &request.body) {
            (HttpMethod::Get, _) => {
                let mut rb = self.agent.get(&request.url);
                for (name, value) in &request.headers {
                    rb = rb.header(name.as_str(), value.as_str());
                }
                rb.call()
            }
            (HttpMethod::Delete, _) => {
                let mut rb = self.agent.delete(&request.url);
                for (name, value) in &request.headers {
                    rb = rb.header(name.as_str(), value.as_str());
                }
                rb.call()
            }
            (HttpMethod::Post, body) => {
                let mut rb = self.agent.post(&request.url);
                for (name, value) in &request.headers {
                    rb = rb.header(name.as_str(), value.as_str());
                }
                match body {
                    Some(body) => rb.send(body.as_bytes()),
                    None => rb.send_empty(),
                }
            }
            (HttpMethod::Put, body) => {
                let mut rb = self.agent.put(&request.url);
                for (name, value) in &request.headers {
                    rb = rb.header(name.as_str(), value.as_str());
                }
                match body {
                    Some(body) => rb.send(body.as_bytes()),
                    None => rb.send_empty(),
                }
            }
        };

        let mut response = match result {
            Ok(response) => response,
            Err(ureq::Error::StatusCode(code)) => {
                return Err(TransportError::ErrorResponse {
                    response: HttpResponse {
                        status: code,
                        headers: Vec::new(),
                        body: String::new(),
                    },
                })
            }
            Err(err) => return Err(TransportError::Network(err.to_string())),
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

//! Client configuration.
//!
//! # Design
//! All knobs are fixed at construction and read-only afterwards, which is
//! what makes a client instance safe to share across threads. Retry policy
//! and TLS material are independent axes of the same config rather than two
//! parallel client types.

use std::time::Duration;

/// Construction-time configuration for [`crate::EntityClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// The entity type this client is scoped to (e.g. "node"). Fixed for
    /// the lifetime of the client.
    pub entity_type: String,
    /// Base URL of the entitystore server, without the API root.
    pub base_url: String,
    /// Server-side query timeout, sent on every request as a header. The
    /// client itself enforces no deadline.
    pub query_timeout: Duration,
    /// Number of retries after a failed transport attempt. 0 means the
    /// first failure propagates immediately.
    pub retry_count: u32,
    /// Fixed delay between attempts.
    pub retry_wait: Duration,
    /// TLS material for the default transport.
    pub tls: TlsOptions,
}

impl ClientConfig {
    /// Create a config with the defaults: 5s query timeout, no retries,
    /// 1s retry wait, no TLS material.
    pub fn new(entity_type: impl Into<String>, base_url: &str) -> Self {
        Self {
            entity_type: entity_type.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            query_timeout: Duration::from_secs(5),
            retry_count: 0,
            retry_wait: Duration::from_secs(1),
            tls: TlsOptions::default(),
        }
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn retries(mut self, count: u32, wait: Duration) -> Self {
        self.retry_count = count;
        self.retry_wait = wait;
        self
    }

    pub fn tls(mut self, tls: TlsOptions) -> Self {
        self.tls = tls;
        self
    }
}

/// TLS material for the default transport, all optional. A client
/// certificate and its key must be supplied together.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// PEM-encoded client certificate chain.
    pub client_cert_pem: Option<Vec<u8>>,
    /// PEM-encoded client private key.
    pub client_key_pem: Option<Vec<u8>>,
    /// PEM-encoded CA certificate to verify the server against, replacing
    /// the default roots.
    pub ca_bundle_pem: Option<Vec<u8>>,
    /// Skip server certificate verification entirely.
    pub insecure: bool,
}

//! Synchronous client for a remote entitystore HTTP API.
//!
//! # Overview
//! [`EntityClient`] is scoped to one entity type and translates method calls
//! into requests against the versioned REST surface, normalizing responses
//! and failures into [`ClientError`]. Per operation the flow is: validate
//! inputs (no I/O), build the request, execute it through the retrying
//! transport, interpret the response.
//!
//! # Design
//! - All configuration is fixed at construction; the client holds no mutable
//!   state between calls and is safe to share across threads when its
//!   transport is.
//! - Requests and responses are plain data (`HttpRequest`/`HttpResponse`);
//!   the `build_*`/`parse_*` halves are public, so callers can also execute
//!   the I/O themselves.
//! - The transport is an injectable trait with a blocking ureq default.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod transport;
pub mod types;
mod validate;

pub use client::EntityClient;
pub use config::{ClientConfig, TlsOptions};
pub use error::ClientError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use transport::{HttpTransport, TransportError, UreqTransport};
pub use types::{Entity, Patch};

//! Error types for the entitystore client.
//!
//! # Design
//! Every failure kind gets its own variant so callers can branch on them.
//! Validation variants are produced before any network I/O; `RequestFailed`
//! and `UnexpectedResponseCode` are the only variants that involve the wire.
//! The distinction between those two matters: `RequestFailed` means the
//! transport's own error channel fired (no interpretable response, or an
//! error response surfaced by an injected transport), while
//! `UnexpectedResponseCode` means a response was obtained but its status
//! falls outside the operation's accepted set.

use thiserror::Error;

use crate::transport::TransportError;

/// Errors returned by [`crate::EntityClient`] operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A query-bearing operation was called with an empty query.
    #[error("query not provided")]
    QueryNotProvided,

    /// Insert was called with an empty entity list.
    #[error("no entities provided")]
    EntityNotProvided,

    /// An update operation was called with an empty patch.
    #[error("patch not provided")]
    PatchNotProvided,

    /// An id-bearing operation was called with an empty id.
    #[error("id not provided")]
    IdNotProvided,

    /// Delete-label was called with an empty label.
    #[error("label not set")]
    LabelNotSet,

    /// A caller-supplied entity carries `_id`; identity is exclusively
    /// server-assigned.
    #[error("entity has _id set: {entity}")]
    EntityIdSet { entity: String },

    /// A patch carries `_id`.
    #[error("patch has _id set: {patch}")]
    PatchIdSet { patch: String },

    /// An entity or patch carries `_type` and it differs from the client's
    /// configured entity type.
    #[error("only valid type is '{expected}', but payload has type '{actual}'")]
    EntityTypeMismatch { expected: String, actual: String },

    /// The transport reported a failure after the retry budget was spent.
    #[error("request failed: {0}")]
    RequestFailed(#[from] TransportError),

    /// A response was obtained but its status code is not in the
    /// operation's accepted set.
    #[error("expected {expected}, got {got}")]
    UnexpectedResponseCode { expected: String, got: u16 },

    /// The transport configuration could not be applied (e.g. unparseable
    /// TLS material, or a client certificate without its key).
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The response body could not be decoded as JSON.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

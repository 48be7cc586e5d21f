//! Entity payload types and reserved fields.
//!
//! # Design
//! The server enforces no schema on entities beyond two reserved fields, so
//! entities and patches are plain JSON objects rather than typed DTOs. The
//! client inspects only [`FIELD_ID`] and [`FIELD_TYPE`]; everything else is
//! forwarded untouched.

use serde_json::{Map, Value};

/// Server-assigned identity field. Caller-supplied entities and patches must
/// never set it.
pub const FIELD_ID: &str = "_id";

/// Entity type field. If present, it must equal the client's configured
/// entity type.
pub const FIELD_TYPE: &str = "_type";

/// An entity: a mapping from field name to arbitrary JSON value.
pub type Entity = Map<String, Value>;

/// A partial update applied server-side to entities matched by a query or
/// identified by id. Same reserved-field rules as [`Entity`].
pub type Patch = Map<String, Value>;

//! Request routing, response interpretation, and the public operations.
//!
//! # Design
//! `EntityClient` holds only immutable configuration plus a shared
//! transport, so one instance can serve many threads. Each operation is
//! split into a `build_*` method that produces an [`HttpRequest`] and a
//! `parse_*` method that consumes an [`HttpResponse`]; the public operation
//! methods validate their inputs, then run build → send-with-retry → parse.
//! The `build_*`/`parse_*` layer stays public for callers that want to do
//! their own I/O between the two halves.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::{self, HttpTransport, UreqTransport};
use crate::types::{Entity, Patch};
use crate::validate;

/// Fixed prefix of every resource path.
pub const API_ROOT: &str = "/api/v1";

/// Header carrying the server-side query timeout, in seconds.
pub const QUERY_TIMEOUT_HEADER: &str = "X-Entitystore-Query-Timeout";

/// Queries at or above this many characters are POSTed to the long-query
/// endpoint instead of riding in a URL parameter, since the full URL would
/// otherwise approach the length limit of most HTTP servers.
pub const LONG_QUERY_THRESHOLD: usize = 2000;

const OK: &[u16] = &[200];
const OK_OR_CREATED: &[u16] = &[200, 201];

/// Synchronous client for one entity type of a remote entitystore.
///
/// Every operation validates its inputs before any I/O, then blocks the
/// calling thread until final success or failure, including the full retry
/// sequence. Results are the server's decoded JSON, returned verbatim.
#[derive(Clone)]
pub struct EntityClient {
    config: ClientConfig,
    transport: Arc<dyn HttpTransport>,
}

impl fmt::Debug for EntityClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EntityClient {
    /// Create a client using the default [`UreqTransport`], built from the
    /// config's TLS options.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = UreqTransport::new(&config.tls)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client over an injected transport.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    pub fn entity_type(&self) -> &str {
        &self.config.entity_type
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Return the entities that satisfy `query`.
    pub fn query(&self, query: &str) -> Result<Value, ClientError> {
        validate::require_query(query)?;
        let request = self.build_query(query);
        self.parse_query(self.send(&request)?)
    }

    /// Insert `entities`. Identity is server-assigned: no entity may carry
    /// `_id`, and any `_type` present must match the configured type.
    pub fn insert(&self, entities: &[Entity]) -> Result<Value, ClientError> {
        validate::validate_entities(entities, &self.config.entity_type)?;
        let request = self.build_insert(entities)?;
        self.parse_insert(self.send(&request)?)
    }

    /// Apply `patch` to every entity that satisfies `query`.
    pub fn update(&self, query: &str, patch: &Patch) -> Result<Value, ClientError> {
        validate::require_query(query)?;
        validate::validate_patch(patch, &self.config.entity_type)?;
        let request = self.build_update(query, patch)?;
        self.parse_update(self.send(&request)?)
    }

    /// Apply `patch` to the entity with the given id.
    pub fn update_one(&self, id: &str, patch: &Patch) -> Result<Value, ClientError> {
        validate::require_id(id)?;
        validate::validate_patch(patch, &self.config.entity_type)?;
        let request = self.build_update_one(id, patch)?;
        self.parse_update_one(self.send(&request)?)
    }

    /// Delete every entity that satisfies `query`.
    pub fn delete(&self, query: &str) -> Result<Value, ClientError> {
        validate::require_query(query)?;
        let request = self.build_delete(query);
        self.parse_delete(self.send(&request)?)
    }

    /// Delete the entity with the given id.
    pub fn delete_one(&self, id: &str) -> Result<Value, ClientError> {
        validate::require_id(id)?;
        let request = self.build_delete_one(id);
        self.parse_delete_one(self.send(&request)?)
    }

    /// Return the labels of the entity with the given id.
    pub fn labels(&self, id: &str) -> Result<Value, ClientError> {
        validate::require_id(id)?;
        let request = self.build_labels(id);
        self.parse_labels(self.send(&request)?)
    }

    /// Delete one label on the entity with the given id.
    pub fn delete_label(&self, id: &str, label: &str) -> Result<Value, ClientError> {
        validate::require_id(id)?;
        validate::require_label(label)?;
        let request = self.build_delete_label(id, label);
        self.parse_delete_label(self.send(&request)?)
    }

    // -----------------------------------------------------------------------
    // Request routing
    // -----------------------------------------------------------------------

    /// Route a query. Short queries ride percent-encoded in a URL
    /// parameter; queries of [`LONG_QUERY_THRESHOLD`] characters or more are
    /// POSTed raw to the long-query endpoint. The body is deliberately not
    /// escaped — escaping would alter the query's meaning, and a body has no
    /// length limit to work around.
    pub fn build_query(&self, query: &str) -> HttpRequest {
        if query.chars().count() < LONG_QUERY_THRESHOLD {
            HttpRequest {
                method: HttpMethod::Get,
                url: format!(
                    "{}?query={}",
                    self.url_for(&format!("/entities/{}", self.config.entity_type)),
                    urlencoding::encode(query)
                ),
                headers: self.get_headers(),
                body: None,
            }
        } else {
            HttpRequest {
                method: HttpMethod::Post,
                url: self.url_for(&format!("/query/{}", self.config.entity_type)),
                headers: self.post_headers(),
                body: Some(query.to_string()),
            }
        }
    }

    pub fn build_insert(&self, entities: &[Entity]) -> Result<HttpRequest, ClientError> {
        let body = serde_json::to_string(entities)
            .map_err(|e| ClientError::Serialization(e.to_string()))?;
        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: self.url_for(&format!("/entities/{}", self.config.entity_type)),
            headers: self.post_headers(),
            body: Some(body),
        })
    }

    pub fn build_update(&self, query: &str, patch: &Patch) -> Result<HttpRequest, ClientError> {
        let body =
            serde_json::to_string(patch).map_err(|e| ClientError::Serialization(e.to_string()))?;
        Ok(HttpRequest {
            method: HttpMethod::Put,
            url: format!(
                "{}?query={}",
                self.url_for(&format!("/entities/{}", self.config.entity_type)),
                urlencoding::encode(query)
            ),
            headers: self.post_headers(),
            body: Some(body),
        })
    }

    pub fn build_update_one(&self, id: &str, patch: &Patch) -> Result<HttpRequest, ClientError> {
        let body =
            serde_json::to_string(patch).map_err(|e| ClientError::Serialization(e.to_string()))?;
        Ok(HttpRequest {
            method: HttpMethod::Put,
            url: self.url_for(&format!("/entity/{}/{id}", self.config.entity_type)),
            headers: self.post_headers(),
            body: Some(body),
        })
    }

    pub fn build_delete(&self, query: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Delete,
            url: format!(
                "{}?query={}",
                self.url_for(&format!("/entities/{}", self.config.entity_type)),
                urlencoding::encode(query)
            ),
            headers: self.get_headers(),
            body: None,
        }
    }

    pub fn build_delete_one(&self, id: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Delete,
            url: self.url_for(&format!("/entity/{}/{id}", self.config.entity_type)),
            headers: self.get_headers(),
            body: None,
        }
    }

    pub fn build_labels(&self, id: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: self.url_for(&format!("/entity/{}/{id}/labels", self.config.entity_type)),
            headers: self.get_headers(),
            body: None,
        }
    }

    pub fn build_delete_label(&self, id: &str, label: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Delete,
            url: self.url_for(&format!(
                "/entity/{}/{id}/labels/{label}",
                self.config.entity_type
            )),
            headers: self.get_headers(),
            body: None,
        }
    }

    // -----------------------------------------------------------------------
    // Response interpretation
    // -----------------------------------------------------------------------

    pub fn parse_query(&self, response: HttpResponse) -> Result<Value, ClientError> {
        decode(response, OK)
    }

    pub fn parse_insert(&self, response: HttpResponse) -> Result<Value, ClientError> {
        decode(response, OK_OR_CREATED)
    }

    pub fn parse_update(&self, response: HttpResponse) -> Result<Value, ClientError> {
        decode(response, OK_OR_CREATED)
    }

    pub fn parse_update_one(&self, response: HttpResponse) -> Result<Value, ClientError> {
        decode(response, OK_OR_CREATED)
    }

    pub fn parse_delete(&self, response: HttpResponse) -> Result<Value, ClientError> {
        decode(response, OK)
    }

    pub fn parse_delete_one(&self, response: HttpResponse) -> Result<Value, ClientError> {
        decode(response, OK)
    }

    pub fn parse_labels(&self, response: HttpResponse) -> Result<Value, ClientError> {
        decode(response, OK)
    }

    pub fn parse_delete_label(&self, response: HttpResponse) -> Result<Value, ClientError> {
        decode(response, OK)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ClientError> {
        let response = transport::send_with_retry(
            self.transport.as_ref(),
            request,
            self.config.retry_count,
            self.config.retry_wait,
        )?;
        Ok(response)
    }

    fn url_for(&self, route: &str) -> String {
        format!("{}{API_ROOT}{route}", self.config.base_url)
    }

    fn get_headers(&self) -> Vec<(String, String)> {
        vec![
            ("Accept".to_string(), "application/json".to_string()),
            (
                QUERY_TIMEOUT_HEADER.to_string(),
                format!("{}s", self.config.query_timeout.as_secs()),
            ),
        ]
    }

    fn post_headers(&self) -> Vec<(String, String)> {
        let mut headers = self.get_headers();
        headers.push(("Content-Type".to_string(), "application/json".to_string()));
        headers
    }
}

/// Map the response onto the operation's accepted status codes, then decode
/// the body as JSON and return it verbatim.
fn decode(response: HttpResponse, accepted: &[u16]) -> Result<Value, ClientError> {
    if !accepted.contains(&response.status) {
        return Err(ClientError::UnexpectedResponseCode {
            expected: expected_codes(accepted),
            got: response.status,
        });
    }
    serde_json::from_str(&response.body).map_err(|e| ClientError::Deserialization(e.to_string()))
}

fn expected_codes(accepted: &[u16]) -> String {
    accepted
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(" or ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use serde_json::json;
    use std::sync::Mutex;

    const BASE_URL: &str = "http://localhost:3000";

    fn client() -> EntityClient {
        EntityClient::new(ClientConfig::new("node", BASE_URL)).unwrap()
    }

    fn entity(value: Value) -> Entity {
        value.as_object().unwrap().clone()
    }

    fn ok_response(body: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    /// Replays a fixed response and records how often it was called.
    struct StaticTransport {
        response: Result<HttpResponse, String>,
        calls: Mutex<u32>,
    }

    impl StaticTransport {
        fn ok(status: u16, body: &str) -> Self {
            Self {
                response: Ok(HttpResponse {
                    status,
                    headers: Vec::new(),
                    body: body.to_string(),
                }),
                calls: Mutex::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                response: Err("connection refused".to_string()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    impl HttpTransport for StaticTransport {
        fn send(&self, _request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            *self.calls.lock().unwrap() += 1;
            match &self.response {
                Ok(response) => Ok(response.clone()),
                Err(msg) => Err(TransportError::Network(msg.clone())),
            }
        }
    }

    fn client_with(transport: Arc<StaticTransport>) -> EntityClient {
        EntityClient::with_transport(ClientConfig::new("node", BASE_URL), transport)
    }

    // --- routing ---

    #[test]
    fn short_query_issues_get_with_escaped_parameter() {
        let req = client().build_query("foo=bar");
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(
            req.url,
            "http://localhost:3000/api/v1/entities/node?query=foo%3Dbar"
        );
        assert!(req.body.is_none());
    }

    #[test]
    fn long_query_issues_post_with_raw_body() {
        let query = "foo=bar,".repeat(300);
        let req = client().build_query(&query);
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:3000/api/v1/query/node");
        // The body channel has no length limit, so the query must arrive
        // byte-for-byte unescaped.
        assert_eq!(req.body.as_deref(), Some(query.as_str()));
    }

    #[test]
    fn query_dispatch_switches_at_the_threshold() {
        let c = client();
        let below = "a".repeat(LONG_QUERY_THRESHOLD - 1);
        assert_eq!(c.build_query(&below).method, HttpMethod::Get);
        let at = "a".repeat(LONG_QUERY_THRESHOLD);
        assert_eq!(c.build_query(&at).method, HttpMethod::Post);
    }

    #[test]
    fn build_insert_posts_entity_array_to_collection() {
        let entities = vec![entity(json!({"a": 1}))];
        let req = client().build_insert(&entities).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:3000/api/v1/entities/node");
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!([{"a": 1}]));
    }

    #[test]
    fn build_update_puts_patch_with_escaped_query_parameter() {
        let patch = entity(json!({"foo": "new"}));
        let req = client().build_update("foo=bar", &patch).unwrap();
        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(
            req.url,
            "http://localhost:3000/api/v1/entities/node?query=foo%3Dbar"
        );
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"foo": "new"}));
    }

    #[test]
    fn build_update_one_puts_patch_to_entity_path() {
        let patch = entity(json!({"foo": "new"}));
        let req = client().build_update_one("abc", &patch).unwrap();
        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(req.url, "http://localhost:3000/api/v1/entity/node/abc");
    }

    #[test]
    fn build_delete_issues_delete_with_escaped_query_parameter() {
        let req = client().build_delete("foo=bar");
        assert_eq!(req.method, HttpMethod::Delete);
        assert_eq!(
            req.url,
            "http://localhost:3000/api/v1/entities/node?query=foo%3Dbar"
        );
        assert!(req.body.is_none());
    }

    #[test]
    fn build_delete_one_targets_entity_path() {
        let req = client().build_delete_one("abc");
        assert_eq!(req.method, HttpMethod::Delete);
        assert_eq!(req.url, "http://localhost:3000/api/v1/entity/node/abc");
    }

    #[test]
    fn build_labels_gets_labels_path() {
        let req = client().build_labels("abc");
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(
            req.url,
            "http://localhost:3000/api/v1/entity/node/abc/labels"
        );
    }

    #[test]
    fn build_delete_label_targets_label_path() {
        let req = client().build_delete_label("abc", "foo");
        assert_eq!(req.method, HttpMethod::Delete);
        assert_eq!(
            req.url,
            "http://localhost:3000/api/v1/entity/node/abc/labels/foo"
        );
    }

    #[test]
    fn every_request_carries_accept_and_query_timeout_headers() {
        let req = client().build_query("foo=bar");
        assert!(req
            .headers
            .contains(&("Accept".to_string(), "application/json".to_string())));
        assert!(req
            .headers
            .contains(&(QUERY_TIMEOUT_HEADER.to_string(), "5s".to_string())));
        assert!(!req.headers.iter().any(|(name, _)| name == "Content-Type"));
    }

    #[test]
    fn body_requests_additionally_carry_content_type() {
        let entities = vec![entity(json!({"a": 1}))];
        let req = client().build_insert(&entities).unwrap();
        assert!(req
            .headers
            .contains(&("Content-Type".to_string(), "application/json".to_string())));
        assert!(req
            .headers
            .contains(&(QUERY_TIMEOUT_HEADER.to_string(), "5s".to_string())));
    }

    // --- interpretation ---

    #[test]
    fn parse_query_returns_decoded_body_verbatim() {
        let result = client()
            .parse_query(ok_response(r#"[{"_id":"abc","foo":"bar"}]"#))
            .unwrap();
        assert_eq!(result, json!([{"_id": "abc", "foo": "bar"}]));
    }

    #[test]
    fn parse_query_rejects_unexpected_code() {
        let response = HttpResponse {
            status: 400,
            headers: Vec::new(),
            body: String::new(),
        };
        let err = client().parse_query(response).unwrap_err();
        match err {
            ClientError::UnexpectedResponseCode { expected, got } => {
                assert_eq!(expected, "200");
                assert_eq!(got, 400);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parse_insert_accepts_200_and_201() {
        let c = client();
        assert!(c.parse_insert(ok_response("[]")).is_ok());
        let created = HttpResponse {
            status: 201,
            headers: Vec::new(),
            body: r#"[{"_id":"x","a":1}]"#.to_string(),
        };
        assert_eq!(
            c.parse_insert(created).unwrap(),
            json!([{"_id": "x", "a": 1}])
        );
    }

    #[test]
    fn parse_insert_maps_404_to_unexpected_response_code() {
        let response = HttpResponse {
            status: 404,
            headers: Vec::new(),
            body: String::new(),
        };
        let err = client().parse_insert(response).unwrap_err();
        match err {
            ClientError::UnexpectedResponseCode { expected, got } => {
                assert_eq!(expected, "200 or 201");
                assert_eq!(got, 404);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parse_rejects_malformed_body() {
        let err = client().parse_query(ok_response("not json")).unwrap_err();
        assert!(matches!(err, ClientError::Deserialization(_)));
    }

    #[test]
    fn parse_delete_label_returns_empty_object() {
        let result = client().parse_delete_label(ok_response("{}")).unwrap();
        assert_eq!(result, json!({}));
    }

    // --- operations over a scripted transport ---

    #[test]
    fn query_returns_decoded_entities() {
        let transport = Arc::new(StaticTransport::ok(200, r#"[{"_id":"abc","foo":"bar"}]"#));
        let c = client_with(transport);
        let result = c.query("foo=bar").unwrap();
        assert_eq!(result, json!([{"_id": "abc", "foo": "bar"}]));
    }

    #[test]
    fn query_is_idempotent_against_an_unchanged_server() {
        let transport = Arc::new(StaticTransport::ok(200, r#"[{"_id":"abc","foo":"bar"}]"#));
        let c = client_with(transport);
        assert_eq!(c.query("foo=bar").unwrap(), c.query("foo=bar").unwrap());
    }

    #[test]
    fn transport_failure_surfaces_as_request_failed() {
        let transport = Arc::new(StaticTransport::failing());
        let c = client_with(Arc::clone(&transport));
        let err = c.query("foo=bar").unwrap_err();
        assert!(matches!(err, ClientError::RequestFailed(_)));
        assert_eq!(transport.calls(), 1);
    }

    // --- validation happens before any transport call ---

    #[test]
    fn empty_query_fails_without_transport_call() {
        let transport = Arc::new(StaticTransport::ok(200, "[]"));
        let c = client_with(Arc::clone(&transport));
        assert!(matches!(c.query(""), Err(ClientError::QueryNotProvided)));
        assert!(matches!(c.delete(""), Err(ClientError::QueryNotProvided)));
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn insert_rejects_entity_with_id_without_transport_call() {
        let transport = Arc::new(StaticTransport::ok(200, "[]"));
        let c = client_with(Arc::clone(&transport));
        let entities = vec![entity(json!({"_id": "abc", "foo": "bar"}))];
        assert!(matches!(
            c.insert(&entities),
            Err(ClientError::EntityIdSet { .. })
        ));
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn insert_rejects_empty_list_and_wrong_type() {
        let transport = Arc::new(StaticTransport::ok(200, "[]"));
        let c = client_with(Arc::clone(&transport));
        assert!(matches!(c.insert(&[]), Err(ClientError::EntityNotProvided)));
        let entities = vec![entity(json!({"_type": "host", "a": "b"}))];
        assert!(matches!(
            c.insert(&entities),
            Err(ClientError::EntityTypeMismatch { .. })
        ));
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn update_rejects_bad_patches_without_transport_call() {
        let transport = Arc::new(StaticTransport::ok(200, "{}"));
        let c = client_with(Arc::clone(&transport));
        assert!(matches!(
            c.update("foo=bar", &Patch::new()),
            Err(ClientError::PatchNotProvided)
        ));
        let with_id = entity(json!({"_id": "abc"}));
        assert!(matches!(
            c.update("foo=bar", &with_id),
            Err(ClientError::PatchIdSet { .. })
        ));
        let wrong_type = entity(json!({"_type": "host"}));
        assert!(matches!(
            c.update_one("abc", &wrong_type),
            Err(ClientError::EntityTypeMismatch { .. })
        ));
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn update_checks_query_before_patch() {
        let c = client_with(Arc::new(StaticTransport::ok(200, "{}")));
        assert!(matches!(
            c.update("", &Patch::new()),
            Err(ClientError::QueryNotProvided)
        ));
    }

    #[test]
    fn id_bearing_operations_reject_empty_id() {
        let transport = Arc::new(StaticTransport::ok(200, "{}"));
        let c = client_with(Arc::clone(&transport));
        let patch = entity(json!({"foo": "new"}));
        assert!(matches!(
            c.update_one("", &patch),
            Err(ClientError::IdNotProvided)
        ));
        assert!(matches!(c.delete_one(""), Err(ClientError::IdNotProvided)));
        assert!(matches!(c.labels(""), Err(ClientError::IdNotProvided)));
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn delete_label_checks_id_before_label() {
        let c = client_with(Arc::new(StaticTransport::ok(200, "{}")));
        assert!(matches!(
            c.delete_label("", ""),
            Err(ClientError::IdNotProvided)
        ));
        assert!(matches!(
            c.delete_label("abc", ""),
            Err(ClientError::LabelNotSet)
        ));
    }
}

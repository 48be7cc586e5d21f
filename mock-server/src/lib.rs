//! In-memory entitystore server for integration tests and manual exercise.
//!
//! Implements the wire protocol under `/api/v1`: collection query (URL
//! parameter), long-query POST (raw body), insert, update by query or id,
//! delete by query or id, and the label routes. Entities are stored as plain
//! JSON objects keyed by `_id` and scoped by `_type`; the query language is
//! reduced to comma-separated `field=value` equality clauses, which is all
//! the tests need.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::Value;
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const FIELD_ID: &str = "_id";
pub const FIELD_TYPE: &str = "_type";

/// An entity as stored and served: a plain JSON object.
pub type Entity = serde_json::Map<String, Value>;

pub type Db = Arc<RwLock<HashMap<String, Entity>>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route(
            "/api/v1/entities/{entity_type}",
            get(query_entities)
                .post(insert_entities)
                .put(update_entities)
                .delete(delete_entities),
        )
        .route("/api/v1/query/{entity_type}", post(long_query))
        .route(
            "/api/v1/entity/{entity_type}/{id}",
            put(update_entity).delete(delete_entity),
        )
        .route("/api/v1/entity/{entity_type}/{id}/labels", get(entity_labels))
        .route(
            "/api/v1/entity/{entity_type}/{id}/labels/{label}",
            delete(delete_entity_label),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// True when every comma-separated `field=value` clause of `query` matches
/// the entity. Empty clauses (e.g. from a trailing comma) are skipped; a
/// clause without `=` matches nothing.
pub fn matches_query(entity: &Entity, query: &str) -> bool {
    query
        .split(',')
        .filter(|clause| !clause.is_empty())
        .all(|clause| match clause.split_once('=') {
            Some((field, value)) => field_equals(entity.get(field), value),
            None => false,
        })
}

fn field_equals(field: Option<&Value>, value: &str) -> bool {
    match field {
        Some(Value::String(s)) => s == value,
        Some(other) => other.to_string() == value,
        None => false,
    }
}

fn has_type(entity: &Entity, entity_type: &str) -> bool {
    entity.get(FIELD_TYPE).and_then(Value::as_str) == Some(entity_type)
}

fn matching(store: &HashMap<String, Entity>, entity_type: &str, query: &str) -> Vec<Entity> {
    store
        .values()
        .filter(|entity| has_type(entity, entity_type) && matches_query(entity, query))
        .cloned()
        .collect()
}

fn matching_ids(store: &HashMap<String, Entity>, entity_type: &str, query: &str) -> Vec<String> {
    store
        .iter()
        .filter(|(_, entity)| has_type(entity, entity_type) && matches_query(entity, query))
        .map(|(id, _)| id.clone())
        .collect()
}

fn apply_patch(entity: &mut Entity, patch: &Entity) {
    for (field, value) in patch {
        entity.insert(field.clone(), value.clone());
    }
}

async fn query_entities(
    State(db): State<Db>,
    Path(entity_type): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Entity>>, StatusCode> {
    let query = params.get("query").ok_or(StatusCode::BAD_REQUEST)?;
    let store = db.read().await;
    Ok(Json(matching(&store, &entity_type, query)))
}

async fn long_query(
    State(db): State<Db>,
    Path(entity_type): Path<String>,
    body: String,
) -> Json<Vec<Entity>> {
    let store = db.read().await;
    Json(matching(&store, &entity_type, &body))
}

async fn insert_entities(
    State(db): State<Db>,
    Path(entity_type): Path<String>,
    Json(mut input): Json<Vec<Entity>>,
) -> (StatusCode, Json<Vec<Entity>>) {
    let mut store = db.write().await;
    for entity in &mut input {
        let id = Uuid::new_v4().to_string();
        entity.insert(FIELD_ID.to_string(), Value::String(id.clone()));
        entity.insert(FIELD_TYPE.to_string(), Value::String(entity_type.clone()));
        store.insert(id, entity.clone());
    }
    (StatusCode::CREATED, Json(input))
}

async fn update_entities(
    State(db): State<Db>,
    Path(entity_type): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    Json(patch): Json<Entity>,
) -> Result<Json<Vec<Entity>>, StatusCode> {
    let query = params.get("query").ok_or(StatusCode::BAD_REQUEST)?;
    let mut store = db.write().await;
    let ids = matching_ids(&store, &entity_type, query);
    let mut updated = Vec::new();
    for id in ids {
        if let Some(entity) = store.get_mut(&id) {
            apply_patch(entity, &patch);
            updated.push(entity.clone());
        }
    }
    Ok(Json(updated))
}

async fn delete_entities(
    State(db): State<Db>,
    Path(entity_type): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Entity>>, StatusCode> {
    let query = params.get("query").ok_or(StatusCode::BAD_REQUEST)?;
    let mut store = db.write().await;
    let ids = matching_ids(&store, &entity_type, query);
    let mut removed = Vec::new();
    for id in ids {
        if let Some(entity) = store.remove(&id) {
            removed.push(entity);
        }
    }
    Ok(Json(removed))
}

async fn update_entity(
    State(db): State<Db>,
    Path((entity_type, id)): Path<(String, String)>,
    Json(patch): Json<Entity>,
) -> Result<Json<Entity>, StatusCode> {
    let mut store = db.write().await;
    match store.get_mut(&id) {
        Some(entity) if has_type(entity, &entity_type) => {
            apply_patch(entity, &patch);
            Ok(Json(entity.clone()))
        }
        _ => Err(StatusCode::NOT_FOUND),
    }
}

async fn delete_entity(
    State(db): State<Db>,
    Path((entity_type, id)): Path<(String, String)>,
) -> Result<Json<Entity>, StatusCode> {
    let mut store = db.write().await;
    if !store.get(&id).is_some_and(|e| has_type(e, &entity_type)) {
        return Err(StatusCode::NOT_FOUND);
    }
    let removed = store.remove(&id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(removed))
}

async fn entity_labels(
    State(db): State<Db>,
    Path((entity_type, id)): Path<(String, String)>,
) -> Result<Json<Vec<String>>, StatusCode> {
    let store = db.read().await;
    match store.get(&id) {
        Some(entity) if has_type(entity, &entity_type) => {
            let mut labels: Vec<String> = entity
                .keys()
                .filter(|k| k.as_str() != FIELD_ID && k.as_str() != FIELD_TYPE)
                .cloned()
                .collect();
            labels.sort();
            Ok(Json(labels))
        }
        _ => Err(StatusCode::NOT_FOUND),
    }
}

async fn delete_entity_label(
    State(db): State<Db>,
    Path((entity_type, id, label)): Path<(String, String, String)>,
) -> Result<Json<Entity>, StatusCode> {
    if label == FIELD_ID || label == FIELD_TYPE {
        return Err(StatusCode::BAD_REQUEST);
    }
    let mut store = db.write().await;
    match store.get_mut(&id) {
        Some(entity) if has_type(entity, &entity_type) => {
            entity.remove(&label);
            Ok(Json(Entity::new()))
        }
        _ => Err(StatusCode::NOT_FOUND),
    }
}

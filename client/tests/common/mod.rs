//! In-process fake CouchDB for integration tests.
//!
//! Serves the subset of the REST API the client uses, with each database
//! backed by an engine `MemoryDatabase`.

#![allow(dead_code)]

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use dashmap::DashMap;
use ottoman_engine::{Error, MemoryDatabase};
use serde::Deserialize;
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub type Databases = Arc<DashMap<String, MemoryDatabase>>;

/// A running fake server.
pub struct FakeCouch {
    pub url: String,
    pub databases: Databases,
}

impl FakeCouch {
    /// Bind to an ephemeral port and serve in the background.
    pub async fn start() -> Self {
        let databases: Databases = Arc::new(DashMap::new());
        let app = Router::new()
            .route("/_all_dbs", get(all_dbs))
            .route(
                "/{db}",
                get(db_info).put(create_db).delete(delete_db).post(post_doc),
            )
            .route("/{db}/_all_docs", get(all_docs).post(all_docs_keys))
            .route("/{db}/_bulk_docs", post(bulk_docs))
            .route(
                "/{db}/_design/{design}",
                get(get_design).put(put_design).delete(delete_design),
            )
            .route(
                "/{db}/_design/{design}/_view/{view}",
                get(view).post(view_keys),
            )
            .route(
                "/{db}/{id}",
                get(get_doc)
                    .put(put_doc)
                    .delete(delete_doc)
                    .fallback(copy_doc),
            )
            .layer(TraceLayer::new_for_http())
            .with_state(databases.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { url, databases }
    }

    /// Run `f` against a database's storage, as another client would.
    pub fn with_db<T>(&self, name: &str, f: impl FnOnce(&mut MemoryDatabase) -> T) -> T {
        let mut db = self.databases.get_mut(name).expect("database exists");
        f(&mut *db)
    }
}

fn reply(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn engine_error(e: Error) -> Response {
    match e {
        Error::Conflict(_) | Error::Unmergeable(_) => reply(
            StatusCode::CONFLICT,
            json!({"error": "conflict", "reason": "Document update conflict."}),
        ),
        Error::NotFound(_) => reply(
            StatusCode::NOT_FOUND,
            json!({"error": "not_found", "reason": "missing"}),
        ),
        other => reply(
            StatusCode::BAD_REQUEST,
            json!({"error": "bad_request", "reason": other.to_string()}),
        ),
    }
}

fn no_db() -> Response {
    reply(
        StatusCode::NOT_FOUND,
        json!({"error": "not_found", "reason": "Database does not exist."}),
    )
}

fn written(ack: ottoman_engine::Result<ottoman_engine::WriteAck>, status: StatusCode) -> Response {
    match ack {
        Ok(ack) => reply(status, json!({"ok": true, "id": ack.id, "rev": ack.rev})),
        Err(e) => engine_error(e),
    }
}

async fn all_dbs(State(dbs): State<Databases>) -> Json<Vec<String>> {
    let mut names: Vec<String> = dbs.iter().map(|entry| entry.key().clone()).collect();
    names.sort();
    Json(names)
}

async fn db_info(State(dbs): State<Databases>, Path(db): Path<String>) -> Response {
    match dbs.get(&db) {
        Some(store) => reply(
            StatusCode::OK,
            json!({"db_name": db, "doc_count": store.len()}),
        ),
        None => no_db(),
    }
}

async fn create_db(State(dbs): State<Databases>, Path(db): Path<String>) -> Response {
    if dbs.contains_key(&db) {
        return reply(
            StatusCode::PRECONDITION_FAILED,
            json!({"error": "file_exists", "reason": "The database could not be created, the file already exists."}),
        );
    }
    dbs.insert(db, MemoryDatabase::new());
    reply(StatusCode::CREATED, json!({"ok": true}))
}

async fn delete_db(State(dbs): State<Databases>, Path(db): Path<String>) -> Response {
    match dbs.remove(&db) {
        Some(_) => reply(StatusCode::OK, json!({"ok": true})),
        None => no_db(),
    }
}

async fn post_doc(
    State(dbs): State<Databases>,
    Path(db): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    match dbs.get_mut(&db) {
        Some(mut store) => written(store.post(body), StatusCode::CREATED),
        None => no_db(),
    }
}

async fn get_doc(
    State(dbs): State<Databases>,
    Path((db, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    read_doc(&dbs, &db, &id, &headers)
}

async fn get_design(
    State(dbs): State<Databases>,
    Path((db, design)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    read_doc(&dbs, &db, &design_id(&design), &headers)
}

/// GET a document, answering 304 when `If-None-Match` names its revision.
fn read_doc(dbs: &Databases, db: &str, id: &str, request: &HeaderMap) -> Response {
    let Some(store) = dbs.get(db) else {
        return no_db();
    };
    match store.get(id) {
        Ok(doc) => {
            let etag = format!("\"{}\"", doc["_rev"].as_str().unwrap_or_default());
            let unchanged = request
                .get(header::IF_NONE_MATCH)
                .and_then(|value| value.to_str().ok())
                .is_some_and(|value| value == etag);
            let mut headers = HeaderMap::new();
            headers.insert(header::ETAG, etag.parse().unwrap());
            if unchanged {
                return (StatusCode::NOT_MODIFIED, headers).into_response();
            }
            (StatusCode::OK, headers, Json(doc)).into_response()
        }
        Err(e) => engine_error(e),
    }
}

async fn put_doc(
    State(dbs): State<Databases>,
    Path((db, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    match dbs.get_mut(&db) {
        Some(mut store) => written(store.put(&id, body), StatusCode::CREATED),
        None => no_db(),
    }
}

#[derive(Deserialize)]
struct RevParam {
    rev: String,
}

async fn put_design(
    State(dbs): State<Databases>,
    Path((db, design)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    match dbs.get_mut(&db) {
        Some(mut store) => written(store.put(&design_id(&design), body), StatusCode::CREATED),
        None => no_db(),
    }
}

async fn delete_design(
    State(dbs): State<Databases>,
    Path((db, design)): Path<(String, String)>,
    Query(params): Query<RevParam>,
) -> Response {
    match dbs.get_mut(&db) {
        Some(mut store) => written(
            store.delete(&design_id(&design), &params.rev),
            StatusCode::OK,
        ),
        None => no_db(),
    }
}

/// `COPY /{db}/{id}` with a `Destination: <id>[?rev=<rev>]` header.
async fn copy_doc(
    State(dbs): State<Databases>,
    Path((db, id)): Path<(String, String)>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    if method.as_str() != "COPY" {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    let Some(destination) = headers.get("destination").and_then(|v| v.to_str().ok()) else {
        return reply(
            StatusCode::BAD_REQUEST,
            json!({"error": "bad_request", "reason": "Destination header is mandatory for COPY."}),
        );
    };
    let (target, rev) = match destination.split_once("?rev=") {
        Some((target, rev)) => (target.to_string(), Some(rev.to_string())),
        None => (destination.to_string(), None),
    };

    let Some(mut store) = dbs.get_mut(&db) else {
        return no_db();
    };
    let mut body = match store.get(&id) {
        Ok(body) => body,
        Err(e) => return engine_error(e),
    };
    body["_id"] = json!(target);
    body["_rev"] = json!(rev);
    written(store.put(&target, body), StatusCode::CREATED)
}

async fn delete_doc(
    State(dbs): State<Databases>,
    Path((db, id)): Path<(String, String)>,
    Query(params): Query<RevParam>,
) -> Response {
    match dbs.get_mut(&db) {
        Some(mut store) => written(store.delete(&id, &params.rev), StatusCode::OK),
        None => no_db(),
    }
}

#[derive(Deserialize)]
struct BulkBody {
    docs: Vec<Value>,
    #[serde(default)]
    all_or_nothing: bool,
}

async fn bulk_docs(
    State(dbs): State<Databases>,
    Path(db): Path<String>,
    Json(body): Json<BulkBody>,
) -> Response {
    let Some(mut store) = dbs.get_mut(&db) else {
        return no_db();
    };
    let ids: Vec<String> = body
        .docs
        .iter()
        .map(|doc| doc["_id"].as_str().unwrap_or_default().to_string())
        .collect();

    match store.bulk(body.docs, body.all_or_nothing) {
        Ok(results) => {
            let items: Vec<Value> = results
                .into_iter()
                .zip(ids)
                .map(|(result, id)| match result {
                    Ok(ack) => json!({"ok": true, "id": ack.id, "rev": ack.rev}),
                    Err(Error::Conflict(_)) => {
                        json!({"id": id, "error": "conflict", "reason": "Document update conflict."})
                    }
                    Err(Error::NotFound(_)) => {
                        json!({"id": id, "error": "not_found", "reason": "missing"})
                    }
                    Err(e) => json!({"id": id, "error": "bad_request", "reason": e.to_string()}),
                })
                .collect();
            reply(StatusCode::CREATED, Value::Array(items))
        }
        Err(e) => engine_error(e),
    }
}

#[derive(Deserialize)]
struct KeysBody {
    keys: Vec<Value>,
}

/// One emitted row before filtering.
#[derive(Clone)]
struct Row {
    id: String,
    key: Value,
    value: Value,
}

async fn all_docs(
    State(dbs): State<Databases>,
    Path(db): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    list_docs(&dbs, &db, &params, None)
}

async fn all_docs_keys(
    State(dbs): State<Databases>,
    Path(db): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<KeysBody>,
) -> Response {
    list_docs(&dbs, &db, &params, Some(body.keys))
}

fn list_docs(
    dbs: &Databases,
    db: &str,
    params: &HashMap<String, String>,
    keys: Option<Vec<Value>>,
) -> Response {
    let Some(store) = dbs.get(db) else {
        return no_db();
    };
    let rows = store
        .all_docs()
        .into_iter()
        .map(|(id, rev)| Row {
            key: json!(id),
            value: json!({"rev": rev}),
            id,
        })
        .collect();
    select_rows(&store, rows, params, keys)
}

async fn view(
    State(dbs): State<Databases>,
    Path((db, design, name)): Path<(String, String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    query_view(&dbs, &db, &design, &name, &params, None)
}

async fn view_keys(
    State(dbs): State<Databases>,
    Path((db, design, name)): Path<(String, String, String)>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<KeysBody>,
) -> Response {
    query_view(&dbs, &db, &design, &name, &params, Some(body.keys))
}

/// Runs map functions of the form `emit(doc.<key>, doc.<value>)`, where
/// the value may also be `null`. Reduce functions are not evaluated.
fn query_view(
    dbs: &Databases,
    db: &str,
    design: &str,
    name: &str,
    params: &HashMap<String, String>,
    keys: Option<Vec<Value>>,
) -> Response {
    let Some(store) = dbs.get(db) else {
        return no_db();
    };
    let map = store
        .get(&design_id(design))
        .ok()
        .and_then(|doc| doc["views"][name]["map"].as_str().map(str::to_string));
    let Some((key_field, value_field)) = map.as_deref().and_then(emitted) else {
        return reply(
            StatusCode::NOT_FOUND,
            json!({"error": "not_found", "reason": "missing_named_view"}),
        );
    };

    let mut rows: Vec<Row> = store
        .all_docs()
        .into_iter()
        .filter(|(id, _)| !id.starts_with("_design/"))
        .filter_map(|(id, _)| {
            let doc = store.get(&id).ok()?;
            let key = doc.get(&key_field)?.clone();
            let value = value_field
                .as_ref()
                .and_then(|field| doc.get(field).cloned())
                .unwrap_or(Value::Null);
            Some(Row { id, key, value })
        })
        .collect();
    rows.sort_by(|a, b| collate(&a.key, &b.key).then_with(|| a.id.cmp(&b.id)));
    select_rows(&store, rows, params, keys)
}

fn emitted(map: &str) -> Option<(String, Option<String>)> {
    let args = map.split_once("emit(")?.1.split_once(')')?.0;
    let (key, value) = args.split_once(',')?;
    let field = |arg: &str| arg.trim().strip_prefix("doc.").map(str::to_string);
    Some((field(key)?, field(value)))
}

/// Apply key, range, paging and `include_docs` parameters to sorted rows.
fn select_rows(
    store: &MemoryDatabase,
    rows: Vec<Row>,
    params: &HashMap<String, String>,
    keys: Option<Vec<Value>>,
) -> Response {
    let key = |name: &str| params.get(name).and_then(|raw| serde_json::from_str::<Value>(raw).ok());
    let flag = |name: &str| params.get(name).map_or(false, |v| v == "true");
    let number = |name: &str| params.get(name).and_then(|v| v.parse::<usize>().ok());

    let total_rows = rows.len();
    let descending = flag("descending");
    let (low, high) = if descending {
        (key("endkey"), key("startkey"))
    } else {
        (key("startkey"), key("endkey"))
    };
    let exact = key("key");

    let mut rows: Vec<Row> = match keys {
        Some(keys) => {
            let mut picked = Vec::new();
            for wanted in &keys {
                picked.extend(rows.iter().filter(|row| &row.key == wanted).cloned());
            }
            picked
        }
        None => rows
            .into_iter()
            .filter(|row| exact.as_ref().map_or(true, |k| &row.key == k))
            .filter(|row| low.as_ref().map_or(true, |k| collate(&row.key, k).is_ge()))
            .filter(|row| high.as_ref().map_or(true, |k| collate(&row.key, k).is_le()))
            .collect(),
    };
    if descending {
        rows.reverse();
    }

    let skip = number("skip").unwrap_or(0);
    let limit = number("limit").unwrap_or(usize::MAX);
    let include_docs = flag("include_docs");

    let rows: Vec<Value> = rows
        .into_iter()
        .skip(skip)
        .take(limit)
        .map(|row| {
            let mut out = json!({"id": row.id, "key": row.key, "value": row.value});
            if include_docs {
                out["doc"] = store.get(&row.id).unwrap_or(Value::Null);
            }
            out
        })
        .collect();

    reply(
        StatusCode::OK,
        json!({"total_rows": total_rows, "offset": skip, "rows": rows}),
    )
}

/// View key ordering: null, booleans, numbers, strings, arrays, objects.
fn collate(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn design_id(name: &str) -> String {
    format!("_design/{}", name)
}

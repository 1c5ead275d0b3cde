//! Shared helpers for suggest-api integration tests
//!
//! Upstream services are simulated by one axum router bound to an ephemeral
//! port; each route's behaviour comes from `MockUpstream`.

#![allow(dead_code)]

use axum::{
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use suggest_api::config::{ServiceConfig, UpstreamConfig};

pub const THING: &str = "http://www.ft.com/thing/";
pub const ABOUT: &str = "http://www.ft.com/ontology/annotation/about";
pub const HAS_AUTHOR: &str = "http://www.ft.com/ontology/annotation/hasAuthor";
pub const PERSON: &str = "http://www.ft.com/ontology/person/Person";

/// Canned upstream behaviour plus a record of what was received
#[derive(Default)]
pub struct MockUpstream {
    pub tme: Mutex<(u16, Value)>,
    pub authors: Mutex<(u16, Value)>,
    /// Base id → canonical concept
    pub concepts: Mutex<HashMap<String, Value>>,
    pub concordance_status: Mutex<Option<u16>>,
    pub things: Mutex<Value>,
    pub denylist: Mutex<(u16, Vec<String>)>,
    pub gtg_status: Mutex<Option<u16>>,
    /// (path, query pairs, selected headers) per call
    pub calls: Mutex<Vec<RecordedCall>>,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub path: String,
    pub query: Vec<(String, String)>,
    pub request_id: Option<String>,
    pub debug: Option<String>,
    pub body: Option<Value>,
}

impl MockUpstream {
    pub fn new() -> Arc<Self> {
        let mock = Self::default();
        *mock.tme.lock() = (200, json!({ "suggestions": [] }));
        *mock.authors.lock() = (200, json!({ "suggestions": [] }));
        *mock.things.lock() = json!({ "things": {} });
        *mock.denylist.lock() = (200, Vec::new());
        Arc::new(mock)
    }

    pub fn set_tme(&self, status: u16, ids: &[(&str, &str)]) {
        *self.tme.lock() = (status, suggestions(ids));
    }

    pub fn set_authors(&self, status: u16, ids: &[(&str, &str)]) {
        *self.authors.lock() = (status, suggestions(ids));
    }

    pub fn add_concept(&self, base_id: &str, concept_type: &str) {
        self.concepts.lock().insert(
            base_id.to_string(),
            json!({
                "id": format!("{}{}", THING, base_id),
                "apiUrl": format!("http://api.ft.com/things/{}", base_id),
                "type": concept_type,
                "prefLabel": format!("Label {}", base_id),
            }),
        );
    }

    pub fn calls_to(&self, path: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.path == path)
            .cloned()
            .collect()
    }

    fn record(&self, path: &str, query: Vec<(String, String)>, headers: &HeaderMap, body: Option<Value>) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        self.calls.lock().push(RecordedCall {
            path: path.to_string(),
            query,
            request_id: header("x-request-id"),
            debug: header("debug"),
            body,
        });
    }
}

/// Provider body for (predicate, base id) pairs, with raw-scheme ids
pub fn suggestions(ids: &[(&str, &str)]) -> Value {
    let list: Vec<Value> = ids
        .iter()
        .map(|(predicate, id)| {
            json!({
                "predicate": predicate,
                "id": format!("http://api.ft.com/things/{}", id),
                "prefLabel": format!("Raw {}", id),
            })
        })
        .collect();
    json!({ "suggestions": list })
}

fn respond(status: u16, body: Value) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status == StatusCode::NO_CONTENT {
        return status.into_response();
    }
    (status, Json(body)).into_response()
}

async fn tme(
    State(mock): State<Arc<MockUpstream>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    mock.record("/tme", Vec::new(), &headers, Some(body));
    let (status, body) = mock.tme.lock().clone();
    respond(status, body)
}

async fn authors(
    State(mock): State<Arc<MockUpstream>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    mock.record("/authors", Vec::new(), &headers, Some(body));
    let (status, body) = mock.authors.lock().clone();
    respond(status, body)
}

async fn concordances(
    State(mock): State<Arc<MockUpstream>>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    mock.record("/concordances", query.clone(), &headers, None);
    if let Some(status) = *mock.concordance_status.lock() {
        return respond(status, json!({ "message": "broken" }));
    }
    let known = mock.concepts.lock();
    let concepts: serde_json::Map<String, Value> = query
        .iter()
        .filter(|(key, _)| key == "ids")
        .filter_map(|(_, id)| known.get(id).map(|concept| (id.clone(), concept.clone())))
        .collect();
    respond(200, json!({ "concepts": concepts }))
}

async fn things(
    State(mock): State<Arc<MockUpstream>>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    mock.record("/things", query, &headers, None);
    let body = mock.things.lock().clone();
    respond(200, body)
}

async fn denylist(
    State(mock): State<Arc<MockUpstream>>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    mock.record("/denylist", query, &headers, None);
    let (status, uuids) = mock.denylist.lock().clone();
    respond(status, json!({ "uuids": uuids }))
}

async fn gtg(State(mock): State<Arc<MockUpstream>>) -> Response {
    match *mock.gtg_status.lock() {
        Some(status) => respond(status, Value::Null),
        None => (StatusCode::OK, Body::from("OK")).into_response(),
    }
}

/// Serve the mock on 127.0.0.1:0 and return its base URL
pub async fn spawn_upstream(mock: Arc<MockUpstream>) -> String {
    let router = Router::new()
        .route("/tme", post(tme))
        .route("/authors", post(authors))
        .route("/concordances", get(concordances))
        .route("/things", get(things))
        .route("/denylist", get(denylist))
        .route("/__gtg", get(gtg))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Should bind ephemeral port");
    let addr = listener.local_addr().expect("Should have local address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Mock upstream should serve");
    });
    format!("http://{}", addr)
}

/// Service configuration pointing every upstream at `base_url`
pub fn config_for(base_url: &str) -> ServiceConfig {
    let upstream = |endpoint: &str| UpstreamConfig {
        base_url: base_url.to_string(),
        endpoint: endpoint.to_string(),
    };

    let mut config = ServiceConfig {
        http_timeout_secs: 5,
        tme: upstream("/tme"),
        authors: upstream("/authors"),
        concordance: upstream("/concordances"),
        broader: upstream("/things"),
        ..Default::default()
    };
    config.denylist.base_url = base_url.to_string();
    config.denylist.endpoint = "/denylist".to_string();
    config.denylist.max_age_secs = 0;
    config
}

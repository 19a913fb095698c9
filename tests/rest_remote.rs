#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use matrix_prefs_lib::config::RestConfig;
use matrix_prefs_lib::prefs::{
    LocalStoreHandle, PreferenceKey, PreferenceSource, PreferenceStore, RemoteFetch,
    RemotePreferences, RemoteSave, RestRemote,
};
use serde_json::{json, Value};

const API_KEY: &str = "anon-key";
const TABLE: &str = "user_preferences";

/// Minimal PostgREST stand-in: one table, `eq.` filters, merge-duplicate upserts.
#[derive(Default)]
struct FakeBackend {
    provisioned: AtomicBool,
    failing: AtomicBool,
    rows: Mutex<HashMap<(String, String), Value>>,
}

type Shared = Arc<FakeBackend>;

fn missing_relation() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "code": "42P01",
            "message": "relation \"public.user_preferences\" does not exist",
        })),
    )
        .into_response()
}

fn gate(backend: &FakeBackend, headers: &HeaderMap, table: &str) -> Option<Response> {
    if headers.get("apikey").and_then(|v| v.to_str().ok()) != Some(API_KEY) {
        return Some((StatusCode::UNAUTHORIZED, Json(json!({ "message": "no api key" }))).into_response());
    }
    if backend.failing.load(Ordering::SeqCst) {
        return Some(
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "message": "upstream unavailable" })),
            )
                .into_response(),
        );
    }
    if table != TABLE || !backend.provisioned.load(Ordering::SeqCst) {
        return Some(missing_relation());
    }
    None
}

fn eq_filter(query: &HashMap<String, String>, field: &str) -> String {
    query
        .get(field)
        .and_then(|raw| raw.strip_prefix("eq."))
        .unwrap_or_default()
        .to_string()
}

async fn select_rows(
    State(backend): State<Shared>,
    Path(table): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if let Some(rejection) = gate(&backend, &headers, &table) {
        return rejection;
    }
    let owner = eq_filter(&query, "owner_id");
    let key = eq_filter(&query, "preference_key");
    let rows = backend.rows.lock().unwrap();
    let body: Vec<Value> = rows
        .get(&(owner, key))
        .map(|value| json!({ "value": value }))
        .into_iter()
        .collect();
    Json(body).into_response()
}

async fn upsert_rows(
    State(backend): State<Shared>,
    Path(table): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(rows): Json<Vec<Value>>,
) -> Response {
    if let Some(rejection) = gate(&backend, &headers, &table) {
        return rejection;
    }
    assert_eq!(query.get("on_conflict").map(String::as_str), Some("owner_id,preference_key"));
    let prefer = headers
        .get("prefer")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(prefer.contains("resolution=merge-duplicates"), "{prefer}");

    let mut stored = backend.rows.lock().unwrap();
    for row in rows {
        let owner = row["owner_id"].as_str().unwrap_or_default().to_string();
        let key = row["preference_key"].as_str().unwrap_or_default().to_string();
        assert!(row["updated_at"].is_string());
        stored.insert((owner, key), row["value"].clone());
    }
    StatusCode::CREATED.into_response()
}

async fn not_implemented() -> Response {
    (StatusCode::NOT_IMPLEMENTED, "not implemented").into_response()
}

async fn spawn_backend() -> (SocketAddr, Shared) {
    let backend: Shared = Arc::new(FakeBackend::default());
    let app = Router::new()
        .route("/rest/v1/{table}", get(select_rows).post(upsert_rows))
        .with_state(backend.clone());
    let stub = Router::new().route("/rest/v1/{table}", get(not_implemented).post(not_implemented));
    let app = Router::new().nest("/stub", stub).merge(app);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, backend)
}

fn rest_config(base_url: String) -> RestConfig {
    RestConfig {
        base_url,
        api_key: API_KEY.to_string(),
        access_token: Some("user-jwt".to_string()),
        table: TABLE.to_string(),
        timeout: Duration::from_secs(5),
    }
}

fn remote_for(addr: SocketAddr) -> RestRemote {
    RestRemote::new(rest_config(format!("http://{addr}"))).unwrap()
}

#[tokio::test]
async fn missing_table_is_not_provisioned() {
    let (addr, _) = spawn_backend().await;
    let remote = remote_for(addr);
    let key = PreferenceKey::sidebar_order();

    assert_eq!(remote.fetch("u1", &key).await, RemoteFetch::NotProvisioned);
    assert_eq!(
        remote.save("u1", &key, &json!(["todos"])).await,
        RemoteSave::NotProvisioned
    );
}

#[tokio::test]
async fn not_implemented_stub_is_not_provisioned() {
    let (addr, _) = spawn_backend().await;
    let remote = RestRemote::new(rest_config(format!("http://{addr}/stub"))).unwrap();
    let key = PreferenceKey::theme_settings();

    assert_eq!(remote.fetch("u1", &key).await, RemoteFetch::NotProvisioned);
    assert_eq!(
        remote.save("u1", &key, &json!({ "theme": "dark" })).await,
        RemoteSave::NotProvisioned
    );
}

#[tokio::test]
async fn provisioned_table_round_trips_through_upsert() {
    let (addr, backend) = spawn_backend().await;
    backend.provisioned.store(true, Ordering::SeqCst);
    let remote = remote_for(addr);
    let key = PreferenceKey::sidebar_order();

    assert_eq!(remote.fetch("u1", &key).await, RemoteFetch::NotFound);
    assert_eq!(remote.save("u1", &key, &json!(["todos"])).await, RemoteSave::Saved);
    assert_eq!(
        remote.save("u1", &key, &json!(["notes", "todos"])).await,
        RemoteSave::Saved
    );
    assert_eq!(
        remote.fetch("u1", &key).await,
        RemoteFetch::Found(json!(["notes", "todos"]))
    );
    assert_eq!(backend.rows.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn server_errors_are_transient() {
    let (addr, backend) = spawn_backend().await;
    backend.provisioned.store(true, Ordering::SeqCst);
    backend.failing.store(true, Ordering::SeqCst);
    let remote = remote_for(addr);
    let key = PreferenceKey::sidebar_order();

    match remote.fetch("u1", &key).await {
        RemoteFetch::Transient(err) => {
            assert_eq!(err.code(), "REMOTE/HTTP");
            assert_eq!(err.context().get("status").map(String::as_str), Some("503"));
        }
        other => panic!("expected transient, got {other:?}"),
    }
    assert!(matches!(
        remote.save("u1", &key, &json!([])).await,
        RemoteSave::Transient(_)
    ));
}

#[tokio::test]
async fn wrong_api_key_is_transient() {
    let (addr, backend) = spawn_backend().await;
    backend.provisioned.store(true, Ordering::SeqCst);
    let mut config = rest_config(format!("http://{addr}"));
    config.api_key = "wrong".into();
    let remote = RestRemote::new(config).unwrap();

    assert!(matches!(
        remote.fetch("u1", &PreferenceKey::sidebar_order()).await,
        RemoteFetch::Transient(_)
    ));
}

#[tokio::test]
async fn unreachable_host_is_transient() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let remote = remote_for(addr);

    match remote.fetch("u1", &PreferenceKey::sidebar_order()).await {
        RemoteFetch::Transient(err) => assert!(err.code().starts_with("REMOTE/"), "{err}"),
        other => panic!("expected transient, got {other:?}"),
    }
}

#[tokio::test]
async fn store_over_rest_falls_back_while_unprovisioned() {
    let (addr, backend) = spawn_backend().await;
    let store = PreferenceStore::new(Arc::new(remote_for(addr)), LocalStoreHandle::in_memory());
    let key = PreferenceKey::theme_settings();
    let value = json!({ "theme": "dark", "recentCustomColors": [] });

    let outcome = store.set_preference("u1", &key, &value).await;
    assert!(!outcome.used_remote);
    assert!(outcome.warning.is_none());
    assert_eq!(store.get_preference("u1", &key, Value::Null).await, value);

    backend.provisioned.store(true, Ordering::SeqCst);
    let outcome = store.set_preference("u1", &key, &value).await;
    assert!(outcome.used_remote);
    let resolved = store.resolve("u1", &key, Value::Null).await;
    assert_eq!(resolved.source, PreferenceSource::Remote);
    assert_eq!(resolved.value, value);

    backend.failing.store(true, Ordering::SeqCst);
    let outcome = store.set_preference("u1", &key, &json!({ "theme": "light" })).await;
    assert!(!outcome.used_remote);
    assert!(outcome.warning.is_some());
    assert_eq!(
        store.get_preference("u1", &key, Value::Null).await,
        json!({ "theme": "light" })
    );
}

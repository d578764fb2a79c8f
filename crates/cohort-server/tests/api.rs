//! Integration tests for the customer HTTP API.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use cohort_core::CustomerStore;
use cohort_server::{AppState, customers_router, load_store, serve};
use cohort_storage::{FixtureStore, RedbCustomerStore};
use cohort_stream::IngestConfig;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

fn router_with(store: Arc<dyn CustomerStore>) -> Router {
    customers_router(AppState::new(store))
}

fn fixture_router() -> Router {
    router_with(Arc::new(FixtureStore::new()))
}

async fn api_request(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> Result<(StatusCode, Value), String> {
    let builder = Request::builder().method(method).uri(uri);

    let req = if let Some(payload) = body {
        let bytes =
            serde_json::to_vec(&payload).map_err(|err| format!("serialize request body: {err}"))?;
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .map_err(|err| format!("build request: {err}"))?
    } else {
        builder
            .body(Body::empty())
            .map_err(|err| format!("build request: {err}"))?
    };

    let response = router
        .clone()
        .oneshot(req)
        .await
        .map_err(|err| format!("route request: {err}"))?;
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .map_err(|err| format!("read response body: {err}"))?;

    let parsed = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).map_err(|err| format!("parse response body: {err}"))?
    };
    Ok((status, parsed))
}

fn ids(body: &Value) -> Vec<i64> {
    body["customers"]
        .as_array()
        .map(|customers| customers.iter().filter_map(|c| c["id"].as_i64()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn list_uses_default_window() -> Result<(), String> {
    let router = fixture_router();

    let (status, body) = api_request(&router, Method::GET, "/customers", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![1, 2]);
    assert_eq!(body["meta"], json!({"page": 1, "per_page": 25, "total": 2}));
    assert_eq!(body["customers"][0]["last_updated"], json!(1_625_181_700));
    assert_eq!(body["customers"][0]["events"]["played_song"], json!(5));
    Ok(())
}

#[tokio::test]
async fn list_window_and_invalid_params() -> Result<(), String> {
    let router = fixture_router();

    let (_, body) = api_request(&router, Method::GET, "/customers?page=2&per_page=1", None).await?;
    assert_eq!(ids(&body), vec![2]);
    assert_eq!(body["meta"], json!({"page": 2, "per_page": 1, "total": 2}));

    let (_, body) = api_request(&router, Method::GET, "/customers?page=9&per_page=1", None).await?;
    assert!(ids(&body).is_empty());
    assert_eq!(body["meta"]["page"], json!(1));

    let (status, body) =
        api_request(&router, Method::GET, "/customers?page=abc&per_page=-3", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"], json!({"page": 1, "per_page": 25, "total": 2}));
    Ok(())
}

#[tokio::test]
async fn get_existing_and_missing() -> Result<(), String> {
    let router = fixture_router();

    let (status, body) = api_request(&router, Method::GET, "/customers/2", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["customer"]["attributes"]["tier"], json!("A"));

    let (status, body) = api_request(&router, Method::GET, "/customers/99", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], json!("NOT_FOUND"));
    Ok(())
}

#[tokio::test]
async fn create_validates_and_defaults() -> Result<(), String> {
    let router = fixture_router();

    let (status, body) = api_request(
        &router,
        Method::POST,
        "/customers",
        Some(json!({"customer": {"id": 3, "attributes": {"tier": "S"}}})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("BAD_REQUEST"));

    let (status, body) = api_request(
        &router,
        Method::POST,
        "/customers",
        Some(json!({"customer": {"id": 3, "attributes": {"email": "c3@example.com", "created_at": "7"}}})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let created_at: i64 = body["customer"]["attributes"]["created_at"]
        .as_str()
        .and_then(|v| v.parse().ok())
        .ok_or("created_at missing")?;
    assert!(created_at > 99_999_999);
    assert!(body["customer"]["last_updated"].is_i64());

    let (status, body) = api_request(
        &router,
        Method::POST,
        "/customers",
        Some(json!({"customer": {"id": 4, "attributes": {"email": "c4@example.com", "created_at": "1560000000"}}})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["customer"]["attributes"]["created_at"], json!("1560000000"));

    let (status, body) = api_request(
        &router,
        Method::POST,
        "/customers",
        Some(json!({"customer": {"id": 1, "attributes": {"email": "dup@example.com"}}})),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], json!("CONFLICT"));

    let (_, body) = api_request(&router, Method::GET, "/customers", None).await?;
    assert_eq!(body["meta"]["total"], json!(4));
    Ok(())
}

#[tokio::test]
async fn update_checks_existence_before_email() -> Result<(), String> {
    let router = fixture_router();

    let (status, _) = api_request(
        &router,
        Method::PATCH,
        "/customers/99",
        Some(json!({"customer": {"attributes": {}}})),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = api_request(
        &router,
        Method::PATCH,
        "/customers/1",
        Some(json!({"customer": {"attributes": {"tier": "B"}}})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = api_request(
        &router,
        Method::PATCH,
        "/customers/1",
        Some(json!({"customer": {"attributes": {"email": "new@example.com", "tier": "B"}}})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let attributes = &body["customer"]["attributes"];
    assert_eq!(attributes["email"], json!("new@example.com"));
    assert_eq!(attributes["tier"], json!("B"));
    assert_eq!(attributes["animal"], json!("tiger"));
    assert!(attributes["created_at"].is_string());
    assert_eq!(body["customer"]["events"]["played_song"], json!(5));
    Ok(())
}

#[tokio::test]
async fn update_missing_customer_ignores_malformed_body() -> Result<(), String> {
    let router = fixture_router();
    let patch = |uri: &str| {
        Request::builder()
            .method(Method::PATCH)
            .uri(uri)
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("not json"))
            .map_err(|err| err.to_string())
    };

    let response = router
        .clone()
        .oneshot(patch("/customers/99")?)
        .await
        .map_err(|err| err.to_string())?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = router
        .oneshot(patch("/customers/1")?)
        .await
        .map_err(|err| err.to_string())?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn delete_then_missing() -> Result<(), String> {
    let router = fixture_router();

    let (status, body) = api_request(&router, Method::DELETE, "/customers/1", None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _) = api_request(&router, Method::DELETE, "/customers/1", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = api_request(&router, Method::GET, "/customers", None).await?;
    assert_eq!(ids(&body), vec![2]);
    Ok(())
}

#[tokio::test]
async fn unknown_route_and_method() -> Result<(), String> {
    let router = fixture_router();

    let (status, body) = api_request(&router, Method::GET, "/nope", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], json!("not found: /nope"));

    let (status, _) = api_request(&router, Method::PUT, "/customers/1", None).await?;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    Ok(())
}

#[tokio::test]
async fn request_id_is_generated_and_propagated() -> Result<(), String> {
    let router = fixture_router();

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/customers/1")
                .body(Body::empty())
                .map_err(|err| err.to_string())?,
        )
        .await
        .map_err(|err| err.to_string())?;
    assert!(response.headers().contains_key("x-request-id"));

    let response = router
        .oneshot(
            Request::builder()
                .uri("/customers/1")
                .header("x-request-id", "req-123")
                .body(Body::empty())
                .map_err(|err| err.to_string())?,
        )
        .await
        .map_err(|err| err.to_string())?;
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("req-123")
    );
    Ok(())
}

#[tokio::test]
async fn serves_consolidated_log() -> Result<(), String> {
    let mut file = tempfile::NamedTempFile::new().map_err(|err| err.to_string())?;
    let log = [
        r#"{"id":"a1","type":"attributes","user_id":"7","data":{"email":"old@example.com","tier":"B"},"timestamp":100}"#,
        r#"{"id":"e1","type":"event","name":"played_song","user_id":"7","data":{},"timestamp":101}"#,
        r#"{"id":"e1","type":"event","name":"played_song","user_id":"7","data":{},"timestamp":101}"#,
        r#"{"id":"a2","type":"attributes","user_id":"7","data":{"email":"new@example.com"},"timestamp":200}"#,
        "not json",
        r#"{"id":"e2","type":"event","name":"login","user_id":"8","data":{},"timestamp":50}"#,
        r#"{"id":"e3","type":"event","name":"login","user_id":"bob","data":{},"timestamp":51}"#,
    ];
    writeln!(file, "{}", log.join("\n")).map_err(|err| err.to_string())?;

    let store: RedbCustomerStore = load_store(
        file.path(),
        &IngestConfig::default(),
        CancellationToken::new(),
    )
    .await
    .map_err(|err| err.to_string())?;
    let router = router_with(Arc::new(store));

    let (status, body) = api_request(&router, Method::GET, "/customers", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![7, 8]);

    let (_, body) = api_request(&router, Method::GET, "/customers/7", None).await?;
    let customer = &body["customer"];
    assert_eq!(customer["attributes"]["email"], json!("new@example.com"));
    assert_eq!(customer["attributes"]["tier"], json!("B"));
    assert_eq!(customer["events"]["played_song"], json!(1));
    assert_eq!(customer["last_updated"], json!(200));

    let (_, body) = api_request(&router, Method::GET, "/customers/8", None).await?;
    assert!(body["customer"].get("last_updated").is_none());
    assert_eq!(body["customer"]["events"]["login"], json!(1));
    Ok(())
}

#[tokio::test]
async fn cancelled_startup_serves_nothing() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"{{"id":"e1","type":"event","name":"x","user_id":"1","data":{{}},"timestamp":1}}"#
    )
    .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = load_store(file.path(), &IngestConfig::default(), cancel).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn serve_stops_on_shutdown() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let shutdown = CancellationToken::new();

    let server = tokio::spawn(serve(
        listener,
        Arc::new(FixtureStore::new()),
        Duration::from_secs(1),
        shutdown.clone(),
    ));

    shutdown.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}

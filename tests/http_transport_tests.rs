//! Integration Tests over HTTP
//!
//! Runs the client against a local axum server through a reqwest-backed
//! transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use request_cache::{
    ClientSettings, Config, Method, RequestClient, RequestContext, RequestError, RequestOptions,
    Transport, TransportError, TransportRequest,
};
use serde_json::{json, Value};

// == Mock Server ==

#[derive(Default)]
struct ServerState {
    rate_reads: AtomicUsize,
    flaky_hits: AtomicUsize,
    missing_hits: AtomicUsize,
    rate: Mutex<f64>,
}

async fn all_rates(State(state): State<Arc<ServerState>>) -> Json<Value> {
    state.rate_reads.fetch_add(1, Ordering::SeqCst);
    let rate = *state.rate.lock().unwrap();
    Json(json!({ "USD": 1.0, "EUR": rate }))
}

async fn set_rate(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    match body["EUR"].as_f64() {
        Some(rate) => {
            *state.rate.lock().unwrap() = rate;
            (StatusCode::OK, Json(json!({ "updated": true })))
        }
        None => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "EUR rate required" })),
        ),
    }
}

async fn flaky(State(state): State<Arc<ServerState>>) -> (StatusCode, Json<Value>) {
    if state.flaky_hits.fetch_add(1, Ordering::SeqCst) < 2 {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "warming up" })),
        )
    } else {
        (StatusCode::OK, Json(json!({ "status": "ready" })))
    }
}

async fn missing(State(state): State<Arc<ServerState>>) -> (StatusCode, Json<Value>) {
    state.missing_hits.fetch_add(1, Ordering::SeqCst);
    (StatusCode::NOT_FOUND, Json(json!({ "error": "no such rate" })))
}

async fn spawn_server() -> Result<(String, Arc<ServerState>)> {
    let state = Arc::new(ServerState {
        rate: Mutex::new(0.9),
        ..ServerState::default()
    });
    let app = Router::new()
        .route("/rates/all", get(all_rates))
        .route("/rates/set_rate", post(set_rate))
        .route("/flaky", get(flaky))
        .route("/missing", get(missing))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{}", addr), state))
}

// == Reqwest Transport ==

struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, request: &TransportRequest) -> std::result::Result<Value, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };
        let query: Vec<(&str, String)> = request
            .params
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => (k.as_str(), s.clone()),
                other => (k.as_str(), other.to_string()),
            })
            .collect();

        let mut builder = self
            .http
            .request(method, format!("{}{}", self.base_url, request.path))
            .query(&query);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::network(e.to_string()))?;
        let status = response.status();
        let data = response.json::<Value>().await.unwrap_or(Value::Null);

        if status.is_success() {
            Ok(data)
        } else {
            Err(TransportError::status(status.as_u16(), data))
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn http_client(base_url: String) -> RequestClient {
    let config = Config {
        client: ClientSettings {
            retry_delay_ms: 20,
            ..ClientSettings::default()
        },
        ..Config::default()
    };
    let context = RequestContext::init(&config).expect("default config is valid");
    context.client(Arc::new(HttpTransport {
        http: reqwest::Client::new(),
        base_url,
    }))
}

// == Tests ==

#[tokio::test]
async fn test_cached_reads_hit_server_once() -> Result<()> {
    init_tracing();
    let (base_url, state) = spawn_server().await?;
    let client = http_client(base_url);

    let first = client.get("/rates/all", RequestOptions::new()).await?;
    let second = client.get("/rates/all", RequestOptions::new()).await?;

    assert_eq!(first, second);
    assert_eq!(first["EUR"], 0.9);
    assert_eq!(state.rate_reads.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_short_ttl_refetches() -> Result<()> {
    init_tracing();
    let (base_url, state) = spawn_server().await?;
    let client = http_client(base_url);
    let opts = RequestOptions::new().cache_ttl(Duration::from_millis(100));

    client.get("/rates/all", opts.clone()).await?;
    tokio::time::sleep(Duration::from_millis(150)).await;
    client.get("/rates/all", opts).await?;

    assert_eq!(state.rate_reads.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn test_write_makes_reads_fresh() -> Result<()> {
    init_tracing();
    let (base_url, state) = spawn_server().await?;
    let client = http_client(base_url);

    client.get("/rates/all", RequestOptions::new()).await?;
    client
        .post(
            "/rates/set_rate",
            json!({ "EUR": 0.95 }),
            RequestOptions::new().also_invalidate("/rates/all"),
        )
        .await?;
    let fresh = client.get("/rates/all", RequestOptions::new()).await?;

    assert_eq!(fresh["EUR"], 0.95);
    assert_eq!(state.rate_reads.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn test_rejected_write_keeps_cache() -> Result<()> {
    init_tracing();
    let (base_url, state) = spawn_server().await?;
    let client = http_client(base_url);

    client.get("/rates/all", RequestOptions::new()).await?;
    let err = client
        .post(
            "/rates/set_rate",
            json!({ "GBP": 0.8 }),
            RequestOptions::new().also_invalidate("/rates/all"),
        )
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(422));
    assert_eq!(err.to_string(), "Client error 422: EUR rate required");
    client.get("/rates/all", RequestOptions::new()).await?;
    assert_eq!(state.rate_reads.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_service_unavailable_is_retried() -> Result<()> {
    init_tracing();
    let (base_url, state) = spawn_server().await?;
    let client = http_client(base_url);

    let value = client.get("/flaky", RequestOptions::new()).await?;

    assert_eq!(value["status"], "ready");
    assert_eq!(state.flaky_hits.load(Ordering::SeqCst), 3);
    Ok(())
}

#[tokio::test]
async fn test_not_found_is_not_retried() -> Result<()> {
    init_tracing();
    let (base_url, state) = spawn_server().await?;
    let client = http_client(base_url);

    let err = client
        .get("/missing", RequestOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, RequestError::Client { status: 404, .. }));
    assert_eq!(state.missing_hits.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_unreachable_server_exhausts_retries() -> Result<()> {
    init_tracing();
    // Bind then drop to get a port with nothing listening
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let client = http_client(format!("http://{}", addr));
    let err = client
        .get("/rates/all", RequestOptions::new())
        .await
        .unwrap_err();

    match err {
        RequestError::ExhaustedRetries { attempts, last } => {
            assert_eq!(attempts, 4);
            assert_eq!(last.status(), None);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    Ok(())
}

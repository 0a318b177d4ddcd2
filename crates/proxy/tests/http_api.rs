//! The client-facing API, end to end and per handler

use std::sync::Arc;

use axum::body::Body;
use base64::Engine;
use http::{Request, StatusCode};
use tempfile::TempDir;
use tower::ServiceExt;
use url::Url;

use cachefs_proxy::http_server::api::v0::fd::{
    CloseRequest, LseekRequest, OpenRequest, ReadRequest, WriteRequest,
};
use cachefs_proxy::http_server::api::v0::{
    CacheStatsRequest, ClientDoneRequest, ErrorBody, UnlinkRequest,
};
use cachefs_proxy::{http_server, Cache, LseekOption, OpenOption, ProxyConfig, ServiceState};
use common::api::ApiClient;
use server::{MasterStore, RunningService, ServiceConfig};

struct Stack {
    server: RunningService,
    proxy: cachefs_proxy::RunningProxy,
    client: ApiClient,
    _root: TempDir,
    _cache_dir: TempDir,
}

async fn stack() -> Stack {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("cachefs_proxy=debug")
        .with_test_writer()
        .try_init();

    let root = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();

    let server =
        server::spawn_service(&ServiceConfig::new(root.path(), "127.0.0.1:0".parse().unwrap()))
            .await
            .unwrap();

    let config = ProxyConfig {
        server_url: Url::parse(&format!("http://{}", server.addr)).unwrap(),
        cache_dir: cache_dir.path().to_path_buf(),
        cache_capacity: 1 << 20,
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        ..ProxyConfig::default()
    };
    let proxy = cachefs_proxy::spawn_service(&config).await.unwrap();
    let client = ApiClient::new(&Url::parse(&format!("http://{}", proxy.addr)).unwrap()).unwrap();

    Stack {
        server,
        proxy,
        client,
        _root: root,
        _cache_dir: cache_dir,
    }
}

fn decode(data: &str) -> Vec<u8> {
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .unwrap()
}

#[tokio::test]
async fn test_write_then_read_through_proxy() {
    let s = stack().await;

    let fd = s
        .client
        .call(OpenRequest {
            path: "hello.txt".to_string(),
            option: OpenOption::CreateExclusive,
            client: None,
        })
        .await
        .unwrap()
        .fd;
    let written = s
        .client
        .call(WriteRequest::new(fd, b"hi there"))
        .await
        .unwrap();
    assert_eq!(written.written, 8);
    assert!(s.client.call(CloseRequest { fd }).await.unwrap().closed);

    let fd = s
        .client
        .call(OpenRequest {
            path: "/hello.txt".to_string(),
            option: OpenOption::Read,
            client: None,
        })
        .await
        .unwrap()
        .fd;
    let position = s
        .client
        .call(LseekRequest {
            fd,
            pos: 5,
            whence: LseekOption::FromEnd,
        })
        .await
        .unwrap()
        .position;
    assert_eq!(position, 3);
    let read = s.client.call(ReadRequest { fd, len: 100 }).await.unwrap();
    assert_eq!(read.len, 5);
    assert_eq!(decode(&read.data), b"there");
    let eof = s.client.call(ReadRequest { fd, len: 100 }).await.unwrap();
    assert_eq!(eof.len, 0);
    s.client.call(CloseRequest { fd }).await.unwrap();

    let stats = s.client.call(CacheStatsRequest {}).await.unwrap();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.current_size, 8);
    assert_eq!(stats.pinned, 0);

    s.proxy.shutdown.shutdown();
    s.server.shutdown.shutdown();
}

#[tokio::test]
async fn test_errors_carry_errno() {
    let s = stack().await;

    let err = s
        .client
        .call(OpenRequest {
            path: "missing.txt".to_string(),
            option: OpenOption::Read,
            client: None,
        })
        .await
        .unwrap_err();
    let body = ErrorBody::from_api_error(&err).unwrap();
    assert_eq!(body.errno, -2);

    let err = s.client.call(ReadRequest { fd: 99, len: 1 }).await.unwrap_err();
    assert_eq!(ErrorBody::from_api_error(&err).unwrap().errno, -9);

    let err = s
        .client
        .call(UnlinkRequest {
            path: "../outside".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(ErrorBody::from_api_error(&err).unwrap().errno, -1);

    s.proxy.shutdown.shutdown();
    s.server.shutdown.shutdown();
}

#[tokio::test]
async fn test_unlink_and_client_done() {
    let s = stack().await;

    let fd = s
        .client
        .call(OpenRequest {
            path: "tmp.txt".to_string(),
            option: OpenOption::Create,
            client: Some("worker-1".to_string()),
        })
        .await
        .unwrap()
        .fd;
    s.client.call(WriteRequest::new(fd, b"scratch")).await.unwrap();

    let done = s
        .client
        .call(ClientDoneRequest {
            client: "worker-1".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(done.closed, 1);
    assert!(s.proxy.state.proxy().handles().is_empty());

    let removed = s
        .client
        .call(UnlinkRequest {
            path: "tmp.txt".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(removed.path, "tmp.txt");

    let stats = s.client.call(CacheStatsRequest {}).await.unwrap();
    assert_eq!(stats.entries, 0);

    s.proxy.shutdown.shutdown();
    s.server.shutdown.shutdown();
}

#[tokio::test]
async fn test_open_handler_reports_missing_file() {
    let root = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let store = Arc::new(MasterStore::open(root.path()).await.unwrap());
    let cache = Arc::new(Cache::open(cache_dir.path(), 1024).await.unwrap());
    let state = ServiceState::new(store, cache, 1024);

    let request = Request::builder()
        .method("POST")
        .uri("/api/v0/fd/open")
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"path":"nope","option":"read"}"#))
        .unwrap();
    let response = http_server::router(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let error: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.errno, -2);
    assert!(error.message.contains("nope"));
}

#[tokio::test]
async fn test_livez() {
    let root = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let store = Arc::new(MasterStore::open(root.path()).await.unwrap());
    let cache = Arc::new(Cache::open(cache_dir.path(), 1024).await.unwrap());
    let state = ServiceState::new(store, cache, 1024);

    let request = Request::builder()
        .uri("/_status/livez")
        .body(Body::empty())
        .unwrap();
    let response = http_server::router(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

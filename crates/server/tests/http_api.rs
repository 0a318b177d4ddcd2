//! End-to-end tests for the file API through `RemoteClient`

use bytes::Bytes;
use tempfile::TempDir;
use url::Url;

use cachefs_server::{spawn_service, RemoteClient, RunningService, ServiceConfig};
use common::api::ApiClient;
use common::remote::{RemoteError, RemoteStatus, RemoteStore, CHUNK_SIZE};

async fn setup() -> (RunningService, RemoteClient, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = ServiceConfig::new(temp_dir.path(), "127.0.0.1:0".parse().unwrap());
    let service = spawn_service(&config).await.unwrap();

    let url = Url::parse(&format!("http://{}", service.addr)).unwrap();
    let client = RemoteClient::new(&url).unwrap();
    (service, client, temp_dir)
}

#[tokio::test]
async fn test_create_upload_fetch() {
    let (service, client, _dir) = setup().await;

    let info = client.get_file_info("notes.txt").await.unwrap();
    assert!(info.path_valid);
    assert!(!info.exists);

    assert_eq!(
        client.create_file("notes.txt").await.unwrap(),
        RemoteStatus::Ok
    );
    let created = client.get_file_info("notes.txt").await.unwrap();
    assert!(created.exists);
    assert_eq!(created.size, 0);

    let version = client
        .upload_file("notes.txt", Bytes::from_static(b"hello world"))
        .await
        .unwrap();
    assert_eq!(version, created.version + 1);

    let data = client.get_file("notes.txt").await.unwrap();
    assert_eq!(data.as_ref(), b"hello world");

    let info = client.get_file_info("notes.txt").await.unwrap();
    assert_eq!(info.version, version);
    assert_eq!(info.size, 11);

    service.shutdown.shutdown();
}

#[tokio::test]
async fn test_chunked_transfer() {
    let (service, client, _dir) = setup().await;

    let data: Vec<u8> = (0..(CHUNK_SIZE as usize + 1000))
        .map(|i| (i % 199) as u8)
        .collect();
    let first = Bytes::copy_from_slice(&data[..CHUNK_SIZE as usize]);
    let rest = Bytes::copy_from_slice(&data[CHUNK_SIZE as usize..]);

    assert_eq!(
        client
            .upload_file_chunk("big.bin", first, 0, false)
            .await
            .unwrap(),
        None
    );
    let version = client
        .upload_file_chunk("big.bin", rest, CHUNK_SIZE, true)
        .await
        .unwrap();
    assert!(version.is_some());

    let head = client.get_file_chunk("big.bin", 0).await.unwrap();
    let tail = client.get_file_chunk("big.bin", CHUNK_SIZE).await.unwrap();
    assert_eq!(head.len(), CHUNK_SIZE as usize);
    assert_eq!(tail.len(), 1000);
    assert_eq!([head.as_ref(), tail.as_ref()].concat(), data);

    service.shutdown.shutdown();
}

#[tokio::test]
async fn test_delete_statuses() {
    let (service, client, _dir) = setup().await;

    assert_eq!(
        client.delete_file("ghost.txt").await.unwrap(),
        RemoteStatus::NotFound
    );
    client.create_file("real.txt").await.unwrap();
    assert_eq!(
        client.delete_file("real.txt").await.unwrap(),
        RemoteStatus::Ok
    );

    service.shutdown.shutdown();
}

#[tokio::test]
async fn test_errors_surface_as_server_errors() {
    let (service, client, dir) = setup().await;
    std::fs::create_dir(dir.path().join("sub")).unwrap();

    assert!(matches!(
        client.get_file("missing.txt").await,
        Err(RemoteError::Server(_))
    ));
    assert!(matches!(
        client.get_file("sub").await,
        Err(RemoteError::Server(_))
    ));

    let info = client.get_file_info("../outside").await.unwrap();
    assert!(!info.path_valid);

    service.shutdown.shutdown();
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    // Bind then drop a listener so the port is very likely closed
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = RemoteClient::new(&Url::parse(&format!("http://{}", addr)).unwrap()).unwrap();
    assert!(matches!(
        client.get_file_info("x").await,
        Err(RemoteError::Transport(_))
    ));
}

#[tokio::test]
async fn test_health_endpoints() {
    use cachefs_server::http_server::health::liveness::LivezRequest;
    use cachefs_server::http_server::health::version::VersionRequest;

    let (service, _client, _dir) = setup().await;
    let api = ApiClient::new(&Url::parse(&format!("http://{}", service.addr)).unwrap()).unwrap();

    let livez = api.call(LivezRequest {}).await.unwrap();
    assert_eq!(livez.status, "ok");
    let version = api.call(VersionRequest {}).await.unwrap();
    assert_eq!(version.name, "cachefs-server");

    service.shutdown.shutdown();
}

//! Plain HTTP endpoints of the relay, exercised over a real socket.

use std::sync::Arc;

use lobby::server::{AppState, router};
use lobby::{LobbyConfig, Metrics, Registry};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn spawn_server() -> (String, Arc<Registry>) {
    let registry = Registry::new(&LobbyConfig::default(), Arc::new(Metrics::new()));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let app = router(AppState {
        registry: Arc::clone(&registry),
    });
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, registry)
}

async fn get(addr: &str, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn test_health_endpoint() {
    let (addr, _registry) = spawn_server().await;
    let response = get(&addr, "/health").await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.ends_with("ok"), "{response}");
}

#[tokio::test]
async fn test_metrics_endpoint_reports_connections() {
    let (addr, registry) = spawn_server().await;
    let (_peer, _rx) = registry.connect().await;

    let response = get(&addr, "/metrics").await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    let body = response.split("\r\n\r\n").nth(1).unwrap();
    let json: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(json["connections"], 1);
    assert_eq!(json["activeConnections"], 1);
    assert_eq!(json["movesRelayed"], 0);
}

#[tokio::test]
async fn test_plain_get_on_ws_route_is_refused() {
    let (addr, _registry) = spawn_server().await;
    let response = get(&addr, "/ws").await;
    assert!(!response.starts_with("HTTP/1.1 200"), "{response}");
}

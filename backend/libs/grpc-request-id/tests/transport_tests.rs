//! Transport Tests
//!
//! Real tonic server and client over loopback TCP, exercising the standard
//! health service: `Check` is unary, `Watch` is server streaming.

use grpc_request_id::RequestIdLayer;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Channel, Server};
use tonic::Request;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;

async fn start_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (_reporter, health_service) = tonic_health::server::health_reporter();

    tokio::spawn(async move {
        Server::builder()
            .layer(RequestIdLayer::new())
            .add_service(health_service)
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    addr
}

async fn client(addr: SocketAddr) -> HealthClient<Channel> {
    let channel = Channel::from_shared(format!("http://{addr}"))
        .unwrap()
        .connect()
        .await
        .unwrap();
    HealthClient::new(channel)
}

fn check_request(request_id: Option<&'static str>) -> Request<HealthCheckRequest> {
    let mut request = Request::new(HealthCheckRequest {
        service: String::new(),
    });
    if let Some(id) = request_id {
        request
            .metadata_mut()
            .insert("x-request-id", id.parse().unwrap());
    }
    request
}

#[tokio::test]
async fn test_unary_call_returns_caller_id() {
    let mut client = client(start_server().await).await;

    let response = client.check(check_request(Some("unary-42"))).await.unwrap();
    let response_id = response.metadata().get("x-response-id").unwrap();
    assert_eq!(response_id.to_str().unwrap(), "unary-42");
}

#[tokio::test]
async fn test_unary_call_without_id_gets_generated_one() {
    let mut client = client(start_server().await).await;

    let response = client.check(check_request(None)).await.unwrap();
    let response_id = response.metadata().get("x-response-id").unwrap();
    assert!(uuid::Uuid::parse_str(response_id.to_str().unwrap()).is_ok());
}

#[tokio::test]
async fn test_streaming_call_returns_id_before_messages() {
    let mut client = client(start_server().await).await;

    let response = client.watch(check_request(Some("watch-7"))).await.unwrap();
    let response_id = response.metadata().get("x-response-id").unwrap();
    assert_eq!(response_id.to_str().unwrap(), "watch-7");

    let mut stream = response.into_inner();
    let first = stream.message().await.unwrap();
    assert!(first.is_some());
}

//! End-to-end HTTP tests: real listener, real hyper client.

use bytes::Bytes;
use epinet_service::{
    ErrorPayload, InitializeResponse, OsSeedContext, ServiceConfig, SessionId, SessionRegistry,
    StepResponse,
};
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1::SendRequest;
use hyper::{Request, StatusCode};
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

async fn start_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let registry = Arc::new(SessionRegistry::new(OsSeedContext::new(), &ServiceConfig::default()));
    tokio::spawn(epinet_service::serve(listener, registry));
    addr
}

async fn connect(addr: &str) -> SendRequest<Full<Bytes>> {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .unwrap();
    tokio::spawn(async move {
        let _ = conn.await;
    });
    sender
}

async fn post(
    sender: &mut SendRequest<Full<Bytes>>,
    addr: &str,
    path: &str,
    session: Option<&str>,
    body: &str,
) -> (StatusCode, Bytes) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header("host", addr)
        .header("content-type", "application/json");
    if let Some(id) = session {
        builder = builder.header("x-session-id", id);
    }
    let req = builder.body(Full::new(Bytes::from(body.to_string()))).unwrap();

    let res = sender.send_request(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    (status, bytes)
}

#[tokio::test]
async fn test_step_before_initialize_is_conflict() {
    let addr = start_server().await;
    let mut sender = connect(&addr).await;

    let (status, body) = post(&mut sender, &addr, "/api/step", None, "{}").await;
    assert_eq!(status, StatusCode::CONFLICT);
    let error: ErrorPayload = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error, "Simulation not initialized");
}

#[tokio::test]
async fn test_initialize_and_step_default_session() {
    let addr = start_server().await;
    let mut sender = connect(&addr).await;

    let (status, body) = post(
        &mut sender,
        &addr,
        "/api/initialize",
        None,
        r#"{"num_nodes": 100, "initial_infected": 5, "edge_probability": 0.005}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let init: InitializeResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(init.session_id, SessionId::DEFAULT);
    assert_eq!(init.state.time, 0);
    assert_eq!(init.state.infected.len(), 5);
    assert_eq!(init.state.susceptible.len(), 95);
    assert_eq!(init.network.nodes.len(), 100);

    let (status, body) = post(
        &mut sender,
        &addr,
        "/api/step",
        None,
        r#"{"infection_rate": 1.0, "recovery_rate": 0.1}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let step: StepResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(step.state.time, 1);
    assert_eq!(step.state.network_metrics, init.state.network_metrics);
}

#[tokio::test]
async fn test_validation_errors_are_bad_request() {
    let addr = start_server().await;
    let mut sender = connect(&addr).await;

    let too_small = r#"{"num_nodes": 20}"#;
    let (status, body) = post(&mut sender, &addr, "/api/initialize", None, too_small).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorPayload = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error, "Number of nodes must be between 100 and 5000");

    let (status, _) = post(&mut sender, &addr, "/api/initialize", None, "{oops").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(&mut sender, &addr, "/api/step", Some("not-a-uuid"), "{}").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_named_sessions_are_isolated() {
    let addr = start_server().await;
    let mut sender = connect(&addr).await;
    let session = SessionId::new().to_string();

    let (status, body) = post(&mut sender, &addr, "/api/initialize", Some(&session), "").await;
    assert_eq!(status, StatusCode::OK);
    let init: InitializeResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(init.session_id.to_string(), session);
    assert_eq!(init.network.nodes.len(), 1000);

    // The default session was never initialized
    let (status, _) = post(&mut sender, &addr, "/api/step", None, "{}").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = post(&mut sender, &addr, "/api/step", Some(&session), "{}").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route_and_method() {
    let addr = start_server().await;
    let mut sender = connect(&addr).await;

    let (status, _) = post(&mut sender, &addr, "/api/nope", None, "{}").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let mut sender = connect(&addr).await;
    let req = Request::builder()
        .uri("/api/step")
        .header("host", addr.as_str())
        .body(Full::new(Bytes::new()))
        .unwrap();
    let res = sender.send_request(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
}

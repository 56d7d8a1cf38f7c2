//! HTTP/1.1 surface for the session registry.
//!
//! Routes:
//! - `POST /api/initialize` → generate a network and seed the epidemic
//! - `POST /api/step` → advance one step
//!
//! An optional `x-session-id` header selects the session; without it every
//! request goes to the default session.

use crate::context::SeedContext;
use crate::error::ServiceError;
use crate::registry::SessionRegistry;
use crate::types::{ErrorPayload, SessionId};
use crate::validation::parse_body;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Header naming the target session.
pub const SESSION_HEADER: &str = "x-session-id";

/// Largest request body accepted, in bytes.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Accepts connections forever, serving each on its own task.
pub async fn serve<C: SeedContext>(
    listener: TcpListener,
    registry: Arc<SessionRegistry<C>>,
) -> std::io::Result<()> {
    info!("EpiNet service listening on {}", listener.local_addr()?);

    loop {
        let (stream, peer) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let registry = Arc::clone(&registry);

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let registry = Arc::clone(&registry);
                async move { Ok::<_, Infallible>(handle_request(registry, req).await) }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("connection from {} closed with error: {}", peer, e);
            }
        });
    }
}

/// Routes one request and renders the result as JSON.
pub async fn handle_request<C: SeedContext>(
    registry: Arc<SessionRegistry<C>>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();
    let path = parts.uri.path().to_string();

    let declared = parts
        .headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|len| len > MAX_BODY_BYTES as u64) {
        let err = ServiceError::PayloadTooLarge {
            limit: MAX_BODY_BYTES,
        };
        return service_error_response(&path, err);
    }

    // Read the (bounded) body up front so the connection stays reusable on early errors.
    let bytes = match read_body(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => return service_error_response(&path, e),
    };

    let route = match path.as_str() {
        "/api/initialize" => Route::Initialize,
        "/api/step" => Route::Step,
        _ => return error_response(StatusCode::NOT_FOUND, "Not Found"),
    };
    if parts.method != Method::POST {
        return error_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    }

    let session = match session_from_headers(&parts.headers) {
        Ok(id) => id,
        Err(e) => return service_error_response(&path, e),
    };

    // Graph generation and metrics are CPU-bound; keep them off the reactor.
    let outcome = tokio::task::spawn_blocking(move || {
        let value = parse_body(&bytes)?;
        match route {
            Route::Initialize => registry.initialize_json(session, &value).and_then(to_json),
            Route::Step => registry.step_json(session, &value).and_then(to_json),
        }
    })
    .await
    .map_err(ServiceError::internal)
    .and_then(|result| result);

    match outcome {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(e) => service_error_response(&path, e),
    }
}

/// Collects at most `limit` bytes of a request body.
pub async fn read_body<B>(body: B, limit: usize) -> Result<Bytes, ServiceError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(ServiceError::PayloadTooLarge { limit }),
        Err(e) => Err(ServiceError::validation(format!("Unreadable body: {e}"))),
    }
}

#[derive(Debug, Clone, Copy)]
enum Route {
    Initialize,
    Step,
}

fn session_from_headers(headers: &hyper::HeaderMap) -> Result<SessionId, ServiceError> {
    match headers.get(SESSION_HEADER) {
        None => Ok(SessionId::DEFAULT),
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ServiceError::validation(format!("{SESSION_HEADER} must be a UUID"))),
    }
}

fn to_json<T: Serialize>(value: T) -> Result<Vec<u8>, ServiceError> {
    serde_json::to_vec(&value).map_err(ServiceError::internal)
}

fn service_error_response(path: &str, err: ServiceError) -> Response<Full<Bytes>> {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if err.is_client_error() {
        warn!("Error in {}: {}", path, err);
    } else {
        error!("Error in {}: {}", path, err);
    }
    error_response(status, &err.to_string())
}

fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let payload = ErrorPayload {
        error: message.to_string(),
    };
    // ErrorPayload holds a single string, so serialization cannot fail.
    let body = serde_json::to_vec(&payload).unwrap_or_default();
    json_response(status, body)
}

fn json_response(status: StatusCode, body: Vec<u8>) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::from(body)));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    resp
}

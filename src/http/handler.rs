//! Main axum router and HTTP request handlers for the gateway.
//!
//! Routes:
//! - `GET /init/{host}`              - one-time commissioning handshake
//! - `GET /explore/{host}/<path...>` - decrypted response as browsable HTML
//! - `GET /{host}/<path...>`         - decrypted response as raw JSON
//! - `GET /favicon.ico`              - empty 200, no forwarding
//! - `GET /healthz`                  - health check
//! - `GET /metrics`                  - Prometheus metrics
//!
//! The generic proxy route is the router *fallback* and parses `uri.path()`
//! by hand: the device path is covered verbatim by the request signature, so
//! trailing slashes and empty segments must survive routing untouched.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{error, instrument, warn};

use crate::appliance::{self, ApplianceResponse};
use crate::error::GatewayError;
use crate::http::explore;
use crate::metrics::{Route, RouteLabels};
use crate::protocol::decryptor;
use crate::AppState;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the axum [`Router`] with all HTTP routes and shared state.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/favicon.ico", get(handle_favicon))
        .route("/healthz", get(crate::health::health_handler))
        .route("/metrics", get(handle_metrics))
        .route("/init/{host}", get(handle_init))
        .route("/explore/{*rest}", get(handle_explore))
        .fallback(handle_forward)
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Host / path parsing
// ---------------------------------------------------------------------------

/// Reject anything that is not a syntactically valid IPv4 dotted-quad.
/// Hostnames are deliberately unsupported on the appliance side.
fn validate_host(host: &str) -> Result<(), GatewayError> {
    if host.parse::<Ipv4Addr>().is_err() {
        return Err(GatewayError::InvalidHost(format!(
            "invalid host format provided: '{host}'"
        )));
    }
    Ok(())
}

/// Split an inbound request path into (appliance host, device path).
///
/// The device path keeps its leading slash and any trailing slash exactly as
/// received; `/<host>` and `/<host>/` both map to the device root `/`.
fn split_target(raw_path: &str) -> Result<(String, String), GatewayError> {
    let trimmed = raw_path.strip_prefix('/').unwrap_or(raw_path);
    let (host, device_path) = match trimmed.split_once('/') {
        Some((host, rest)) => (host, format!("/{rest}")),
        None => (trimmed, String::from("/")),
    };

    if host.is_empty() {
        return Err(GatewayError::InvalidHost(
            "missing host in request path; use /<host>/<device_path>".to_string(),
        ));
    }
    validate_host(host)?;

    Ok((host.to_string(), device_path))
}

// ---------------------------------------------------------------------------
// Shared forwarding helpers
// ---------------------------------------------------------------------------

/// One outbound round trip, with metrics and context logging around it.
async fn forward(
    state: &AppState,
    route: Route,
    host: &str,
    path: &str,
) -> Result<ApplianceResponse, GatewayError> {
    let metrics = &state.metrics.metrics;
    metrics
        .requests_total
        .get_or_create(&RouteLabels { route })
        .inc();

    let start = Instant::now();
    let result = match route {
        Route::Init => appliance::commission(state, host).await,
        Route::Raw | Route::Explore => appliance::fetch_resource(state, host, path).await,
    };
    metrics
        .appliance_round_trip_seconds
        .get_or_create(&RouteLabels { route })
        .observe(start.elapsed().as_secs_f64());

    if let Err(err) = &result {
        match err {
            GatewayError::Unavailable { source } => {
                metrics.appliance_unavailable_total.inc();
                warn!(%host, %path, error = %source, "appliance unavailable");
            }
            GatewayError::Rejected { status, .. } => {
                metrics.appliance_rejections_total.inc();
                warn!(%host, %path, %status, "appliance rejected forwarded request");
            }
            _ => {}
        }
    }

    result
}

fn decrypt_body(
    state: &AppState,
    host: &str,
    path: &str,
    response: &ApplianceResponse,
) -> Result<Vec<u8>, GatewayError> {
    decryptor::decrypt(
        &response.body,
        state.credentials.group_key(),
        response.signature_header.as_deref(),
    )
    .map_err(|err| {
        state.metrics.metrics.decrypt_failures_total.inc();
        error!(%host, %path, error = %err, "failed to decrypt appliance response");
        GatewayError::Decryption(err)
    })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Browsers ask for this on every visit; answer locally, never forward.
async fn handle_favicon() -> impl IntoResponse {
    StatusCode::OK
}

/// `GET /metrics`
///
/// Returns Prometheus metrics collected by the gateway.
async fn handle_metrics(State(state): State<Arc<AppState>>) -> Result<Response, GatewayError> {
    let mut buf = String::new();
    prometheus_client::encoding::text::encode(&mut buf, &state.metrics.registry)
        .map_err(|e| GatewayError::Internal(anyhow::anyhow!("metrics encoding failed: {e}")))?;

    Ok((
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        buf,
    )
        .into_response())
}

/// `GET /init/{host}`
///
/// One-time commissioning: registers the gateway's group id/key pair with
/// the appliance via an unsigned PUT.  The appliance's JSON answer is passed
/// through unchanged.
#[instrument(skip(state), fields(%host))]
async fn handle_init(
    State(state): State<Arc<AppState>>,
    Path(host): Path<String>,
) -> Result<Response, GatewayError> {
    validate_host(&host)?;

    let response = forward(&state, Route::Init, &host, "/Security/Commissioning/").await?;

    Ok((
        response.status,
        [(header::CONTENT_TYPE, "application/json")],
        response.body,
    )
        .into_response())
}

/// `GET /explore/{host}/<path...>`
///
/// Signed GET, decrypted, rendered as an HTML page with every `href` field
/// rewritten into a clickable link back through this route.
#[instrument(skip_all)]
async fn handle_explore(
    State(state): State<Arc<AppState>>,
    uri: Uri,
) -> Result<Response, GatewayError> {
    let rest = uri.path().strip_prefix("/explore").unwrap_or(uri.path());
    let (host, path) = split_target(rest)?;

    let response = forward(&state, Route::Explore, &host, &path).await?;

    if response.status == StatusCode::NO_CONTENT || response.body.is_empty() {
        let html = explore::render_empty_page(&host, &path, response.status.as_u16());
        return Ok((response.status, Html(html)).into_response());
    }

    let plaintext = decrypt_body(&state, &host, &path, &response)?;
    let text = String::from_utf8_lossy(&plaintext);

    let html = match serde_json::from_str::<Value>(&text) {
        Ok(mut value) => {
            let links = explore::rewrite_hrefs(&mut value, &host, &path);
            explore::render_explore_page(&host, &path, &value, &links)
        }
        Err(err) => {
            warn!(%host, %path, error = %err, "decrypted payload is not valid JSON");
            explore::render_non_json_page(&host, &path, &text)
        }
    };

    Ok(Html(html).into_response())
}

/// Fallback route: `GET /{host}/<path...>`
///
/// Signed GET, decrypted, returned as raw JSON.  Registered as the fallback
/// rather than a path-captured route so the device path reaches the signer
/// byte-for-byte as received.
#[instrument(skip_all)]
async fn handle_forward(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
) -> Result<Response, GatewayError> {
    if method != Method::GET {
        return Ok((
            StatusCode::METHOD_NOT_ALLOWED,
            Json(serde_json::json!({ "error": "only GET is supported" })),
        )
            .into_response());
    }

    let (host, path) = split_target(uri.path())?;

    let response = forward(&state, Route::Raw, &host, &path).await?;

    if response.status == StatusCode::NO_CONTENT || response.body.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let plaintext = decrypt_body(&state, &host, &path, &response)?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        plaintext,
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Panic containment
// ---------------------------------------------------------------------------

/// A panicking handler must not take the process down; the single request
/// fails with a JSON 500 and everything else keeps serving.
fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = %detail, "request handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": "Internal Server Error occurred" })),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_ipv4_hosts() {
        for host in ["192.168.1.50", "127.0.0.1", "0.0.0.0", "255.255.255.255"] {
            assert!(validate_host(host).is_ok(), "{host} should be accepted");
        }
    }

    #[test]
    fn rejects_everything_else() {
        for host in ["256.1.1.1", "homeassistant.local", "192.168.1", "", "a/b"] {
            assert!(validate_host(host).is_err(), "{host:?} should be rejected");
        }
    }

    #[test]
    fn splits_host_and_device_path() {
        let (host, path) = split_target("/192.168.1.50/Devices/000123/State").unwrap();
        assert_eq!(host, "192.168.1.50");
        assert_eq!(path, "/Devices/000123/State");
    }

    #[test]
    fn bare_host_maps_to_device_root() {
        assert_eq!(split_target("/192.168.1.50").unwrap().1, "/");
        assert_eq!(split_target("/192.168.1.50/").unwrap().1, "/");
    }

    #[test]
    fn trailing_slash_is_preserved() {
        let (_, path) = split_target("/192.168.1.50/Devices/").unwrap();
        assert_eq!(path, "/Devices/");
    }

    #[test]
    fn empty_and_invalid_paths_are_client_errors() {
        for raw in ["/", "", "/256.1.1.1/x", "/homeassistant.local/x"] {
            let err = split_target(raw).unwrap_err();
            assert!(matches!(err, GatewayError::InvalidHost(_)), "{raw:?}");
        }
    }
}

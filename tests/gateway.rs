//! End-to-end tests: the real router forwarding to a mock appliance.
//!
//! The mock serves ciphertext produced under the fixture group key
//! (AES-256-CBC, PKCS#7, final zero byte stripped the way the appliance
//! firmware does), so these tests exercise signing, forwarding, error
//! classification and decryption through the public HTTP surface.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use mielegw::config::Config;
use mielegw::http::handler::create_router;
use mielegw::protocol::Credentials;
use mielegw::AppState;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// 64-byte group key 00 01 .. 3f; the appliance encrypts under its first half.
const GROUP_KEY_HEX: &str =
    "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f\
     202122232425262728292a2b2c2d2e2f303132333435363738393a3b3c3d3e3f";

const GROUP_ID_HEX: &str = "0001020304050607";

/// `X-Signature` response header; the IV is the first half of the decoded
/// second field.
const SIGNATURE_HEADER: &str =
    "MieleH256 0000:404142434445464748494A4B4C4D4E4F505152535455565758595A5B5C5D5E5F";

const PLAINTEXT: &str =
    r#"{"Devices":{"href":"/Devices"},"Ident":{"DeviceName":"Dishwasher"},"Nonce":"567"}"#;

/// AES-256-CBC encryption of [`PLAINTEXT`] under the fixture key/IV, with
/// the trailing zero byte dropped as the appliance firmware does.
const CIPHERTEXT_HEX: &str =
    "2977dc1950e98854f818aba45e8bc59b604bec8439e1539c79ed2228a77d4be1\
     a9d2d9b66b983aa34d0b302707911e506cca3ed5eaea50f7a9630031017fae0c\
     f86c77c005b1b3fcb8b50afab387f38a101388a19082a6d839212f1f32355e";

fn ciphertext() -> Vec<u8> {
    hex::decode(CIPHERTEXT_HEX).unwrap()
}

// ---------------------------------------------------------------------------
// Mock appliance
// ---------------------------------------------------------------------------

async fn encrypted_fixture() -> impl IntoResponse {
    ([("X-Signature", SIGNATURE_HEADER)], ciphertext())
}

async fn spawn_mock_appliance() -> u16 {
    let app = Router::new()
        .route("/", get(encrypted_fixture))
        .route("/Devices", get(encrypted_fixture))
        .route(
            "/forbidden",
            get(|| async { (StatusCode::FORBIDDEN, "Access denied") }),
        )
        .route("/missing-signature", get(|| async { ciphertext() }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        )
        .route("/no-content", get(|| async { StatusCode::NO_CONTENT }))
        .route(
            "/Security/Commissioning/",
            put(|| async { axum::Json(serde_json::json!({ "ok": true })) }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    port
}

/// Build the gateway router pointed at the given appliance port.
fn gateway(port: u16) -> Router {
    let mut config = Config::default();
    config.appliance.port = port;
    config.appliance.connect_timeout_secs = 1;
    config.appliance.request_timeout_secs = 1;

    let credentials = Credentials::from_hex(GROUP_ID_HEX, GROUP_KEY_HEX).unwrap();
    let state = Arc::new(AppState::new(config, credentials).unwrap());
    create_router(state)
}

async fn send(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn forwards_signs_and_decrypts() {
    let port = spawn_mock_appliance().await;
    let (status, body) = send(gateway(port), "/127.0.0.1/Devices").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, PLAINTEXT.as_bytes());
}

#[tokio::test]
async fn explore_renders_clickable_links() {
    let port = spawn_mock_appliance().await;
    let (status, body) = send(gateway(port), "/explore/127.0.0.1").await;

    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains(
        "<a href=\"/explore/127.0.0.1//Devices\">/explore/127.0.0.1//Devices</a>"
    ));
    assert!(html.contains("<h1>127.0.0.1/</h1>"));
}

#[tokio::test]
async fn appliance_http_errors_pass_through() {
    let port = spawn_mock_appliance().await;
    let (status, body) = send(gateway(port), "/127.0.0.1/forbidden").await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["details"], "Access denied");
}

#[tokio::test]
async fn timeout_is_classified_as_unavailable() {
    let port = spawn_mock_appliance().await;
    let (status, body) = send(gateway(port), "/127.0.0.1/slow").await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "Appliance gateway is unavailable");
}

#[tokio::test]
async fn connection_refused_is_classified_as_unavailable() {
    // Bind and immediately drop a listener so the port is very likely free.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let (status, body) = send(gateway(port), "/127.0.0.1/Devices").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "Appliance gateway is unavailable");
}

#[tokio::test]
async fn invalid_host_fails_before_any_forwarding() {
    let port = spawn_mock_appliance().await;

    for uri in ["/homeassistant.local/Devices", "/256.1.1.1/Devices", "/"] {
        let (status, _) = send(gateway(port), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn missing_signature_header_is_a_server_error() {
    let port = spawn_mock_appliance().await;
    let (status, body) = send(gateway(port), "/127.0.0.1/missing-signature").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let message = error["error"].as_str().unwrap();
    assert!(message.contains("decrypt"), "{message}");
}

#[tokio::test]
async fn empty_appliance_response_passes_through() {
    let port = spawn_mock_appliance().await;
    let (status, body) = send(gateway(port), "/127.0.0.1/no-content").await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());
}

#[tokio::test]
async fn commissioning_response_passes_through() {
    let port = spawn_mock_appliance().await;
    let (status, body) = send(gateway(port), "/init/127.0.0.1").await;

    assert_eq!(status, StatusCode::OK);
    let answer: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(answer["ok"], true);
}

#[tokio::test]
async fn favicon_is_answered_locally() {
    let port = spawn_mock_appliance().await;
    let (status, body) = send(gateway(port), "/favicon.ico").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
}

#[tokio::test]
async fn health_reports_real_credentials() {
    let port = spawn_mock_appliance().await;
    let app = gateway(port);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["checks"]["credentials"]["ok"], true);
}

#[tokio::test]
async fn metrics_expose_request_counters() {
    let port = spawn_mock_appliance().await;
    let app = gateway(port);

    let (status, _) = send(app.clone(), "/127.0.0.1/Devices").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("mielegw_requests_total"), "{text}");
}

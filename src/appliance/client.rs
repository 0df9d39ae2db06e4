//! Signed forwarding to the appliance.
//!
//! One outbound round trip per inbound request, no retries.  Transport
//! failures are classified (connect refused / timeout → "appliance
//! unavailable"), appliance HTTP errors are passed through with their body,
//! and the `X-Signature` response header is captured for the decryptor.

use axum::http::{header, StatusCode};
use bytes::Bytes;
use serde_json::json;
use tracing::debug;

use crate::error::{classify_transport_error, GatewayError};
use crate::protocol::{self, signer};
use crate::AppState;

/// Response header carrying the IV material for body decryption.
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// A successful (2xx) appliance response, body still encrypted.
#[derive(Debug)]
pub struct ApplianceResponse {
    pub status: StatusCode,
    pub body: Bytes,
    /// Raw `X-Signature` header value, if the appliance sent one.
    pub signature_header: Option<String>,
}

fn appliance_url(state: &AppState, host: &str, path: &str) -> String {
    format!("http://{host}:{}{path}", state.config.appliance.port)
}

// ---------------------------------------------------------------------------
// Signed GET
// ---------------------------------------------------------------------------

/// Forward a signed GET for `path` to the appliance at `host`.
///
/// The date string is generated once and used both in the `Date` header and
/// in the signed canonical string; the appliance reconstructs the signature
/// from the transmitted header, so the two must be byte-identical.
pub async fn fetch_resource(
    state: &AppState,
    host: &str,
    path: &str,
) -> Result<ApplianceResponse, GatewayError> {
    let date = protocol::http_date();
    let signature = signer::sign(&state.credentials, "GET", host, path, &date);
    let authorization = format!(
        "{} {}:{}",
        protocol::AUTH_SCHEME,
        state.credentials.group_id_hex(),
        signature
    );

    debug!(%host, %path, "forwarding signed GET to appliance");

    let response = state
        .http_client
        .get(appliance_url(state, host, path))
        .header(header::ACCEPT, protocol::ACCEPT_HEADER)
        .header(header::DATE, &date)
        .header(header::USER_AGENT, &state.config.appliance.user_agent)
        .header(header::HOST, host)
        .header(header::ACCEPT_ENCODING, "gzip")
        .header(header::AUTHORIZATION, authorization)
        .send()
        .await
        .map_err(classify_transport_error)?;

    read_response(response).await
}

// ---------------------------------------------------------------------------
// Commissioning PUT
// ---------------------------------------------------------------------------

/// Register this gateway's group id/key pair with the appliance.
///
/// The one write in the protocol, and the one unsigned request: the
/// appliance accepts the credentials in plaintext JSON during pairing mode.
pub async fn commission(state: &AppState, host: &str) -> Result<ApplianceResponse, GatewayError> {
    let date = protocol::http_date();
    let body = json!({
        "GroupID": state.credentials.group_id_hex(),
        "GroupKey": state.credentials.group_key_hex(),
    });

    debug!(%host, "sending commissioning request to appliance");

    let response = state
        .http_client
        .put(appliance_url(state, host, "/Security/Commissioning/"))
        .header(header::ACCEPT, protocol::ACCEPT_HEADER)
        .header(header::DATE, &date)
        .header(header::USER_AGENT, &state.config.appliance.user_agent)
        .header(header::HOST, host)
        .header(header::ACCEPT_ENCODING, "gzip")
        .json(&body)
        .send()
        .await
        .map_err(classify_transport_error)?;

    read_response(response).await
}

// ---------------------------------------------------------------------------
// Shared response handling
// ---------------------------------------------------------------------------

async fn read_response(response: reqwest::Response) -> Result<ApplianceResponse, GatewayError> {
    let status = response.status();
    let signature_header = response
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    // Body read can also hit the overall timeout; classify it the same way.
    let body = response.bytes().await.map_err(classify_transport_error)?;

    if status.is_client_error() || status.is_server_error() {
        return Err(GatewayError::Rejected {
            status,
            details: String::from_utf8_lossy(&body).into_owned(),
        });
    }

    Ok(ApplianceResponse {
        status,
        body,
        signature_header,
    })
}

//! Gateway error type and its HTTP mapping.
//!
//! Every failure a request handler can hit is one of these variants, so the
//! HTTP layer can mirror appliance errors, mark the appliance unreachable
//! distinctly from decryption trouble, and keep 400s local (no outbound call
//! is ever attempted for an invalid host).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::protocol::decryptor::DecryptionError;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The host segment of the request path is not an IPv4 literal (or is
    /// missing entirely).  Carries the full client-facing message.
    #[error("{0}")]
    InvalidHost(String),

    /// Connection refused or timed out before the appliance answered.
    #[error("Appliance gateway is unavailable")]
    Unavailable {
        #[source]
        source: reqwest::Error,
    },

    /// The appliance answered with its own HTTP error (403 on a bad or stale
    /// signature); status and body are passed through to the caller.
    #[error("HTTP error from appliance: {status}")]
    Rejected {
        status: StatusCode,
        details: String,
    },

    /// The response body could not be decrypted.
    #[error("failed to decrypt appliance response: {0}")]
    Decryption(#[from] DecryptionError),

    /// Anything else.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl GatewayError {
    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidHost(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable { source } if source.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            Self::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Rejected { status, .. } => *status,
            Self::Decryption(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            GatewayError::Rejected { details, .. } if !details.is_empty() => {
                json!({ "error": self.to_string(), "details": details })
            }
            _ => json!({ "error": self.to_string() }),
        };

        // Handlers log unavailable/rejected/decryption failures with host and
        // path context; only unexpected faults are logged here.
        if let GatewayError::Internal(err) = &self {
            error!(error = %err, "internal gateway error");
        }

        (status, Json(body)).into_response()
    }
}

/// Classify a reqwest transport failure on the way to the appliance.
///
/// Connection refused and timeout both mean "appliance unavailable" (503 and
/// 504 respectively); anything else is an internal fault.
pub fn classify_transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() || err.is_connect() {
        GatewayError::Unavailable { source: err }
    } else {
        GatewayError::Internal(anyhow::Error::new(err).context("appliance request failed"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            GatewayError::InvalidHost("nope".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::Rejected {
                status: StatusCode::FORBIDDEN,
                details: String::new(),
            }
            .status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            GatewayError::Decryption(DecryptionError::InvalidPadding).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

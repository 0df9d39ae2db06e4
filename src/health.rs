use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::AppState;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub checks: HealthChecks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub credentials: CheckResult,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

/// The gateway has no external dependencies to probe (the appliance is only
/// reachable per-request), so the single meaningful check is whether real
/// credentials were loaded or the all-zero placeholders are still in use.
fn check_credentials(state: &AppState) -> CheckResult {
    if state.credentials.is_placeholder() {
        CheckResult {
            ok: false,
            detail: Some(
                "placeholder group credentials in use; set GROUP_ID/GROUP_KEY \
                 and commission the appliance via /init/<host>"
                    .to_string(),
            ),
        }
    } else {
        CheckResult {
            ok: true,
            detail: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Axum handler
// ---------------------------------------------------------------------------

/// `GET /healthz` handler.  Always 200; `degraded` signals placeholder
/// credentials rather than an outage.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let checks = HealthChecks {
        credentials: check_credentials(&state),
    };
    let status = if checks.credentials.ok {
        HealthStatus::Ok
    } else {
        HealthStatus::Degraded
    };

    (StatusCode::OK, Json(HealthResponse { status, checks }))
}

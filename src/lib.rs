//! Signing and decrypting HTTP gateway for the Miele local appliance API.
//!
//! The gateway sits between a home-automation controller and an appliance
//! speaking the encrypted Miele REST protocol over plain HTTP.  Inbound
//! requests name the appliance by IPv4 address in the path; the gateway
//! signs the forwarded GET, decrypts the encrypted response body, and hands
//! plaintext JSON back to the caller.

pub mod appliance;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod metrics;
pub mod protocol;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::metrics::MetricsRegistry;
use crate::protocol::Credentials;

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// Global state shared across all request handlers.
///
/// Everything in here is immutable after startup; handlers run concurrently
/// against it without locking.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub credentials: Arc<Credentials>,
    pub http_client: reqwest::Client,
    pub metrics: MetricsRegistry,
}

impl AppState {
    /// Build the shared state, including the outbound HTTP client with the
    /// configured connect/overall timeouts baked in.
    pub fn new(config: Config, credentials: Credentials) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.appliance.connect_timeout_secs))
            .timeout(Duration::from_secs(config.appliance.request_timeout_secs))
            .build()
            .context("failed to build appliance HTTP client")?;

        Ok(Self {
            config: Arc::new(config),
            credentials: Arc::new(credentials),
            http_client,
            metrics: MetricsRegistry::new(),
        })
    }
}

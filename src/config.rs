use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Gateway configuration.
///
/// Every field has a default, so the gateway runs with no config file at all;
/// the reference deployment configures everything through the environment.
/// Secrets never live in the file — it only names the environment variables
/// that hold them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub appliance: ApplianceConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

// ---------------------------------------------------------------------------
// Gateway listener
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Socket address for the HTTP listener (e.g. `0.0.0.0:5000`).
    #[serde(default = "default_http_listen")]
    pub http_listen: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            http_listen: default_http_listen(),
        }
    }
}

fn default_http_listen() -> String {
    "0.0.0.0:5000".to_string()
}

// ---------------------------------------------------------------------------
// Appliance connection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ApplianceConfig {
    /// TCP port of the appliance's local API.  The protocol runs on plain
    /// HTTP port 80; overridable so tests can stand up a mock appliance.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Seconds allowed to establish the TCP connection.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Seconds allowed for the whole outbound round trip.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// `User-Agent` sent to the appliance.  The firmware expects a known
    /// mobile client string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApplianceConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_port() -> u16 {
    80
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    "Miele@mobile 2.3.3 Android".to_string()
}

// ---------------------------------------------------------------------------
// Credential sourcing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    /// Name of the environment variable holding the hex group id.
    #[serde(default = "default_group_id_env")]
    pub group_id_env: String,
    /// Name of the environment variable holding the hex group key.
    #[serde(default = "default_group_key_env")]
    pub group_key_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            group_id_env: default_group_id_env(),
            group_key_env: default_group_key_env(),
        }
    }
}

fn default_group_id_env() -> String {
    "GROUP_ID".to_string()
}

fn default_group_key_env() -> String {
    "GROUP_KEY".to_string()
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load and validate a [`Config`] from a YAML file, or fall back to the
/// built-in defaults when no path is given.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            let path = path.as_ref();
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&contents)
                .with_context(|| format!("failed to parse config file: {}", path.display()))?
        }
        None => Config::default(),
    };
    validate_config(&config)?;
    Ok(config)
}

/// Basic sanity checks that cannot be expressed purely with serde.
fn validate_config(config: &Config) -> Result<()> {
    anyhow::ensure!(
        config.appliance.connect_timeout_secs > 0,
        "connect_timeout_secs must be positive"
    );
    anyhow::ensure!(
        config.appliance.request_timeout_secs >= config.appliance.connect_timeout_secs,
        "request_timeout_secs must be at least connect_timeout_secs"
    );
    anyhow::ensure!(config.appliance.port > 0, "appliance port must be non-zero");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use tracing::{trace, warn};

use crate::{
    Source,
    actors::monitor::MonitorSettings,
    monitors::{backoff::BackoffPolicy, health::HealthPolicy},
};

/// Lower bound for the number of concurrently running health checks
pub const MIN_CONCURRENT_CHECKS: usize = 3;

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub hub: HubConfig,

    #[serde(default)]
    pub api: ApiConfig,

    /// Sources seeded into the in-memory registry
    #[serde(default)]
    pub sources: Vec<Source>,
}

/// Health monitoring settings. All durations are in seconds.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_interval")]
    pub interval: u64,

    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrent_checks: usize,

    /// Consecutive failures before a source is confirmed offline
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Unchanged fingerprint for longer than this means frozen
    #[serde(default = "default_frozen_threshold")]
    pub frozen_threshold: u64,

    /// Time-only frozen threshold when no fingerprint can be taken
    #[serde(default = "default_frozen_fallback_threshold")]
    pub frozen_fallback_threshold: u64,

    /// Upper bound for a single gateway call
    #[serde(default = "default_call_timeout")]
    pub call_timeout: u64,

    #[serde(default = "default_backoff_base")]
    pub backoff_base: u64,

    #[serde(default = "default_backoff_cap")]
    pub backoff_cap: u64,

    /// Pause between removing and re-adding a stream during recovery
    #[serde(default = "default_restart_pause")]
    pub restart_pause: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            max_concurrent_checks: default_max_concurrent_checks(),
            failure_threshold: default_failure_threshold(),
            frozen_threshold: default_frozen_threshold(),
            frozen_fallback_threshold: default_frozen_fallback_threshold(),
            call_timeout: default_call_timeout(),
            backoff_base: default_backoff_base(),
            backoff_cap: default_backoff_cap(),
            restart_pause: default_restart_pause(),
        }
    }
}

impl MonitorConfig {
    pub fn settings(&self) -> MonitorSettings {
        let max_concurrent_checks = if self.max_concurrent_checks < MIN_CONCURRENT_CHECKS {
            warn!(
                "max_concurrent_checks {} is below minimum, using {MIN_CONCURRENT_CHECKS}",
                self.max_concurrent_checks
            );
            MIN_CONCURRENT_CHECKS
        } else {
            self.max_concurrent_checks
        };

        MonitorSettings {
            interval: Duration::from_secs(self.interval.max(1)),
            max_concurrent_checks,
        }
    }

    pub fn health_policy(&self) -> HealthPolicy {
        HealthPolicy {
            failure_threshold: self.failure_threshold.max(1),
            frozen_threshold: Duration::from_secs(self.frozen_threshold),
            frozen_fallback_threshold: Duration::from_secs(self.frozen_fallback_threshold),
            call_timeout: Duration::from_secs(self.call_timeout),
        }
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            base: Duration::from_secs(self.backoff_base),
            cap: Duration::from_secs(self.backoff_cap),
        }
    }

    pub fn restart_pause(&self) -> Duration {
        Duration::from_secs(self.restart_pause)
    }
}

/// Connection settings for the streaming gateway control plane
#[derive(Debug, Clone, serde::Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "crate::util::get_default_gateway_url")]
    pub api_url: String,

    /// Base URL handed out to viewers; defaults to `api_url`
    pub public_url: Option<String>,

    pub username: Option<String>,

    pub password: Option<String>,

    #[serde(default = "default_call_timeout")]
    pub timeout: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_url: crate::util::get_default_gateway_url(),
            public_url: None,
            username: None,
            password: None,
            timeout: default_call_timeout(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct HubConfig {
    /// Capacity of the hub's broadcast queue
    #[serde(default = "default_broadcast_buffer")]
    pub broadcast_buffer: usize,

    /// Capacity of each observer's outbound queue
    #[serde(default = "default_observer_buffer")]
    pub observer_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            broadcast_buffer: default_broadcast_buffer(),
            observer_buffer: default_observer_buffer(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            enable_cors: default_enable_cors(),
        }
    }
}

fn default_interval() -> u64 {
    30
}

fn default_max_concurrent_checks() -> usize {
    5
}

fn default_failure_threshold() -> u32 {
    2
}

fn default_frozen_threshold() -> u64 {
    45
}

fn default_frozen_fallback_threshold() -> u64 {
    60
}

fn default_call_timeout() -> u64 {
    10
}

fn default_backoff_base() -> u64 {
    1
}

fn default_backoff_cap() -> u64 {
    300
}

fn default_restart_pause() -> u64 {
    2
}

fn default_broadcast_buffer() -> usize {
    256
}

fn default_observer_buffer() -> usize {
    64
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_enable_cors() -> bool {
    true
}

pub fn parse_config(content: &str) -> anyhow::Result<Config> {
    serde_json::from_str(content)
        .context("invalid configuration file provided")
        .inspect(|config| trace!("loaded config: {config:?}"))
}

/// Read the config file and apply environment overrides for the gateway
pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
    let mut config = parse_config(&file_content)?;
    crate::util::apply_gateway_env(&mut config.gateway);
    Ok(config)
}

//! Server configuration from the environment
//!
//! `.env` is loaded first if present; every variable is optional and an
//! unparsable value falls back to the default with a warning.

use reqlog_core::{LogConfig, RotationPolicy};
use reqlog_gateway::GatewayConfig;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

pub const ENV_HOST: &str = "REQLOG_HOST";
pub const ENV_PORT: &str = "REQLOG_PORT";
pub const ENV_LOG_DIR: &str = "REQLOG_LOG_DIR";
pub const ENV_MAX_FILE_SIZE: &str = "REQLOG_MAX_FILE_SIZE";
pub const ENV_RETENTION_DAYS: &str = "REQLOG_RETENTION_DAYS";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub gateway: GatewayConfig,
    pub logs: LogConfig,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let gateway_defaults = GatewayConfig::default();
        let policy_defaults = RotationPolicy::default();

        let gateway = GatewayConfig {
            host: lookup(ENV_HOST).unwrap_or(gateway_defaults.host),
            port: parse_or(&lookup, ENV_PORT, gateway_defaults.port),
        };

        let base_dir = lookup(ENV_LOG_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| LogConfig::default().base_dir);
        let policy = RotationPolicy {
            max_file_size: parse_or(&lookup, ENV_MAX_FILE_SIZE, policy_defaults.max_file_size),
            max_retention_days: parse_or(
                &lookup,
                ENV_RETENTION_DAYS,
                policy_defaults.max_retention_days,
            ),
            ..policy_defaults
        };

        Self {
            gateway,
            logs: LogConfig::new(base_dir).with_policy(policy),
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}={:?}, using default", key, raw);
            default
        }),
        None => default,
    }
}

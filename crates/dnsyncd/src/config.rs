//! Daemon configuration
//!
//! Every option is a command-line flag with a `DNSYNC_*` environment fallback.

use anyhow::Result;
use clap::Parser;
use dnsync_core::config::{DriverConfig, ReconcileConfig, RecordStrategy, parse_strategies};
use dnsync_marathon::DEFAULT_MARATHON_HOST;
use std::collections::BTreeSet;
use tracing::Level;

/// Longest accepted interval (one day)
const MAX_INTERVAL_SECS: u64 = 86_400;

/// Keep a Route53 record set in sync with the running tasks of a Marathon app
#[derive(Parser, Debug, Clone)]
#[command(name = "dnsyncd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Keep a Route53 record set in sync with the running tasks of a Marathon app")]
pub struct Config {
    /// HTTP endpoint of the Marathon service
    #[arg(long, env = "DNSYNC_MARATHON_HOST", default_value = DEFAULT_MARATHON_HOST)]
    pub marathon_host: String,

    /// Marathon app id of the service (a leading `/` is added if missing)
    #[arg(long, env = "DNSYNC_APP_ID", default_value = "marathon-lb")]
    pub app_id: String,

    /// Route53 hosted zone id
    #[arg(long, env = "DNSYNC_HOSTED_ZONE_ID")]
    pub hosted_zone_id: Option<String>,

    /// Record set to update
    #[arg(long, env = "DNSYNC_RECORD_SET", default_value = "marathon-lb.example.com")]
    pub record_set: String,

    /// Comma-separated record set types: weighted, enumerated
    #[arg(long, env = "DNSYNC_RECORD_SET_TYPE", default_value = "weighted")]
    pub record_set_type: String,

    /// Longest wait between two updates, in seconds
    #[arg(long, env = "DNSYNC_INTERVAL", default_value_t = 360)]
    pub interval: u64,

    /// Port of the admin HTTP endpoint (health checks)
    #[arg(long, env = "DNSYNC_ADMIN_HTTP_PORT", default_value_t = 8080)]
    pub admin_http_port: u16,

    /// Do not subscribe to Marathon events; update on the interval only
    #[arg(long, env = "DNSYNC_NO_EVENTS")]
    pub no_events: bool,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, env = "DNSYNC_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.hosted_zone_id().is_empty() {
            anyhow::bail!(
                "Hosted zone id is required. \
                Set it via --hosted-zone-id or DNSYNC_HOSTED_ZONE_ID"
            );
        }

        let host = self.marathon_host.trim();
        if !host.starts_with("http://") && !host.starts_with("https://") {
            anyhow::bail!(
                "Marathon host must use HTTP or HTTPS scheme. Got: {}",
                self.marathon_host
            );
        }

        if self.app_id.trim().trim_start_matches('/').is_empty() {
            anyhow::bail!("App id cannot be empty");
        }

        validate_record_name(&self.record_set)?;
        self.strategies()?;

        if !(1..=MAX_INTERVAL_SECS).contains(&self.interval) {
            anyhow::bail!(
                "Interval must be between 1 and {} seconds. Got: {}",
                MAX_INTERVAL_SECS,
                self.interval
            );
        }

        if self.admin_http_port == 0 {
            anyhow::bail!("Admin HTTP port cannot be 0");
        }

        self.log_level()?;

        self.reconcile_config()?.validate()?;
        self.driver_config().validate()?;

        Ok(())
    }

    /// Hosted zone id, empty when unset
    pub fn hosted_zone_id(&self) -> &str {
        self.hosted_zone_id.as_deref().map(str::trim).unwrap_or_default()
    }

    /// Enabled record strategies
    pub fn strategies(&self) -> Result<BTreeSet<RecordStrategy>> {
        Ok(parse_strategies(&self.record_set_type)?)
    }

    /// Reconciler settings
    pub fn reconcile_config(&self) -> Result<ReconcileConfig> {
        Ok(
            ReconcileConfig::new(self.hosted_zone_id(), self.record_set.trim())
                .with_strategies(self.strategies()?),
        )
    }

    /// Driver settings
    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            interval_secs: self.interval,
            ..DriverConfig::new(&self.app_id)
        }
    }

    /// Maximum tracing level
    pub fn log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "Log level '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }
}

/// Basic DNS name validation (RFC 1035 lengths, letters, digits and hyphens)
///
/// A single label passes; whether the name can be enumerated is decided by the
/// reconciler.
fn validate_record_name(name: &str) -> Result<()> {
    let name = name.trim().trim_end_matches('.');
    if name.is_empty() {
        anyhow::bail!("Record set cannot be empty");
    }

    if name.len() > 253 {
        anyhow::bail!(
            "Record set too long: {} chars (max 253). Got: {}",
            name.len(),
            name
        );
    }

    for label in name.split('.') {
        if label.is_empty() {
            anyhow::bail!("Record set has empty label: '{}'", name);
        }

        if label.len() > 63 {
            anyhow::bail!(
                "Record set label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            );
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            anyhow::bail!(
                "Record set label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric and hyphen only.",
                label
            );
        }

        if label.starts_with('-') || label.ends_with('-') {
            anyhow::bail!(
                "Record set label cannot start or end with hyphen. Label: '{}'",
                label
            );
        }
    }

    Ok(())
}

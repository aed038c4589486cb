//! Configuration types for dnsync
//!
//! This module defines all configuration structures used throughout the crate.
//! Everything here is immutable once the engine is built.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How records are laid out for the running tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStrategy {
    /// One weighted record per address under the configured name
    Weighted,
    /// One plain record per address under `prefix-N.suffix`
    Enumerated,
}

impl FromStr for RecordStrategy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weighted" => Ok(Self::Weighted),
            "enumerated" => Ok(Self::Enumerated),
            other => Err(crate::Error::config(format!(
                "Unknown record set type '{}'. Valid types: weighted, enumerated",
                other
            ))),
        }
    }
}

impl fmt::Display for RecordStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weighted => f.write_str("weighted"),
            Self::Enumerated => f.write_str("enumerated"),
        }
    }
}

/// Parse a comma-separated strategy list such as `"weighted,enumerated"`
pub fn parse_strategies(list: &str) -> Result<BTreeSet<RecordStrategy>, crate::Error> {
    let strategies = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(RecordStrategy::from_str)
        .collect::<Result<BTreeSet<_>, _>>()?;

    if strategies.is_empty() {
        return Err(crate::Error::config(
            "At least one record set type is required (weighted, enumerated)",
        ));
    }

    Ok(strategies)
}

/// Prefix a Marathon app id with `/` when it is missing
pub fn normalize_app_id(app_id: &str) -> String {
    let app_id = app_id.trim();
    if app_id.starts_with('/') {
        app_id.to_string()
    } else {
        format!("/{}", app_id)
    }
}

/// Settings for the reconciler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Hosted zone that owns the records
    pub hosted_zone_id: String,

    /// Base record name (e.g. "marathon-lb.example.com")
    pub record_set: String,

    /// Enabled strategies; weighted and enumerated may run together
    pub strategies: BTreeSet<RecordStrategy>,
}

impl ReconcileConfig {
    /// Create a configuration with the weighted strategy only
    pub fn new(hosted_zone_id: impl Into<String>, record_set: impl Into<String>) -> Self {
        Self {
            hosted_zone_id: hosted_zone_id.into(),
            record_set: record_set.into(),
            strategies: BTreeSet::from([RecordStrategy::Weighted]),
        }
    }

    /// Replace the enabled strategies
    pub fn with_strategies(mut self, strategies: impl IntoIterator<Item = RecordStrategy>) -> Self {
        self.strategies = strategies.into_iter().collect();
        self
    }

    /// Whether the given strategy is enabled
    pub fn is_enabled(&self, strategy: RecordStrategy) -> bool {
        self.strategies.contains(&strategy)
    }

    /// Validate the configuration
    ///
    /// A record set without a `.` is accepted here; the reconciler reports it
    /// when the enumerated strategy needs to split it.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.hosted_zone_id.trim().is_empty() {
            return Err(crate::Error::config("Hosted zone id is required"));
        }
        if self.record_set.trim().is_empty() {
            return Err(crate::Error::config("Record set name cannot be empty"));
        }
        if self.strategies.is_empty() {
            return Err(crate::Error::config(
                "At least one record set type is required (weighted, enumerated)",
            ));
        }
        Ok(())
    }
}

/// Settings for the driver loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Marathon app id, always starting with `/`
    pub app_id: String,

    /// Longest wait between two reconciliations (in seconds)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Shortest wait between two reconciliations (in milliseconds)
    ///
    /// Bounds how often the provider is called while status updates keep arriving.
    #[serde(default = "default_min_spacing_millis")]
    pub min_spacing_millis: u64,

    /// Capacity of the raw and classified event channels
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Capacity of the parse error channel; overflow is dropped
    #[serde(default = "default_error_channel_capacity")]
    pub error_channel_capacity: usize,
}

impl DriverConfig {
    /// Create a driver configuration with defaults for `app_id`
    pub fn new(app_id: &str) -> Self {
        Self {
            app_id: normalize_app_id(app_id),
            interval_secs: default_interval_secs(),
            min_spacing_millis: default_min_spacing_millis(),
            event_channel_capacity: default_event_channel_capacity(),
            error_channel_capacity: default_error_channel_capacity(),
        }
    }

    /// Longest wait between reconciliations
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Shortest wait between reconciliations
    pub fn min_spacing(&self) -> Duration {
        Duration::from_millis(self.min_spacing_millis)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.app_id.trim_start_matches('/').is_empty() {
            return Err(crate::Error::config("App id cannot be empty"));
        }
        if self.interval_secs == 0 {
            return Err(crate::Error::config("Interval must be > 0"));
        }
        if self.event_channel_capacity == 0 || self.error_channel_capacity == 0 {
            return Err(crate::Error::config("Channel capacities must be > 0"));
        }
        Ok(())
    }
}

fn default_interval_secs() -> u64 {
    360
}

fn default_min_spacing_millis() -> u64 {
    1000
}

fn default_event_channel_capacity() -> usize {
    64
}

fn default_error_channel_capacity() -> usize {
    16
}

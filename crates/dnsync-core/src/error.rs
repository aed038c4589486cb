//! Error types for dnsync
//!
//! This module defines all error types used throughout the crate.
//! [`Error::is_fatal`] decides whether the driver loop stops or retries.

use std::fmt;
use thiserror::Error;

/// Result type alias for dnsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Why a DNS provider refused a change batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// The hosted zone does not exist
    NoSuchHostedZone,
    /// A referenced health check does not exist
    NoSuchHealthCheck,
    /// The batch itself is invalid (e.g. deleting a record that changed)
    InvalidChangeBatch,
    /// A request parameter is invalid
    InvalidInput,
    /// Another change to the zone is still propagating
    PriorRequestNotComplete,
    /// The provider is throttling requests
    Throttled,
    /// Anything the provider did not classify
    Other,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoSuchHostedZone => "NoSuchHostedZone",
            Self::NoSuchHealthCheck => "NoSuchHealthCheck",
            Self::InvalidChangeBatch => "InvalidChangeBatch",
            Self::InvalidInput => "InvalidInput",
            Self::PriorRequestNotComplete => "PriorRequestNotComplete",
            Self::Throttled => "Throttling",
            Self::Other => "Other",
        };
        f.write_str(name)
    }
}

/// Core error type for dnsync
#[derive(Error, Debug)]
pub enum Error {
    /// The orchestrator snapshot could not be fetched
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// The snapshot contained no running task with an IPv4 address
    #[error("No running instances found")]
    NoInstances,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// DNS provider failed before a change was submitted (listing, transport)
    #[error("DNS provider error: {0}")]
    DnsProvider(String),

    /// DNS provider refused the change batch
    #[error("Change batch rejected ({reason}): {message}")]
    ChangeRejected {
        /// Classified rejection
        reason: RejectionReason,
        /// Provider message
        message: String,
    },

    /// An accepted change did not report completion
    #[error("Change did not complete: {0}")]
    ChangeIncomplete(String),

    /// Event subscription errors
    #[error("Event source error: {0}")]
    EventSource(String),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a snapshot error
    pub fn snapshot(msg: impl Into<String>) -> Self {
        Self::Snapshot(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a DNS provider error
    pub fn dns_provider(msg: impl Into<String>) -> Self {
        Self::DnsProvider(msg.into())
    }

    /// Create a change rejection error
    pub fn rejected(reason: RejectionReason, message: impl Into<String>) -> Self {
        Self::ChangeRejected {
            reason,
            message: message.into(),
        }
    }

    /// Create a change completion error
    pub fn change_incomplete(msg: impl Into<String>) -> Self {
        Self::ChangeIncomplete(msg.into())
    }

    /// Create an event source error
    pub fn event_source(msg: impl Into<String>) -> Self {
        Self::EventSource(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Whether the driver loop must stop after this error.
    ///
    /// Snapshot failures, an empty address set and configuration errors are
    /// fatal. Everything else is retried on the next cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Snapshot(_) | Self::NoInstances | Self::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_taxonomy() {
        assert!(Error::snapshot("connection refused").is_fatal());
        assert!(Error::NoInstances.is_fatal());
        assert!(Error::config("record set has no '.'").is_fatal());

        assert!(!Error::rejected(RejectionReason::PriorRequestNotComplete, "busy").is_fatal());
        assert!(!Error::change_incomplete("timed out").is_fatal());
        assert!(!Error::dns_provider("list failed").is_fatal());
        assert!(!Error::event_source("stream closed").is_fatal());
    }

    #[test]
    fn rejection_message_names_reason() {
        let err = Error::rejected(RejectionReason::NoSuchHostedZone, "Z123 not found");
        assert_eq!(
            err.to_string(),
            "Change batch rejected (NoSuchHostedZone): Z123 not found"
        );
    }
}

// # DNS Provider Trait
//
// Defines the interface for reading and changing a hosted zone.
//
// ## Implementations
//
// - Route53: `dnsync-route53` crate
//
// ## Usage
//
// ```rust,ignore
// use dnsync_core::DnsProvider;
//
// let existing = provider.list_records("Z123", "svc.example.com").await?;
// let change = provider.apply_change_batch("Z123", &batch).await?;
// provider.await_change_complete(&change).await?;
// ```

use async_trait::async_trait;
use std::fmt;

/// Time-to-live of every managed record, in seconds
pub const RECORD_TTL: i64 = 60;

/// Weight of every weighted record
pub const RECORD_WEIGHT: i64 = 10;

/// DNS record type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// Anything else the provider lists (AAAA, TXT, CNAME, ...)
    Other(String),
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::A => f.write_str("A"),
            RecordType::Other(name) => f.write_str(name),
        }
    }
}

/// A record set as stored by the provider
///
/// Records returned by [`DnsProvider::list_records`] must be passed back
/// unchanged when they are deleted, so every field the provider needs to
/// identify the record is kept here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordSet {
    /// Fully qualified name (a trailing dot is allowed)
    pub name: String,
    /// Record type
    pub record_type: RecordType,
    /// Time-to-live in seconds
    pub ttl: Option<i64>,
    /// Weight, for weighted records
    pub weight: Option<i64>,
    /// Set identifier, for weighted records
    pub set_identifier: Option<String>,
    /// Health check attached to the record
    pub health_check_id: Option<String>,
    /// Record values
    pub values: Vec<String>,
}

impl RecordSet {
    /// Weighted A record whose set identifier is the address itself
    pub fn weighted(name: impl Into<String>, address: &str) -> Self {
        Self {
            name: name.into(),
            record_type: RecordType::A,
            ttl: Some(RECORD_TTL),
            weight: Some(RECORD_WEIGHT),
            set_identifier: Some(address.to_string()),
            health_check_id: None,
            values: vec![address.to_string()],
        }
    }

    /// Plain A record
    pub fn simple(name: impl Into<String>, address: &str) -> Self {
        Self {
            name: name.into(),
            record_type: RecordType::A,
            ttl: Some(RECORD_TTL),
            weight: None,
            set_identifier: None,
            health_check_id: None,
            values: vec![address.to_string()],
        }
    }

    /// First value of the record, if any
    pub fn first_value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }
}

/// Change action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeAction {
    /// Create or replace the record
    Upsert,
    /// Delete the record; must match the stored record exactly
    Delete,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeAction::Upsert => f.write_str("UPSERT"),
            ChangeAction::Delete => f.write_str("DELETE"),
        }
    }
}

/// A single change in a batch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Change {
    /// What to do
    pub action: ChangeAction,
    /// The record it applies to
    pub record: RecordSet,
}

impl Change {
    /// Upsert `record`
    pub fn upsert(record: RecordSet) -> Self {
        Self {
            action: ChangeAction::Upsert,
            record,
        }
    }

    /// Delete `record`
    pub fn delete(record: RecordSet) -> Self {
        Self {
            action: ChangeAction::Delete,
            record,
        }
    }
}

/// An ordered set of changes applied atomically by the provider
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeBatch {
    /// Changes in submission order
    pub changes: Vec<Change>,
    /// Human readable comment stored with the change
    pub comment: String,
}

impl ChangeBatch {
    /// Changes with the given action, in order
    pub fn with_action(&self, action: ChangeAction) -> impl Iterator<Item = &Change> {
        self.changes.iter().filter(move |c| c.action == action)
    }

    /// Number of deletes in the batch
    pub fn delete_count(&self) -> usize {
        self.with_action(ChangeAction::Delete).count()
    }

    /// Number of upserts in the batch
    pub fn upsert_count(&self) -> usize {
        self.with_action(ChangeAction::Upsert).count()
    }
}

/// Handle to a submitted change, used to await propagation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeId(pub String);

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trait for DNS provider implementations
///
/// Providers are single-shot: each method performs the provider call it names
/// and returns. Scheduling, retrying and deciding what to change belong to the
/// reconciler and driver.
///
/// # Errors
///
/// - `list_records` failures are reported as [`crate::Error::DnsProvider`]
/// - `apply_change_batch` failures as [`crate::Error::ChangeRejected`]
/// - `await_change_complete` failures as [`crate::Error::ChangeIncomplete`]
///
/// None of them are fatal to the driver loop.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// List record sets of `zone_id` starting at `start_name`, type A
    ///
    /// Providers list in zone order, so records with names after
    /// `start_name` may be returned too.
    async fn list_records(
        &self,
        zone_id: &str,
        start_name: &str,
    ) -> Result<Vec<RecordSet>, crate::Error>;

    /// Submit `batch` to `zone_id` as one atomic change
    async fn apply_change_batch(
        &self,
        zone_id: &str,
        batch: &ChangeBatch,
    ) -> Result<ChangeId, crate::Error>;

    /// Block until the change has propagated
    async fn await_change_complete(&self, change: &ChangeId) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

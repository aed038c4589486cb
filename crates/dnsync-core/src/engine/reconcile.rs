//! Reconciliation of a hosted zone onto a set of addresses
//!
//! One run lists the records under the configured name, deletes those whose
//! address is no longer wanted and upserts one record per wanted address for
//! every enabled strategy, all in a single change batch.
//!
//! Record identity is derived from the address only:
//! - weighted records use the address as set identifier
//! - enumerated records are numbered by the address' position in the sorted set
//!
//! so an unchanged address set produces the same upserts on every run.

use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::config::{RecordStrategy, ReconcileConfig};
use crate::error::{Error, Result};
use crate::traits::{Change, ChangeBatch, ChangeId, DnsProvider, RecordSet, RecordType};

/// Outcome of a successful reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Records deleted
    pub deletes: usize,
    /// Records upserted
    pub upserts: usize,
    /// Provider handle of the change
    pub change_id: ChangeId,
    /// Whether the provider reported the change as propagated
    pub completed: bool,
}

/// A record name split for enumeration: `svc.example.com` -> (`svc`, `example.com`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumeratedName {
    prefix: String,
    suffix: String,
}

impl EnumeratedName {
    /// Split `record_set` at its first `.`
    pub fn parse(record_set: &str) -> Result<Self> {
        match record_set.split_once('.') {
            Some((prefix, suffix)) if !prefix.is_empty() && !suffix.is_empty() => Ok(Self {
                prefix: prefix.to_string(),
                suffix: suffix.to_string(),
            }),
            _ => Err(Error::config(format!(
                "Record set '{}' must contain a '.' to derive enumerated names",
                record_set
            ))),
        }
    }

    /// Name of the record at 0-based position `idx`
    pub fn name_at(&self, idx: usize) -> String {
        format!("{}-{}.{}", self.prefix, idx + 1, self.suffix)
    }

    /// Whether `name` is `prefix-N.suffix` for some N
    fn matches(&self, name: &str) -> bool {
        let Some(rest) = name.strip_prefix(&self.prefix.to_ascii_lowercase()) else {
            return false;
        };
        let Some(rest) = rest.strip_prefix('-') else {
            return false;
        };
        let Some((index, suffix)) = rest.split_once('.') else {
            return false;
        };
        !index.is_empty()
            && index.bytes().all(|b| b.is_ascii_digit())
            && suffix == self.suffix.to_ascii_lowercase()
    }
}

/// Names this reconciler owns: the record set and its enumerated variants
#[derive(Debug, Clone)]
struct ManagedNames {
    base: String,
    enumerated: Option<EnumeratedName>,
}

impl ManagedNames {
    fn new(record_set: &str) -> Self {
        Self {
            base: normalize_name(record_set),
            enumerated: EnumeratedName::parse(&normalize_name(record_set)).ok(),
        }
    }

    fn contains(&self, name: &str) -> bool {
        let name = normalize_name(name);
        name == self.base
            || self
                .enumerated
                .as_ref()
                .is_some_and(|enumerated| enumerated.matches(&name))
    }
}

/// Lowercase and drop the trailing root dot providers append
fn normalize_name(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}

/// Compute the change batch converging `existing` onto `desired`
///
/// Deletes come first, then upserts. Listed records outside the managed names
/// or of another type are left alone.
pub fn plan_changes(
    config: &ReconcileConfig,
    desired: &BTreeSet<String>,
    existing: &[RecordSet],
) -> Result<ChangeBatch> {
    if desired.is_empty() {
        return Err(Error::NoInstances);
    }

    let enumerated = if config.is_enabled(RecordStrategy::Enumerated) {
        Some(EnumeratedName::parse(&config.record_set)?)
    } else {
        None
    };

    let managed = ManagedNames::new(&config.record_set);
    let mut changes = Vec::new();

    for record in existing {
        if record.record_type != RecordType::A || !managed.contains(&record.name) {
            continue;
        }
        let Some(value) = record.first_value() else {
            continue;
        };
        if !desired.contains(value) {
            debug!(
                "Marking {} {:?} -> {} for deletion",
                record.name, record.set_identifier, value
            );
            changes.push(Change::delete(record.clone()));
        }
    }

    // BTreeSet iterates in lexicographic order, which fixes enumerated indices
    for (idx, address) in desired.iter().enumerate() {
        if config.is_enabled(RecordStrategy::Weighted) {
            changes.push(Change::upsert(RecordSet::weighted(
                config.record_set.clone(),
                address,
            )));
        }
        if let Some(enumerated) = &enumerated {
            changes.push(Change::upsert(RecordSet::simple(
                enumerated.name_at(idx),
                address,
            )));
        }
    }

    Ok(ChangeBatch {
        changes,
        comment: format!("Updated records for {}", config.record_set),
    })
}

/// Drives a [`DnsProvider`] through one reconciliation at a time
pub struct Reconciler {
    /// DNS provider owning the zone
    provider: Box<dyn DnsProvider>,

    /// Zone, name and strategies
    config: ReconcileConfig,
}

impl Reconciler {
    /// Create a reconciler
    pub fn new(provider: Box<dyn DnsProvider>, config: ReconcileConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { provider, config })
    }

    /// The configuration in use
    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Converge the zone onto `desired`
    ///
    /// # Errors
    ///
    /// - [`Error::NoInstances`] if `desired` is empty (fatal, no provider call)
    /// - [`Error::Config`] if enumeration is enabled and the record set has no
    ///   `.` (fatal, no provider call)
    /// - provider errors from listing or submitting (recoverable)
    ///
    /// A failed wait for propagation is logged and reported through
    /// [`ReconcileReport::completed`]; the change was already accepted.
    pub async fn reconcile(&self, desired: &BTreeSet<String>) -> Result<ReconcileReport> {
        if desired.is_empty() {
            return Err(Error::NoInstances);
        }
        if self.config.is_enabled(RecordStrategy::Enumerated) {
            EnumeratedName::parse(&self.config.record_set)?;
        }

        let zone_id = &self.config.hosted_zone_id;
        let existing = self
            .provider
            .list_records(zone_id, &self.config.record_set)
            .await?;
        debug!(
            "{} listed {} record set(s) from {}",
            self.provider.provider_name(),
            existing.len(),
            self.config.record_set
        );

        let batch = plan_changes(&self.config, desired, &existing)?;
        let deletes = batch.delete_count();
        let upserts = batch.upsert_count();

        info!(
            deletes,
            upserts,
            "Submitting change batch for {}",
            self.config.record_set
        );
        let change_id = self.provider.apply_change_batch(zone_id, &batch).await?;

        let completed = match self.provider.await_change_complete(&change_id).await {
            Ok(()) => {
                info!("Updated record set for {} successfully", self.config.record_set);
                true
            }
            Err(e) => {
                warn!("Error waiting for change {}: {}", change_id, e);
                false
            }
        };

        Ok(ReconcileReport {
            deletes,
            upserts,
            change_id,
            completed,
        })
    }
}

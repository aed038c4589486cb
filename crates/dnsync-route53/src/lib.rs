// # Route53 DNS Provider
//
// This crate provides the AWS Route53 implementation of `DnsProvider`.
//
// ## API Reference
//
// - List records: `ListResourceRecordSets` (start name, start type A)
// - Change records: `ChangeResourceRecordSets` (one atomic batch)
// - Propagation: `GetChange` polled until `INSYNC`
//
// ## Credentials
//
// Resolved by the default AWS provider chain (environment, profile, instance
// role). Nothing credential-related is logged.
//
// Like every provider, this one is single-shot: one SDK call per method, no
// retries of its own beyond the SDK's standard retry policy. Scheduling is
// owned by the driver.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_route53::Client;
use aws_sdk_route53::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_route53::operation::change_resource_record_sets::ChangeResourceRecordSetsError;
use aws_sdk_route53::types as r53;
use dnsync_core::error::{Error, RejectionReason, Result};
use dnsync_core::traits::{
    ChangeAction, ChangeBatch, ChangeId, DnsProvider, RecordSet, RecordType,
};
use std::time::Duration;
use tracing::{debug, info};

/// Delay between two `GetChange` polls
const DEFAULT_POLL_DELAY: Duration = Duration::from_secs(30);

/// Polls before giving up on propagation
const DEFAULT_MAX_POLLS: u32 = 60;

/// Records per `ListResourceRecordSets` page
const LIST_MAX_ITEMS: i32 = 300;

/// Route53 DNS provider
#[derive(Debug, Clone)]
pub struct Route53Provider {
    /// SDK client
    client: Client,

    /// Delay between propagation polls
    poll_delay: Duration,

    /// Maximum number of propagation polls
    max_polls: u32,
}

impl Route53Provider {
    /// Create a provider from an SDK client
    pub fn new(client: Client) -> Self {
        Self {
            client,
            poll_delay: DEFAULT_POLL_DELAY,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }

    /// Create a provider from the default AWS configuration chain
    pub async fn from_env() -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self::new(Client::new(&config))
    }

    /// Override how propagation is awaited
    pub fn with_polling(mut self, delay: Duration, max_polls: u32) -> Self {
        self.poll_delay = delay;
        self.max_polls = max_polls.max(1);
        self
    }
}

/// Convert a listed Route53 record set
pub fn from_sdk_record_set(record: &r53::ResourceRecordSet) -> RecordSet {
    let record_type = match record.r#type() {
        r53::RrType::A => RecordType::A,
        other => RecordType::Other(other.as_str().to_string()),
    };

    RecordSet {
        name: record.name().to_string(),
        record_type,
        ttl: record.ttl(),
        weight: record.weight(),
        set_identifier: record.set_identifier().map(str::to_string),
        health_check_id: record.health_check_id().map(str::to_string),
        values: record
            .resource_records()
            .iter()
            .map(|r| r.value().to_string())
            .collect(),
    }
}

/// Convert a record set for submission
pub fn to_sdk_record_set(record: &RecordSet) -> Result<r53::ResourceRecordSet> {
    let record_type = match &record.record_type {
        RecordType::A => r53::RrType::A,
        RecordType::Other(name) => r53::RrType::from(name.as_str()),
    };

    let values = record
        .values
        .iter()
        .map(|value| r53::ResourceRecord::builder().value(value).build())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::dns_provider(format!("Invalid record value: {}", e)))?;

    r53::ResourceRecordSet::builder()
        .name(&record.name)
        .r#type(record_type)
        .set_ttl(record.ttl)
        .set_weight(record.weight)
        .set_set_identifier(record.set_identifier.clone())
        .set_health_check_id(record.health_check_id.clone())
        .set_resource_records(Some(values))
        .build()
        .map_err(|e| Error::dns_provider(format!("Invalid record set {}: {}", record.name, e)))
}

/// Convert a change batch for submission
pub fn to_sdk_change_batch(batch: &ChangeBatch) -> Result<r53::ChangeBatch> {
    let changes = batch
        .changes
        .iter()
        .map(|change| {
            let action = match change.action {
                ChangeAction::Upsert => r53::ChangeAction::Upsert,
                ChangeAction::Delete => r53::ChangeAction::Delete,
            };
            r53::Change::builder()
                .action(action)
                .resource_record_set(to_sdk_record_set(&change.record)?)
                .build()
                .map_err(|e| Error::dns_provider(format!("Invalid change: {}", e)))
        })
        .collect::<Result<Vec<_>>>()?;

    r53::ChangeBatch::builder()
        .set_changes(Some(changes))
        .comment(&batch.comment)
        .build()
        .map_err(|e| Error::dns_provider(format!("Invalid change batch: {}", e)))
}

/// Classify why Route53 refused a change batch
pub fn rejection_reason(err: &ChangeResourceRecordSetsError) -> RejectionReason {
    match err {
        ChangeResourceRecordSetsError::NoSuchHostedZone(_) => RejectionReason::NoSuchHostedZone,
        ChangeResourceRecordSetsError::NoSuchHealthCheck(_) => RejectionReason::NoSuchHealthCheck,
        ChangeResourceRecordSetsError::InvalidChangeBatch(_) => {
            RejectionReason::InvalidChangeBatch
        }
        ChangeResourceRecordSetsError::InvalidInput(_) => RejectionReason::InvalidInput,
        ChangeResourceRecordSetsError::PriorRequestNotComplete(_) => {
            RejectionReason::PriorRequestNotComplete
        }
        other if other.code() == Some("Throttling") => RejectionReason::Throttled,
        _ => RejectionReason::Other,
    }
}

#[async_trait]
impl DnsProvider for Route53Provider {
    async fn list_records(&self, zone_id: &str, start_name: &str) -> Result<Vec<RecordSet>> {
        let output = self
            .client
            .list_resource_record_sets()
            .hosted_zone_id(zone_id)
            .start_record_name(start_name)
            .start_record_type(r53::RrType::A)
            .max_items(LIST_MAX_ITEMS)
            .send()
            .await
            .map_err(|e| {
                Error::dns_provider(format!(
                    "Failed to list records of {}: {}",
                    zone_id,
                    DisplayErrorContext(&e)
                ))
            })?;

        if output.is_truncated() {
            debug!(
                "Listing of {} truncated after {} records",
                zone_id,
                output.resource_record_sets().len()
            );
        }

        Ok(output
            .resource_record_sets()
            .iter()
            .map(from_sdk_record_set)
            .collect())
    }

    async fn apply_change_batch(&self, zone_id: &str, batch: &ChangeBatch) -> Result<ChangeId> {
        for change in &batch.changes {
            debug!(
                "{} {} {:?} -> {:?}",
                change.action, change.record.name, change.record.set_identifier, change.record.values
            );
        }

        let output = self
            .client
            .change_resource_record_sets()
            .hosted_zone_id(zone_id)
            .change_batch(to_sdk_change_batch(batch)?)
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                match &e {
                    SdkError::ServiceError(service) => {
                        Error::rejected(rejection_reason(service.err()), message)
                    }
                    _ => Error::dns_provider(message),
                }
            })?;

        let change_id = output
            .change_info()
            .map(|info| info.id().to_string())
            .ok_or_else(|| Error::dns_provider("Change response carries no change info"))?;

        info!("Route53 accepted change {}", change_id);
        Ok(ChangeId(change_id))
    }

    async fn await_change_complete(&self, change: &ChangeId) -> Result<()> {
        for attempt in 1..=self.max_polls {
            let output = self
                .client
                .get_change()
                .id(&change.0)
                .send()
                .await
                .map_err(|e| {
                    Error::change_incomplete(format!(
                        "Failed to get status of {}: {}",
                        change,
                        DisplayErrorContext(&e)
                    ))
                })?;

            let status = output.change_info().map(|info| info.status().clone());
            if status == Some(r53::ChangeStatus::Insync) {
                debug!("Change {} in sync after {} poll(s)", change, attempt);
                return Ok(());
            }

            debug!("Change {} still {:?}, poll {}/{}", change, status, attempt, self.max_polls);
            if attempt < self.max_polls {
                tokio::time::sleep(self.poll_delay).await;
            }
        }

        Err(Error::change_incomplete(format!(
            "{} not in sync after {} polls",
            change, self.max_polls
        )))
    }

    fn provider_name(&self) -> &'static str {
        "route53"
    }
}

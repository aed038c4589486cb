//! Test doubles and common utilities for contract tests
//!
//! The doubles keep their state behind `Arc`s so a test can hand one copy to
//! the code under test and inspect another.

#![allow(dead_code)]

use async_trait::async_trait;
use dnsync_core::config::{DriverConfig, ReconcileConfig};
use dnsync_core::error::{Error, RejectionReason, Result};
use dnsync_core::events::StatusUpdate;
use dnsync_core::traits::{
    AppSnapshot, ChangeAction, ChangeBatch, ChangeId, DnsProvider, EventReader, EventSource,
    InstanceDescriptor, RecordSet, SnapshotSource, TaskAddress, TaskState,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const ZONE: &str = "Z0000TEST";
pub const RECORD_SET: &str = "svc.example.com";
pub const APP_ID: &str = "/marathon-lb";

/// Hosted zone kept in memory, applying batches the way Route53 does
///
/// Names are stored with the trailing root dot. A delete must match the stored
/// record exactly or the whole batch is rejected.
pub struct InMemoryZone {
    records: Arc<Mutex<Vec<RecordSet>>>,
    batches: Arc<Mutex<Vec<ChangeBatch>>>,
    list_call_count: Arc<AtomicUsize>,
    apply_call_count: Arc<AtomicUsize>,
    await_call_count: Arc<AtomicUsize>,
    reject_with: Arc<Mutex<Option<RejectionReason>>>,
    fail_await: bool,
}

impl InMemoryZone {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            batches: Arc::new(Mutex::new(Vec::new())),
            list_call_count: Arc::new(AtomicUsize::new(0)),
            apply_call_count: Arc::new(AtomicUsize::new(0)),
            await_call_count: Arc::new(AtomicUsize::new(0)),
            reject_with: Arc::new(Mutex::new(None)),
            fail_await: false,
        }
    }

    /// Zone pre-populated with `records`
    pub fn with_records(records: Vec<RecordSet>) -> Self {
        let zone = Self::new();
        *zone.records.lock().unwrap() = records;
        zone
    }

    /// Never report a change as propagated
    pub fn failing_await(mut self) -> Self {
        self.fail_await = true;
        self
    }

    /// Create a new InMemoryZone that shares state with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            records: Arc::clone(&other.records),
            batches: Arc::clone(&other.batches),
            list_call_count: Arc::clone(&other.list_call_count),
            apply_call_count: Arc::clone(&other.apply_call_count),
            await_call_count: Arc::clone(&other.await_call_count),
            reject_with: Arc::clone(&other.reject_with),
            fail_await: other.fail_await,
        }
    }

    /// Reject every following batch with `reason`, or accept again with `None`
    pub fn reject_with(&self, reason: Option<RejectionReason>) {
        *self.reject_with.lock().unwrap() = reason;
    }

    pub fn records(&self) -> Vec<RecordSet> {
        self.records.lock().unwrap().clone()
    }

    pub fn batches(&self) -> Vec<ChangeBatch> {
        self.batches.lock().unwrap().clone()
    }

    pub fn list_call_count(&self) -> usize {
        self.list_call_count.load(Ordering::SeqCst)
    }

    pub fn apply_call_count(&self) -> usize {
        self.apply_call_count.load(Ordering::SeqCst)
    }

    pub fn await_call_count(&self) -> usize {
        self.await_call_count.load(Ordering::SeqCst)
    }

    /// `(name, set identifier, value)` of every stored record, sorted
    pub fn entries(&self) -> Vec<(String, Option<String>, String)> {
        let mut entries: Vec<_> = self
            .records()
            .into_iter()
            .map(|r| {
                let value = r.first_value().unwrap_or_default().to_string();
                (r.name, r.set_identifier, value)
            })
            .collect();
        entries.sort();
        entries
    }
}

fn fqdn(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{}.", name)
    }
}

/// Route53 lists by labels read right to left
fn zone_order(name: &str) -> Vec<String> {
    fqdn(name)
        .to_ascii_lowercase()
        .split('.')
        .rev()
        .map(str::to_string)
        .collect()
}

fn same_key(a: &RecordSet, b: &RecordSet) -> bool {
    fqdn(&a.name).eq_ignore_ascii_case(&fqdn(&b.name))
        && a.record_type == b.record_type
        && a.set_identifier == b.set_identifier
}

#[async_trait]
impl DnsProvider for InMemoryZone {
    async fn list_records(&self, _zone_id: &str, start_name: &str) -> Result<Vec<RecordSet>> {
        self.list_call_count.fetch_add(1, Ordering::SeqCst);

        let start = zone_order(start_name);
        let mut listed: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| zone_order(&r.name) >= start)
            .cloned()
            .collect();
        listed.sort_by_key(|r| zone_order(&r.name));
        Ok(listed)
    }

    async fn apply_change_batch(&self, _zone_id: &str, batch: &ChangeBatch) -> Result<ChangeId> {
        let n = self.apply_call_count.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(reason) = *self.reject_with.lock().unwrap() {
            return Err(Error::rejected(reason, "rejected by test zone"));
        }

        let mut records = self.records.lock().unwrap().clone();
        for change in &batch.changes {
            let mut record = change.record.clone();
            record.name = fqdn(&record.name);

            match change.action {
                ChangeAction::Delete => {
                    let Some(pos) = records.iter().position(|r| *r == record) else {
                        return Err(Error::rejected(
                            RejectionReason::InvalidChangeBatch,
                            format!("Tried to delete {} but it was not found", record.name),
                        ));
                    };
                    records.remove(pos);
                }
                ChangeAction::Upsert => {
                    records.retain(|r| !same_key(r, &record));
                    records.push(record);
                }
            }
        }

        *self.records.lock().unwrap() = records;
        self.batches.lock().unwrap().push(batch.clone());
        Ok(ChangeId(format!("/change/C{}", n)))
    }

    async fn await_change_complete(&self, change: &ChangeId) -> Result<()> {
        self.await_call_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_await {
            return Err(Error::change_incomplete(format!("{} still PENDING", change)));
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "in-memory"
    }
}

/// Snapshot source whose snapshot the test can replace at any time
pub struct StaticSnapshotSource {
    snapshot: Arc<Mutex<AppSnapshot>>,
    fetch_call_count: Arc<AtomicUsize>,
}

impl StaticSnapshotSource {
    pub fn new(snapshot: AppSnapshot) -> Self {
        Self {
            snapshot: Arc::new(Mutex::new(snapshot)),
            fetch_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            snapshot: Arc::clone(&other.snapshot),
            fetch_call_count: Arc::clone(&other.fetch_call_count),
        }
    }

    pub fn set(&self, snapshot: AppSnapshot) {
        *self.snapshot.lock().unwrap() = snapshot;
    }

    pub fn fetch_call_count(&self) -> usize {
        self.fetch_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotSource for StaticSnapshotSource {
    async fn fetch_snapshot(&self, _app_id: &str) -> Result<AppSnapshot> {
        self.fetch_call_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot.lock().unwrap().clone())
    }
}

/// Snapshot source whose orchestrator is unreachable
pub struct UnreachableSnapshotSource;

#[async_trait]
impl SnapshotSource for UnreachableSnapshotSource {
    async fn fetch_snapshot(&self, _app_id: &str) -> Result<AppSnapshot> {
        Err(Error::http("connection refused"))
    }
}

/// Event source replaying one scripted byte stream per subscription
///
/// Each stream ends after its bytes, like a connection Marathon closes. Once
/// the script runs out, subscribing fails.
pub struct ScriptedEventSource {
    streams: Arc<Mutex<VecDeque<Vec<u8>>>>,
    subscribe_call_count: Arc<AtomicUsize>,
}

impl ScriptedEventSource {
    pub fn new<I, S>(streams: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Vec<u8>>,
    {
        Self {
            streams: Arc::new(Mutex::new(streams.into_iter().map(Into::into).collect())),
            subscribe_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            streams: Arc::clone(&other.streams),
            subscribe_call_count: Arc::clone(&other.subscribe_call_count),
        }
    }

    pub fn subscribe_call_count(&self) -> usize {
        self.subscribe_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSource for ScriptedEventSource {
    async fn subscribe(&self) -> Result<EventReader> {
        self.subscribe_call_count.fetch_add(1, Ordering::SeqCst);
        match self.streams.lock().unwrap().pop_front() {
            Some(bytes) => {
                let reader: EventReader = Box::pin(std::io::Cursor::new(bytes));
                Ok(reader)
            }
            None => Err(Error::event_source("connection refused")),
        }
    }

    async fn probe(&self) -> Result<()> {
        Ok(())
    }
}

/// One framed status update for `app_id`
pub fn status_update_frame(app_id: &str, task_id: &str) -> String {
    format!(
        "event: status_update_event\r\n\
         data: {{\"appId\":\"{}\",\"taskId\":\"{}\",\"taskStatus\":\"TASK_RUNNING\"}}\r\n\r\n",
        app_id, task_id
    )
}

/// Snapshot with one running IPv4 task per address
pub fn running(addresses: &[&str]) -> AppSnapshot {
    AppSnapshot::new(
        addresses
            .iter()
            .enumerate()
            .map(|(i, address)| InstanceDescriptor {
                id: format!("marathon-lb.task-{}", i),
                state: TaskState::Running,
                addresses: vec![TaskAddress::new(*address, "IPv4")],
            })
            .collect(),
    )
}

/// Status update for `app_id`
pub fn status_update(app_id: &str, task_id: &str, state: TaskState) -> StatusUpdate {
    StatusUpdate {
        event_type: "status_update_event".to_string(),
        app_id: app_id.to_string(),
        task_id: task_id.to_string(),
        task_status: state,
        ..StatusUpdate::default()
    }
}

pub fn reconcile_config() -> ReconcileConfig {
    ReconcileConfig::new(ZONE, RECORD_SET)
}

/// Driver configuration with a short spacing for tests
pub fn driver_config() -> DriverConfig {
    DriverConfig {
        min_spacing_millis: 10,
        ..DriverConfig::new(APP_ID)
    }
}

//! Core traits for dnsync
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`SnapshotSource`]: Read the current tasks of an application
//! - [`EventSource`]: Subscribe to orchestrator events
//! - [`DnsProvider`]: List and change records of a hosted zone

pub mod dns_provider;
pub mod event_source;
pub mod snapshot_source;

pub use dns_provider::{
    Change, ChangeAction, ChangeBatch, ChangeId, DnsProvider, RECORD_TTL, RECORD_WEIGHT,
    RecordSet, RecordType,
};
pub use event_source::{EventReader, EventSource};
pub use snapshot_source::{AppSnapshot, InstanceDescriptor, SnapshotSource, TaskAddress, TaskState};

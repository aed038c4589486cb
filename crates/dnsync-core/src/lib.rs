// # dnsync-core
//
// Core library for keeping a Route53 record set in sync with the running
// tasks of a Marathon application.
//
// ## Architecture Overview
//
// - **SnapshotSource**: Trait for reading the tasks of an application
// - **EventSource**: Trait for subscribing to the orchestrator's event stream
// - **DnsProvider**: Trait for listing and changing records of a hosted zone
// - **events**: Stream parser and status update classifier
// - **Reconciler**: Converges the zone onto a set of addresses
// - **Driver**: Loop that reconciles on status updates and on an interval
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from the Marathon and
//    Route53 clients
// 2. **Event-Driven**: Status updates wake the driver, the interval is a ceiling
// 3. **Library-First**: All core functionality can be used as a library
// 4. **Idempotency**: Record identity depends on the address set only

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod traits;

// Re-export core types for convenience
pub use config::{DriverConfig, ReconcileConfig, RecordStrategy, normalize_app_id, parse_strategies};
pub use engine::{Driver, DriverEvent, ReconcileReport, Reconciler, WakeReason};
pub use error::{Error, RejectionReason, Result};
pub use events::{
    EventPipeline, ParseError, RawEvent, StatusUpdate, spawn_pipeline, spawn_subscription,
};
pub use traits::{DnsProvider, EventSource, SnapshotSource};

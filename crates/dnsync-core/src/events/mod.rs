//! Event ingestion: raw stream parsing and classification
//!
//! ```text
//! EventReader ─▶ parser task ─ RawEvent ─▶ classifier task ─ StatusUpdate ─▶ Driver
//!                     │
//!                     └─ ParseError ─▶ (caller)
//! ```
//!
//! Both tasks stop when the shared [`CancellationToken`] fires.
//! [`spawn_subscription`] keeps a pipeline running across reconnects.

pub mod classifier;
pub mod parser;
pub mod status_update;
pub mod subscription;

pub use classifier::{classify, spawn_classifier};
pub use parser::{EventStream, ParseError, ParserOptions, RawEvent, spawn_parser};
pub use status_update::{STATUS_UPDATE_EVENT, StatusUpdate};
pub use subscription::spawn_subscription;

use tokio::io::AsyncBufRead;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::DriverConfig;

/// Running parser and classifier for one subscription
#[derive(Debug)]
pub struct EventPipeline {
    /// Status updates for the configured app
    pub updates: mpsc::Receiver<StatusUpdate>,
    /// Parse failures
    pub errors: mpsc::Receiver<ParseError>,
    /// Parser task
    pub parser: JoinHandle<()>,
    /// Classifier task
    pub classifier: JoinHandle<()>,
}

/// Spawn the parser and classifier over `reader`
pub fn spawn_pipeline<R>(reader: R, config: &DriverConfig, cancel: CancellationToken) -> EventPipeline
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let options = ParserOptions {
        event_capacity: config.event_channel_capacity,
        error_capacity: config.error_channel_capacity,
        ..ParserOptions::default()
    };

    let stream = spawn_parser(reader, options, cancel.clone());
    let (updates, classifier) = spawn_classifier(
        stream.events,
        config.app_id.clone(),
        config.event_channel_capacity,
        cancel,
    );

    EventPipeline {
        updates,
        errors: stream.errors,
        parser: stream.handle,
        classifier,
    }
}

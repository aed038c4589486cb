//! Event classifier
//!
//! Narrows the raw event stream down to status updates of one application.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::parser::RawEvent;
use super::status_update::{STATUS_UPDATE_EVENT, StatusUpdate};

/// Decode `event` if it is a status update for `app_id`
///
/// Payloads that fail to deserialize are logged and dropped.
pub fn classify(event: &RawEvent, app_id: &str) -> Option<StatusUpdate> {
    if event.event_type != STATUS_UPDATE_EVENT {
        return None;
    }

    let update: StatusUpdate = match serde_json::from_slice(&event.payload) {
        Ok(update) => update,
        Err(e) => {
            warn!("Dropping undecodable {}: {}", STATUS_UPDATE_EVENT, e);
            return None;
        }
    };

    if update.app_id != app_id {
        debug!("Ignoring status update for {}", update.app_id);
        return None;
    }

    Some(update)
}

/// Start classifying `events` on a new task
///
/// Relevant updates are forwarded in arrival order. The returned channel
/// closes when `events` closes or `cancel` fires.
pub fn spawn_classifier(
    mut events: mpsc::Receiver<RawEvent>,
    app_id: impl Into<String>,
    capacity: usize,
    cancel: CancellationToken,
) -> (mpsc::Receiver<StatusUpdate>, JoinHandle<()>) {
    let app_id = app_id.into();
    let (tx, rx) = mpsc::channel(capacity);

    let handle = tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            let Some(update) = classify(&event, &app_id) else {
                continue;
            };

            debug!(
                task_id = %update.task_id,
                status = ?update.task_status,
                "Status update for {}", app_id
            );

            let forwarded = tokio::select! {
                biased;
                _ = cancel.cancelled() => false,
                sent = tx.send(update) => sent.is_ok(),
            };
            if !forwarded {
                break;
            }
        }

        debug!("Event classifier stopped");
    });

    (rx, handle)
}

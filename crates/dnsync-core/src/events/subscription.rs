//! Long-lived event subscription
//!
//! Marathon closes `/v2/events` on leader changes and restarts. The
//! subscription task reopens the stream whenever it ends or cannot be opened,
//! one interval apart, and forwards the status updates of every subscription
//! onto a single channel that outlives them.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::status_update::StatusUpdate;
use super::{EventPipeline, spawn_pipeline};
use crate::config::DriverConfig;
use crate::traits::EventSource;

/// Subscribe to `source` on a new task, resubscribing until `cancel` fires
///
/// Parse failures are logged at warn. The returned channel closes only when
/// the task stops: on cancellation or once the receiver is dropped.
pub fn spawn_subscription(
    source: Arc<dyn EventSource>,
    config: &DriverConfig,
    cancel: CancellationToken,
) -> (mpsc::Receiver<StatusUpdate>, JoinHandle<()>) {
    let config = config.clone();
    let (tx, rx) = mpsc::channel(config.event_channel_capacity);

    let handle = tokio::spawn(async move {
        let mut subscriptions: u64 = 0;

        loop {
            let subscribed = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                subscribed = source.subscribe() => subscribed,
            };

            match subscribed {
                Ok(reader) => {
                    subscriptions += 1;
                    info!(subscriptions, "Subscribed to event stream");

                    let pipeline = spawn_pipeline(reader, &config, cancel.clone());
                    if !forward(pipeline, &tx, &cancel).await {
                        break;
                    }
                    warn!(
                        "Event stream closed, resubscribing in {}s",
                        config.interval_secs
                    );
                }
                Err(e) => warn!("{}; retrying in {}s", e, config.interval_secs),
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(config.interval()) => {}
            }
        }

        debug!("Event subscription stopped");
    });

    (rx, handle)
}

/// Forward one pipeline's updates until it ends
///
/// Returns false when nothing should be forwarded anymore (cancelled, or the
/// receiver is gone).
async fn forward(
    mut pipeline: EventPipeline,
    tx: &mpsc::Sender<StatusUpdate>,
    cancel: &CancellationToken,
) -> bool {
    let mut errors_open = true;

    let keep_going = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break false,
            err = pipeline.errors.recv(), if errors_open => match err {
                Some(e) => warn!("Event stream: {}", e),
                None => errors_open = false,
            },
            update = pipeline.updates.recv() => {
                let Some(update) = update else {
                    break true;
                };
                let sent = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => false,
                    sent = tx.send(update) => sent.is_ok(),
                };
                if !sent {
                    break false;
                }
            }
        }
    };

    while let Ok(e) = pipeline.errors.try_recv() {
        warn!("Event stream: {}", e);
    }
    if !keep_going {
        pipeline.parser.abort();
        pipeline.classifier.abort();
    }
    let _ = pipeline.parser.await;
    let _ = pipeline.classifier.await;

    keep_going
}

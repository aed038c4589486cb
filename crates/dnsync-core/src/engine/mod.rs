//! Core dnsync engine
//!
//! The [`Driver`] is responsible for:
//! - Fetching the application snapshot
//! - Reconciling the hosted zone onto the snapshot's addresses
//! - Waiting for the next relevant status update (or the interval)
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐
//! │ StatusUpdate   │─── wakeup ───┐
//! │ channel        │              │
//! └────────────────┘              ▼
//!                        ┌──────────────┐
//!                        │    Driver    │
//!                        └──────────────┘
//!                                 │
//!          ┌──────────────────────┼──────────────────────┐
//!          │                      │                      │
//!          ▼                      ▼                      ▼
//! ┌─────────────────┐    ┌──────────────┐       ┌─────────────┐
//! │ SnapshotSource  │    │  Reconciler  │       │   Events    │
//! │ (fetch)         │    │  (converge)  │       │  (notify)   │
//! └─────────────────┘    └──────────────┘       └─────────────┘
//! ```
//!
//! ## Loop
//!
//! 1. Reconcile: fetch snapshot, compute addresses, reconcile
//! 2. Fatal error: cancel the event tasks and return the error
//! 3. Wait: sleep the minimum spacing, then wait for one status update or the
//!    interval, whichever comes first
//! 4. Back to 1

pub mod reconcile;

pub use reconcile::{EnumeratedName, ReconcileReport, Reconciler, plan_changes};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::DriverConfig;
use crate::error::{Error, Result};
use crate::events::StatusUpdate;
use crate::traits::SnapshotSource;

/// What ended a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// A status update for the app arrived
    StatusUpdate,
    /// The interval elapsed
    Interval,
}

/// Events emitted by the Driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    /// Driver started
    Started {
        app_id: String,
    },

    /// Reconciliation succeeded
    Reconciled {
        addresses: usize,
        deletes: usize,
        upserts: usize,
        completed: bool,
    },

    /// Reconciliation failed and will be retried
    ReconcileFailed {
        error: String,
    },

    /// Driver left the waiting state
    Woke {
        reason: WakeReason,
    },

    /// Driver stopped
    Stopped {
        reason: String,
    },
}

/// Core dnsync driver
///
/// Runs reconciliations one after the other, never concurrently, until it is
/// cancelled or hits a fatal error.
pub struct Driver {
    /// Source of application snapshots
    snapshots: Box<dyn SnapshotSource>,

    /// Zone reconciler
    reconciler: Reconciler,

    /// App id, interval and spacing
    config: DriverConfig,

    /// Status updates for the app; `None` in interval-only mode
    updates: Option<mpsc::Receiver<StatusUpdate>>,

    /// Shared with the event tasks
    cancel: CancellationToken,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<DriverEvent>,
}

impl Driver {
    /// Create a new driver
    ///
    /// # Returns
    ///
    /// A tuple of (driver, event_receiver) where event_receiver yields driver events
    pub fn new(
        snapshots: Box<dyn SnapshotSource>,
        reconciler: Reconciler,
        config: DriverConfig,
        cancel: CancellationToken,
    ) -> Result<(Self, mpsc::Receiver<DriverEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let driver = Self {
            snapshots,
            reconciler,
            config,
            updates: None,
            cancel,
            event_tx: tx,
        };

        Ok((driver, rx))
    }

    /// Wake up on status updates from `updates` as well as on the interval
    pub fn with_updates(mut self, updates: mpsc::Receiver<StatusUpdate>) -> Self {
        self.updates = Some(updates);
        self
    }

    /// Run the driver
    ///
    /// # Returns
    ///
    /// - `Ok(())`: the cancellation token fired
    /// - `Err(Error)`: fatal error; the token has been cancelled
    pub async fn run(mut self) -> Result<()> {
        info!("Starting driver for {}", self.config.app_id);
        self.emit_event(DriverEvent::Started {
            app_id: self.config.app_id.clone(),
        });

        let cancel = self.cancel.clone();

        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                outcome = self.reconcile_once() => Some(outcome),
            };

            match outcome {
                None => break,
                Some(Ok(())) => {}
                Some(Err(e)) if e.is_fatal() => {
                    error!("Fatal error for {}: {}", self.config.app_id, e);
                    self.cancel.cancel();
                    self.stop(&e.to_string());
                    return Err(e);
                }
                Some(Err(e)) => {
                    warn!("Reconciliation failed, retrying next cycle: {}", e);
                    self.emit_event(DriverEvent::ReconcileFailed {
                        error: e.to_string(),
                    });
                }
            }

            match self.wait().await {
                Some(reason) => {
                    debug!("Woke up: {:?}", reason);
                    self.emit_event(DriverEvent::Woke { reason });
                }
                None => break,
            }
        }

        self.stop("Cancelled");
        Ok(())
    }

    /// One pass: snapshot, addresses, reconcile
    async fn reconcile_once(&self) -> Result<()> {
        let app_id = &self.config.app_id;

        let snapshot = self
            .snapshots
            .fetch_snapshot(app_id)
            .await
            .map_err(|e| match e {
                Error::Snapshot(_) => e,
                other => Error::snapshot(format!("Unable to fetch {}: {}", app_id, other)),
            })?;
        debug!("Fetched {} task(s) for {}", snapshot.instances.len(), app_id);

        let desired = snapshot.desired_addresses();
        let report = self.reconciler.reconcile(&desired).await?;

        self.emit_event(DriverEvent::Reconciled {
            addresses: desired.len(),
            deletes: report.deletes,
            upserts: report.upserts,
            completed: report.completed,
        });
        Ok(())
    }

    /// Wait for the next cycle; `None` once cancelled
    async fn wait(&mut self) -> Option<WakeReason> {
        let cancel = self.cancel.clone();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(self.config.min_spacing()) => {}
        }

        let interval = tokio::time::sleep(self.config.interval());
        tokio::pin!(interval);

        loop {
            let Some(updates) = self.updates.as_mut() else {
                return tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    _ = &mut interval => Some(WakeReason::Interval),
                };
            };

            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                update = updates.recv() => update,
                _ = &mut interval => return Some(WakeReason::Interval),
            };

            match received {
                Some(update) => {
                    info!(
                        task_id = %update.task_id,
                        status = ?update.task_status,
                        "Status update received for {}", self.config.app_id
                    );
                    return Some(WakeReason::StatusUpdate);
                }
                None => {
                    warn!("Event stream closed, falling back to interval-only mode");
                    self.updates = None;
                }
            }
        }
    }

    fn stop(&self, reason: &str) {
        info!("Driver stopped: {}", reason);
        self.emit_event(DriverEvent::Stopped {
            reason: reason.to_string(),
        });
    }

    /// Emit a driver event
    fn emit_event(&self, event: DriverEvent) {
        if self.event_tx.try_send(event).is_err() {
            debug!("Driver event channel full or closed, dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_events_compare() {
        let event = DriverEvent::Woke {
            reason: WakeReason::StatusUpdate,
        };
        assert_eq!(event.clone(), event);
        assert_ne!(
            event,
            DriverEvent::Woke {
                reason: WakeReason::Interval
            }
        );
    }
}

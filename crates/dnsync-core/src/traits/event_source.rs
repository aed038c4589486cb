// # Event Source Trait
//
// Defines the interface for subscribing to the orchestrator's event stream.
//
// ## Implementations
//
// - Marathon `/v2/events`: `dnsync-marathon` crate
//
// The subscription is handed to [`crate::events::spawn_parser`] as a raw
// byte reader; this trait knows nothing about framing.

use async_trait::async_trait;
use std::pin::Pin;
use tokio::io::AsyncBufRead;

/// Byte stream of an event subscription
pub type EventReader = Pin<Box<dyn AsyncBufRead + Send>>;

/// Trait for event stream implementations
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Open a new subscription
    async fn subscribe(&self) -> Result<EventReader, crate::Error>;

    /// Liveness probe: is the event source still reachable?
    async fn probe(&self) -> Result<(), crate::Error>;
}

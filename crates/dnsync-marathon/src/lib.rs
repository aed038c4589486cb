// # Marathon Client
//
// This crate talks to the Marathon REST API for dnsync.
//
// ## Endpoints
//
// - `GET /v2/apps/{id}`: the app and its tasks ([`SnapshotSource`])
// - `GET /v2/events`: the event bus as a line-framed stream ([`EventSource`])
// - `GET /ping`: liveness of Marathon itself
//
// The event stream is handed to the core parser as an `AsyncBufRead`; this
// crate does no framing of its own.

use async_trait::async_trait;
use dnsync_core::error::{Error, Result};
use dnsync_core::events::STATUS_UPDATE_EVENT;
use dnsync_core::traits::{AppSnapshot, EventReader, EventSource, InstanceDescriptor, SnapshotSource};
use reqwest::header::{ACCEPT, CACHE_CONTROL, HeaderValue};
use serde::Deserialize;
use std::time::Duration;
use tokio_stream::StreamExt;
use tokio_util::io::StreamReader;
use tracing::{debug, info};

/// Default Marathon endpoint inside a DC/OS cluster
pub const DEFAULT_MARATHON_HOST: &str = "http://marathon.mesos:8080";

/// Timeout of snapshot and ping requests
const REQUEST_TIMEOUT_SECS: u64 = 5;

/// Connect timeout of the event subscription; the stream itself never times out
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Body of `GET /v2/apps/{id}`
#[derive(Debug, Deserialize)]
struct AppResponse {
    app: AppBody,
}

#[derive(Debug, Deserialize)]
struct AppBody {
    #[serde(default)]
    id: String,
    #[serde(default)]
    tasks: Vec<InstanceDescriptor>,
}

/// Decode the body of `GET /v2/apps/{id}` into a snapshot
pub fn parse_app_response(body: &[u8]) -> Result<AppSnapshot> {
    let response: AppResponse = serde_json::from_slice(body)?;
    debug!(
        "App {} has {} task(s)",
        response.app.id,
        response.app.tasks.len()
    );
    Ok(AppSnapshot::new(response.app.tasks))
}

/// Marathon REST client
#[derive(Debug, Clone)]
pub struct MarathonClient {
    /// Base URL without trailing slash
    host: String,

    /// Client for short requests
    client: reqwest::Client,

    /// Client for the long-lived event stream
    stream_client: reqwest::Client,
}

impl MarathonClient {
    /// Create a client for the Marathon at `host`, e.g. `http://marathon.mesos:8080`
    pub fn new(host: &str) -> Result<Self> {
        let host = host.trim().trim_end_matches('/');
        if host.is_empty() {
            return Err(Error::config("Marathon host cannot be empty"));
        }
        if !host.starts_with("http://") && !host.starts_with("https://") {
            return Err(Error::config(format!(
                "Marathon host must be an http(s) URL, got '{}'",
                host
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        let stream_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            host: host.to_string(),
            client,
            stream_client,
        })
    }

    /// Base URL of this client
    pub fn host(&self) -> &str {
        &self.host
    }

    /// URL of the app resource for `app_id` (with or without leading `/`)
    pub fn app_url(&self, app_id: &str) -> String {
        format!("{}/v2/apps/{}", self.host, app_id.trim_start_matches('/'))
    }

    /// URL of the event bus, filtered to status updates
    pub fn events_url(&self) -> String {
        format!("{}/v2/events?event_type={}", self.host, STATUS_UPDATE_EVENT)
    }

    fn ping_url(&self) -> String {
        format!("{}/ping", self.host)
    }
}

#[async_trait]
impl SnapshotSource for MarathonClient {
    async fn fetch_snapshot(&self, app_id: &str) -> Result<AppSnapshot> {
        let url = self.app_url(app_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::snapshot(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::snapshot(format!(
                "Received non-2XX status {} from {}",
                status, url
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::snapshot(format!("Failed to read response from {}: {}", url, e)))?;

        parse_app_response(&body)
            .map_err(|e| Error::snapshot(format!("Invalid app response from {}: {}", url, e)))
    }
}

#[async_trait]
impl EventSource for MarathonClient {
    async fn subscribe(&self) -> Result<EventReader> {
        let url = self.events_url();

        let response = self
            .stream_client
            .get(&url)
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
            .send()
            .await
            .map_err(|e| Error::event_source(format!("Subscription to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::event_source(format!(
                "Received non-2XX status {} from {}",
                status, url
            )));
        }

        info!("Subscribed to Marathon events at {}", url);

        let bytes = response.bytes_stream().map(|chunk| chunk.map_err(std::io::Error::other));
        Ok(Box::pin(StreamReader::new(bytes)))
    }

    async fn probe(&self) -> Result<()> {
        let url = self.ping_url();

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::http(format!("Ping to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::http(format!(
                "Ping to {} returned {}",
                url,
                response.status()
            )));
        }
        Ok(())
    }
}

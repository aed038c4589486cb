//! Event stream parser
//!
//! Decodes the line-framed event protocol served by Marathon's `/v2/events`:
//!
//! ```text
//! event: status_update_event\r\n
//! data: {"appId":"/marathon-lb", ...}\r\n
//! \r\n
//! ```
//!
//! A bare line terminator where a header is expected is a keep-alive. The
//! parser owns the reader in its own task and talks to the caller only through
//! an events channel and an errors channel.

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// One framed event: its type and its opaque payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Value of the header line
    pub event_type: String,
    /// Value of the data line
    pub payload: Vec<u8>,
}

impl RawEvent {
    /// Create a raw event
    pub fn new(event_type: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            event_type: event_type.into(),
            payload: payload.into(),
        }
    }
}

/// A frame that could not be decoded, or a failed read
#[derive(Debug, Error)]
pub enum ParseError {
    /// Reading from the stream failed
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),

    /// A line without a `field: value` shape
    #[error("malformed line: {0:?}")]
    MalformedLine(String),

    /// The header was followed by a blank line instead of data
    #[error("event '{event_type}' has no data line")]
    MissingPayload {
        /// Type from the header line
        event_type: String,
    },

    /// The data line was not followed by a blank line
    #[error("expected blank line after event '{event_type}', got {line:?}")]
    MissingDelimiter {
        /// Type of the event that was emitted
        event_type: String,
        /// The line found instead; parsed as the next header
        line: String,
    },

    /// The stream ended; no further events follow
    #[error("end of stream")]
    EndOfStream,
}

/// Tuning for [`spawn_parser`]
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Capacity of the events channel
    pub event_capacity: usize,
    /// Capacity of the errors channel; failures beyond it are dropped
    pub error_capacity: usize,
    /// Consecutive read errors after which the stream is considered dead
    pub max_consecutive_read_errors: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            event_capacity: 64,
            error_capacity: 16,
            max_consecutive_read_errors: 8,
        }
    }
}

/// Receiving side of a running parser
///
/// Both channels close when the parser stops: at the end of the stream (after
/// reporting [`ParseError::EndOfStream`]), once the stream is dead, or on
/// cancellation.
#[derive(Debug)]
pub struct EventStream {
    /// Decoded events, in stream order
    pub events: mpsc::Receiver<RawEvent>,
    /// Parse failures
    pub errors: mpsc::Receiver<ParseError>,
    /// The parser task
    pub handle: JoinHandle<()>,
}

/// Start parsing `reader` on a new task
pub fn spawn_parser<R>(reader: R, options: ParserOptions, cancel: CancellationToken) -> EventStream
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let (events_tx, events) = mpsc::channel(options.event_capacity);
    let (errors_tx, errors) = mpsc::channel(options.error_capacity);

    let parser = Parser {
        reader,
        pending: None,
        events: events_tx,
        errors: errors_tx,
        cancel,
        consecutive_read_errors: 0,
        max_consecutive_read_errors: options.max_consecutive_read_errors,
    };

    let handle = tokio::spawn(parser.run());

    EventStream {
        events,
        errors,
        handle,
    }
}

enum Line {
    Text(String),
    End,
    Cancelled,
}

struct Parser<R> {
    reader: R,
    /// A line read as a delimiter that turned out to be the next header
    pending: Option<String>,
    events: mpsc::Sender<RawEvent>,
    errors: mpsc::Sender<ParseError>,
    cancel: CancellationToken,
    consecutive_read_errors: usize,
    max_consecutive_read_errors: usize,
}

impl<R> Parser<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn run(mut self) {
        debug!("Event stream parser started");

        loop {
            let header = match self.next_line().await {
                Line::Text(line) => line,
                Line::End | Line::Cancelled => break,
            };

            if is_blank(&header) {
                trace!("Keep-alive received");
                continue;
            }

            let Some(event_type) = field_value(&header) else {
                self.report(ParseError::MalformedLine(header));
                continue;
            };
            let event_type = event_type.to_string();

            let data = match self.next_line().await {
                Line::Text(line) => line,
                Line::End | Line::Cancelled => break,
            };

            if is_blank(&data) {
                self.report(ParseError::MissingPayload { event_type });
                continue;
            }

            let Some(payload) = field_value(&data) else {
                self.report(ParseError::MalformedLine(data));
                continue;
            };
            let event = RawEvent::new(event_type, payload.as_bytes());

            match self.next_line().await {
                Line::Text(line) if is_blank(&line) => {}
                Line::Text(line) => {
                    self.report(ParseError::MissingDelimiter {
                        event_type: event.event_type.clone(),
                        line: line.clone(),
                    });
                    self.pending = Some(line);
                }
                // The frame was complete apart from its delimiter
                Line::End => {
                    self.emit(event).await;
                    break;
                }
                Line::Cancelled => break,
            }

            if !self.emit(event).await {
                break;
            }
        }

        debug!("Event stream parser stopped");
    }

    async fn next_line(&mut self) -> Line {
        if let Some(line) = self.pending.take() {
            return Line::Text(line);
        }

        loop {
            let mut line = String::new();
            let read = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Line::Cancelled,
                read = self.reader.read_line(&mut line) => read,
            };

            match read {
                Ok(0) => {
                    info!("Event stream ended");
                    self.report(ParseError::EndOfStream);
                    return Line::End;
                }
                Ok(_) => {
                    self.consecutive_read_errors = 0;
                    return Line::Text(line);
                }
                Err(e) => {
                    self.consecutive_read_errors += 1;
                    self.report(ParseError::Io(e));

                    if self.consecutive_read_errors >= self.max_consecutive_read_errors {
                        warn!(
                            "Event stream failed {} reads in a row, giving up",
                            self.consecutive_read_errors
                        );
                        return Line::End;
                    }
                }
            }
        }
    }

    /// Forward an event; returns false once nobody can receive it anymore
    async fn emit(&mut self, event: RawEvent) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.events.send(event) => sent.is_ok(),
        }
    }

    fn report(&self, err: ParseError) {
        debug!("Event stream parse failure: {}", err);
        match self.errors.try_send(err) {
            Ok(()) => {}
            Err(TrySendError::Full(err)) => {
                warn!("Parse error channel full, dropping: {}", err);
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

fn is_blank(line: &str) -> bool {
    line == "\r\n" || line == "\n"
}

/// Value of a `field: value` line, trimmed; `None` without a colon
fn field_value(line: &str) -> Option<&str> {
    line.split_once(':').map(|(_, value)| value.trim())
}

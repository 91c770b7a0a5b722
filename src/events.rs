//! Console event channel between the supervisor (producer) and the
//! owning application's polling loop (sole consumer).
//!
//! Every status, progress and error message from the resolver and the
//! supervisor travels through this one channel as a discrete text event.
//! The queue is unbounded; backpressure is not a concern because the
//! consumer drains on a short fixed interval.

use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;

/// Severity of a console event. The underlying channel stays a plain
/// text pipe; severity is a tag the consumer may use for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

/// A single line of console output destined for the consumer.
#[derive(Debug, Clone)]
pub struct ConsoleEvent {
    /// Unix timestamp (seconds)
    pub timestamp: u64,
    pub severity: Severity,
    pub text: String,
}

impl ConsoleEvent {
    fn new(severity: Severity, text: String) -> Self {
        Self {
            timestamp: current_timestamp(),
            severity,
            text,
        }
    }
}

/// Producer handle. Cheap to clone; every component that needs to report
/// status holds one of these instead of touching shared state.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<ConsoleEvent>,
}

impl EventSink {
    pub fn info(&self, text: impl Into<String>) {
        self.push(Severity::Info, text.into());
    }

    pub fn warn(&self, text: impl Into<String>) {
        self.push(Severity::Warn, text.into());
    }

    pub fn error(&self, text: impl Into<String>) {
        self.push(Severity::Error, text.into());
    }

    fn push(&self, severity: Severity, text: String) {
        // A send error only means the consumer is gone (application is
        // closing); drop the event rather than propagate.
        let _ = self.tx.send(ConsoleEvent::new(severity, text));
    }
}

/// Consumer side. There is exactly one of these per application.
pub struct ConsoleQueue {
    rx: mpsc::UnboundedReceiver<ConsoleEvent>,
}

impl ConsoleQueue {
    /// Drain everything currently queued without blocking. Used by the
    /// polling loop; returns an empty vec when nothing is pending.
    pub fn drain(&mut self) -> Vec<ConsoleEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = self.rx.try_recv() {
            out.push(ev);
        }
        out
    }

    /// Await a single event. Returns `None` once all producers are gone.
    pub async fn recv(&mut self) -> Option<ConsoleEvent> {
        self.rx.recv().await
    }
}

/// Create a connected sink/queue pair.
pub fn channel() -> (EventSink, ConsoleQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx }, ConsoleQueue { rx })
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

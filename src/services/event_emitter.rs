//! Per-request progress event sink.
//!
//! Wraps an unbounded mpsc sender and enforces the stream contract: at most
//! one terminal event, nothing after it, and a vanished receiver never
//! fails the request.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::domain::models::ProgressEvent;

#[derive(Debug)]
pub struct EventEmitter {
    sender: Option<mpsc::UnboundedSender<ProgressEvent>>,
    terminated: AtomicBool,
    emitted: AtomicU64,
}

impl EventEmitter {
    pub fn new(sender: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self {
            sender: Some(sender),
            terminated: AtomicBool::new(false),
            emitted: AtomicU64::new(0),
        }
    }

    /// An emitter together with the receiving end of its stream.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// An emitter that drops every event. Terminal bookkeeping still applies.
    pub fn disabled() -> Self {
        Self {
            sender: None,
            terminated: AtomicBool::new(false),
            emitted: AtomicU64::new(0),
        }
    }

    /// Send `event`. Returns whether it was accepted into the stream.
    pub fn emit(&self, event: ProgressEvent) -> bool {
        if event.is_terminal() {
            if self.terminated.swap(true, Ordering::SeqCst) {
                debug!(event_type = event.event_type(), "second terminal event suppressed");
                return false;
            }
        } else if self.terminated.load(Ordering::SeqCst) {
            debug!(event_type = event.event_type(), "event after terminal suppressed");
            return false;
        }

        self.emitted.fetch_add(1, Ordering::Relaxed);
        let Some(sender) = &self.sender else {
            return true;
        };
        let event_type = event.event_type();
        if sender.send(event).is_err() {
            trace!(event_type, "progress receiver closed");
        }
        true
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Number of events accepted so far.
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }
}

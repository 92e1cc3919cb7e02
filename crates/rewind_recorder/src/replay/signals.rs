//! Named playback signals.
//!
//! Only the engine's tick loop changes the pending-signal set. Code that does
//! not hold the engine (the application under test, a loading callback) posts
//! requests through a [`SignalHandle`]; they are applied at the start of the
//! next tick.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// A request queued for the next tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignalRequest {
    /// Hold playback until the signal is sent.
    Pause(String),
    /// Clear a pending signal.
    Send(String),
}

/// Cloneable handle for posting signals to a running engine.
#[derive(Clone, Debug, Default)]
pub struct SignalHandle {
    queue: Arc<Mutex<VecDeque<SignalRequest>>>,
}

impl SignalHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self, signal: impl Into<String>) {
        self.queue.lock().push_back(SignalRequest::Pause(signal.into()));
    }

    pub fn send_signal(&self, signal: impl Into<String>) {
        self.queue.lock().push_back(SignalRequest::Send(signal.into()));
    }

    pub(crate) fn drain(&self) -> Vec<SignalRequest> {
        self.queue.lock().drain(..).collect()
    }

    pub fn has_pending_requests(&self) -> bool {
        !self.queue.lock().is_empty()
    }
}

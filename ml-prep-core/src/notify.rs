//! Progress notification
//!
//! Parsers report human-readable progress through a [`Notifier`] supplied by
//! the host. The exact strings are part of the public contract.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Target used when forwarding progress messages to `tracing`
pub const PROGRESS_TARGET: &str = "ml_prep::progress";

/// Sink for human-readable progress messages
pub trait Notifier: Send + Sync {
    /// Deliver one message
    fn send(&self, message: &str);
}

impl<N: Notifier + ?Sized> Notifier for &N {
    fn send(&self, message: &str) {
        (**self).send(message);
    }
}

impl<N: Notifier + ?Sized> Notifier for std::sync::Arc<N> {
    fn send(&self, message: &str) {
        (**self).send(message);
    }
}

/// Forwards every message to `tracing` at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn send(&self, message: &str) {
        tracing::info!(target: PROGRESS_TARGET, "{}", message);
    }
}

/// Drops every message
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn send(&self, _message: &str) {}
}

/// Records messages in order
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    /// Messages received so far
    messages: Mutex<Vec<String>>,
}

impl CollectingNotifier {
    /// Create a new, empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the messages received so far
    pub fn messages(&self) -> Vec<String> {
        match self.messages.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Notifier for CollectingNotifier {
    fn send(&self, message: &str) {
        let mut guard = match self.messages.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push(message.to_string());
    }
}

/// Rate limiter for periodic "N lines parsed." messages
#[derive(Debug)]
pub struct ProgressThrottle {
    /// Minimum time between two messages
    interval: Duration,

    /// When the last message went out
    last: Instant,
}

impl ProgressThrottle {
    /// Create a new throttle; the first message is due after one interval
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Instant::now(),
        }
    }

    /// Report the line count if the interval has elapsed
    pub fn lines_parsed(&mut self, notifier: &dyn Notifier, lines: usize) {
        if self.last.elapsed() >= self.interval {
            notifier.send(&format!("{lines} lines parsed."));
            self.last = Instant::now();
        }
    }
}

/// Pluralize "row"/"sample" the way progress messages do
pub fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

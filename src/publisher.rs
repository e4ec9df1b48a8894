//! Consume-format-send loop.
//!
//! Each `Publisher` owns one transport and one formatter and runs on its own
//! thread. Publishers share the result queue and race for its slot; none of
//! them can stall another or the producer.

use std::sync::Arc;
use std::time::Duration;

use crate::detect::DetectionResult;
use crate::format::MessageFormatter;
use crate::queue::ResultQueue;
use crate::shutdown::Shutdown;
use crate::transport::Transport;

/// What happened to one result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    Sent,
    Failed,
    /// Transport reported not connected; nothing was attempted.
    Disconnected,
    /// Formatter produced an empty message.
    Suppressed,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PublisherStats {
    pub sent: u64,
    pub failed: u64,
    pub disconnected: u64,
    pub suppressed: u64,
}

impl PublisherStats {
    fn record(&mut self, outcome: PublishOutcome) {
        match outcome {
            PublishOutcome::Sent => self.sent += 1,
            PublishOutcome::Failed => self.failed += 1,
            PublishOutcome::Disconnected => self.disconnected += 1,
            PublishOutcome::Suppressed => self.suppressed += 1,
        }
    }

    pub fn attempts(&self) -> u64 {
        self.sent + self.failed + self.disconnected + self.suppressed
    }
}

pub struct Publisher {
    name: String,
    queue: Arc<ResultQueue<DetectionResult>>,
    transport: Box<dyn Transport>,
    formatter: Box<dyn MessageFormatter>,
    interval: Duration,
    shutdown: Shutdown,
    stats: PublisherStats,
}

impl Publisher {
    /// `messages_per_second` below 1 is raised to 1.
    pub fn new(
        name: impl Into<String>,
        queue: Arc<ResultQueue<DetectionResult>>,
        transport: Box<dyn Transport>,
        formatter: Box<dyn MessageFormatter>,
        messages_per_second: u32,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            name: name.into(),
            queue,
            transport,
            formatter,
            interval: throttle_interval(messages_per_second),
            shutdown,
            stats: PublisherStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn stats(&self) -> &PublisherStats {
        &self.stats
    }

    /// Format and send one result. Never fails; problems are logged.
    pub fn publish(&mut self, result: &DetectionResult) -> PublishOutcome {
        let outcome = if !self.transport.is_connected() {
            log::warn!(
                "publisher {}: transport {} not connected, skipping",
                self.name,
                self.transport.describe()
            );
            PublishOutcome::Disconnected
        } else {
            let message = self.formatter.format_message(result);
            if message.is_empty() {
                log::debug!("publisher {}: nothing to send", self.name);
                PublishOutcome::Suppressed
            } else if self.transport.send(&message) {
                log::debug!("publisher {}: sent {} bytes", self.name, message.len());
                PublishOutcome::Sent
            } else {
                log::warn!(
                    "publisher {}: send to {} failed",
                    self.name,
                    self.transport.describe()
                );
                PublishOutcome::Failed
            }
        };
        self.stats.record(outcome);
        outcome
    }

    /// Run until the queue signals shutdown. Every attempt, whatever its
    /// outcome, is followed by the throttle sleep.
    pub fn run(mut self) -> PublisherStats {
        log::info!(
            "publisher {}: started ({} every {:?})",
            self.name,
            self.transport.describe(),
            self.interval
        );
        while let Some(result) = self.queue.pop() {
            self.publish(&result);
            self.shutdown.sleep(self.interval);
        }
        log::info!(
            "publisher {}: stopped (sent {}, failed {}, disconnected {}, suppressed {})",
            self.name,
            self.stats.sent,
            self.stats.failed,
            self.stats.disconnected,
            self.stats.suppressed
        );
        self.stats
    }
}

fn throttle_interval(messages_per_second: u32) -> Duration {
    Duration::from_millis(1000 / u64::from(messages_per_second.max(1)))
}

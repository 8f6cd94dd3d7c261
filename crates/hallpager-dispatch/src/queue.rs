//! Delivery queue — strictly sequential, paced delivery with retries.
//!
//! The paging API is rate-limit sensitive, so entries go out one at a time
//! and each entry runs through all of its retries before the next starts.
//! `drain()` only returns once every entry is `Sent` or `Failed`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hallpager_core::config::{BroadcastDelayPolicy, DeliveryConfig};

use crate::call::OutboundCall;
use crate::fingerprint::Fingerprint;
use crate::transport::{DeliveryOutcome, PagingTransport};

/// Lifecycle of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum EntryStatus {
    Pending,
    Sending,
    Retrying,
    Sent,
    Failed,
}

impl EntryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EntryStatus::Sent | EntryStatus::Failed)
    }
}

/// A call waiting for (or done with) delivery.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub call: OutboundCall,
    pub retry_count: u32,
    pub status: EntryStatus,
    pub created_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl QueueEntry {
    fn new(call: OutboundCall) -> Self {
        Self {
            call,
            retry_count: 0,
            status: EntryStatus::Pending,
            created_at: Utc::now(),
            last_attempt_at: None,
        }
    }
}

/// Pacing and retry knobs.
#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub inter_message_delay: Duration,
    pub broadcast_extra_delay: Duration,
    pub broadcast_policy: BroadcastDelayPolicy,
}

impl QueueSettings {
    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            inter_message_delay: Duration::from_millis(config.inter_message_delay_ms),
            broadcast_extra_delay: Duration::from_millis(config.broadcast_extra_delay_ms),
            broadcast_policy: config.broadcast_policy,
        }
    }

    /// Delay before retrying after `outcome`. Rate limiting waits twice as long.
    pub fn retry_delay_for(&self, outcome: &DeliveryOutcome) -> Duration {
        match outcome {
            DeliveryOutcome::RateLimited => self.retry_delay * 2,
            _ => self.retry_delay,
        }
    }

    /// Gap between a successful send and the next one.
    pub fn gap_between(&self, previous_is_broadcast: bool, next_is_broadcast: bool) -> Duration {
        if self
            .broadcast_policy
            .applies(previous_is_broadcast, next_is_broadcast)
        {
            self.inter_message_delay + self.broadcast_extra_delay
        } else {
            self.inter_message_delay
        }
    }
}

/// Counters over the queue's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct QueueStats {
    pub enqueued: u64,
    pub attempts: u64,
    pub retries: u64,
    pub sent: u64,
    pub failed: u64,
}

/// In-process FIFO of outbound calls.
pub struct DeliveryQueue {
    pending: VecDeque<QueueEntry>,
    finished: Vec<QueueEntry>,
    transport: Arc<dyn PagingTransport>,
    settings: QueueSettings,
    stats: QueueStats,
}

impl DeliveryQueue {
    pub fn new(transport: Arc<dyn PagingTransport>, settings: QueueSettings) -> Self {
        Self {
            pending: VecDeque::new(),
            finished: Vec::new(),
            transport,
            settings,
            stats: QueueStats::default(),
        }
    }

    /// Add a call to the back of the queue.
    pub fn enqueue(&mut self, call: OutboundCall) {
        tracing::debug!(
            "📥 Queue enqueue: {} → {} (queue: {})",
            call.fingerprint,
            call.recipient_id,
            self.pending.len()
        );
        self.pending.push_back(QueueEntry::new(call));
        self.stats.enqueued += 1;
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    /// Entries that reached a terminal state during the last `drain()`.
    pub fn finished(&self) -> &[QueueEntry] {
        &self.finished
    }

    /// Deliver everything queued. Returns the fingerprints of calls that
    /// reached `Sent`, in send order.
    pub async fn drain(&mut self) -> Vec<Fingerprint> {
        self.finished.clear();
        let mut delivered = Vec::new();
        // Set after a successful send: whether that call went to broadcast.
        let mut last_sent: Option<bool> = None;

        if !self.pending.is_empty() {
            tracing::info!(
                "🚚 Draining {} call(s) via {} transport",
                self.pending.len(),
                self.transport.name()
            );
        }

        while let Some(mut entry) = self.pending.pop_front() {
            if let Some(previous_is_broadcast) = last_sent.take() {
                let gap = self
                    .settings
                    .gap_between(previous_is_broadcast, entry.call.is_broadcast());
                pause(gap).await;
            }

            self.deliver_entry(&mut entry).await;

            if entry.status == EntryStatus::Sent {
                last_sent = Some(entry.call.is_broadcast());
                delivered.push(entry.call.fingerprint.clone());
            }
            self.finished.push(entry);
        }

        delivered
    }

    /// Run one entry through its attempts until it is terminal.
    async fn deliver_entry(&mut self, entry: &mut QueueEntry) {
        loop {
            entry.status = EntryStatus::Sending;
            entry.last_attempt_at = Some(Utc::now());
            self.stats.attempts += 1;
            tracing::info!(
                "📤 Sending {} → {} (attempt {}/{})",
                entry.call.fingerprint,
                entry.call.recipient_id,
                entry.retry_count + 1,
                self.settings.max_retries + 1
            );

            let outcome = self.transport.deliver(&entry.call).await;
            match outcome {
                DeliveryOutcome::Success => {
                    entry.status = EntryStatus::Sent;
                    self.stats.sent += 1;
                    tracing::info!("✅ Sent {} → {}", entry.call.fingerprint, entry.call.recipient_id);
                    return;
                }
                DeliveryOutcome::Conflict => {
                    entry.status = EntryStatus::Failed;
                    self.stats.failed += 1;
                    tracing::warn!(
                        "⛔ Conflict for {} → {}, not retrying",
                        entry.call.fingerprint,
                        entry.call.recipient_id
                    );
                    return;
                }
                DeliveryOutcome::RateLimited | DeliveryOutcome::Failure(_) => {
                    if entry.retry_count >= self.settings.max_retries {
                        entry.status = EntryStatus::Failed;
                        self.stats.failed += 1;
                        tracing::warn!(
                            "❌ Giving up on {} → {} after {} attempt(s): {:?}",
                            entry.call.fingerprint,
                            entry.call.recipient_id,
                            entry.retry_count + 1,
                            outcome
                        );
                        return;
                    }
                    entry.retry_count += 1;
                    entry.status = EntryStatus::Retrying;
                    self.stats.retries += 1;
                    let delay = self.settings.retry_delay_for(&outcome);
                    tracing::warn!(
                        "🔁 Retry {}/{} for {} in {:?}: {:?}",
                        entry.retry_count,
                        self.settings.max_retries,
                        entry.call.fingerprint,
                        delay,
                        outcome
                    );
                    pause(delay).await;
                }
            }
        }
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

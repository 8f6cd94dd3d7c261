//! Dispatch orchestrator — one polling tick from talk list to delivered pages.
//!
//! Filter to large rooms → window check → two calls per due talk → skip
//! duplicates → one sequential drain → commit fingerprints of what was
//! actually sent → store cleanup.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hallpager_core::{HallPagerConfig, Result, TalkEvent, Variant};

use crate::call::{CallBuilder, RecipientDirectory};
use crate::fingerprint::{Fingerprint, FingerprintStore};
use crate::queue::{DeliveryQueue, QueueSettings};
use crate::schedule::ScheduleSource;
use crate::transport::PagingTransport;
use crate::window::WindowMatcher;

/// What happened during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct TickSummary {
    /// Talks received from the schedule source.
    pub talks: usize,
    /// Talks held in a large room.
    pub large_room: usize,
    /// Talks matched for announcement.
    pub due: usize,
    /// Calls handed to the queue.
    pub enqueued: usize,
    /// Calls skipped because they already went out.
    pub duplicates: usize,
    /// Calls that could not be built (bad date, no recipient, bad parameters).
    pub skipped: usize,
    /// Calls the paging network accepted and whose fingerprints were committed.
    pub delivered: usize,
}

/// Ties matcher, store and queue together for one tick.
pub struct Dispatcher {
    matcher: WindowMatcher,
    builder: CallBuilder,
    store: FingerprintStore,
    queue: DeliveryQueue,
    bootstrap: bool,
}

impl Dispatcher {
    /// `bootstrap` is ignored while `simulated_clock` is set: time-driven
    /// checks take precedence over the manual shortcut.
    pub fn new(
        matcher: WindowMatcher,
        builder: CallBuilder,
        store: FingerprintStore,
        queue: DeliveryQueue,
        bootstrap: bool,
        simulated_clock: bool,
    ) -> Self {
        if bootstrap && simulated_clock {
            tracing::warn!("⚠️ Bootstrap mode disabled: a simulated clock is active");
        }
        Self {
            matcher,
            builder,
            store,
            queue,
            bootstrap: bootstrap && !simulated_clock,
        }
    }

    /// Wire everything up from config with an already-chosen transport.
    pub fn from_config(
        config: &HallPagerConfig,
        transport: Arc<dyn PagingTransport>,
        simulated_clock: bool,
    ) -> Self {
        Self::new(
            WindowMatcher::from_config(&config.window),
            CallBuilder::new(RecipientDirectory::from_config(&config.recipients), &config.call),
            FingerprintStore::from_config(&config.store),
            DeliveryQueue::new(transport, QueueSettings::from_config(&config.delivery)),
            config.run.bootstrap,
            simulated_clock,
        )
    }

    pub fn bootstrap_active(&self) -> bool {
        self.bootstrap
    }

    pub fn store(&self) -> &FingerprintStore {
        &self.store
    }

    pub fn queue(&self) -> &DeliveryQueue {
        &self.queue
    }

    /// Fetch the schedule and run a tick. A failing source aborts the tick.
    pub async fn run_from_source(
        &mut self,
        source: &dyn ScheduleSource,
        now: DateTime<Utc>,
    ) -> Result<TickSummary> {
        tracing::info!("📡 Fetching schedule from {}", source.describe());
        let talks = source.fetch().await?;
        Ok(self.run_tick(&talks, now).await)
    }

    /// Run one tick over `talks` at `now`.
    pub async fn run_tick(&mut self, talks: &[TalkEvent], now: DateTime<Utc>) -> TickSummary {
        let mut summary = TickSummary {
            talks: talks.len(),
            ..TickSummary::default()
        };
        tracing::info!("⏰ Tick at {} with {} talk(s)", now.to_rfc3339(), talks.len());

        let large: Vec<&TalkEvent> = talks
            .iter()
            .filter(|talk| talk.large_room().is_some())
            .collect();
        summary.large_room = large.len();
        tracing::info!(
            "🏛️ {} talk(s) in large rooms, {} elsewhere dropped",
            large.len(),
            talks.len() - large.len()
        );

        let due = self.select_due(&large, now);
        summary.due = due.len();

        // Fingerprints enqueued this tick; the store only learns them after the drain.
        let mut enqueued = HashSet::new();
        for talk in due {
            for variant in Variant::BOTH {
                self.consider_call(talk, variant, now, &mut enqueued, &mut summary);
            }
        }

        let delivered = self.queue.drain().await;
        for fingerprint in &delivered {
            self.store.mark_sent(fingerprint, now);
        }
        summary.delivered = delivered.len();

        self.store.cleanup(now);

        tracing::info!(
            "🏁 Tick done: {} due, {} enqueued, {} duplicate(s), {} skipped, {} delivered",
            summary.due,
            summary.enqueued,
            summary.duplicates,
            summary.skipped,
            summary.delivered
        );
        summary
    }

    fn select_due<'a>(&self, large: &[&'a TalkEvent], now: DateTime<Utc>) -> Vec<&'a TalkEvent> {
        if self.bootstrap {
            let first = large.first().copied();
            match first {
                Some(talk) => tracing::warn!(
                    "🧷 Bootstrap mode: matching '{}' ({}) regardless of time",
                    talk.title,
                    talk.id
                ),
                None => tracing::warn!("🧷 Bootstrap mode: no large-room talk to match"),
            }
            return first.into_iter().collect();
        }

        large
            .iter()
            .copied()
            .filter(|talk| {
                let due = self.matcher.is_due(talk, now);
                if due {
                    tracing::info!(
                        "🔔 Due: '{}' in {} at {} ({})",
                        talk.title,
                        talk.room,
                        talk.start_time,
                        talk.id
                    );
                } else if talk.start().is_none() || talk.title.trim().is_empty() {
                    tracing::warn!(
                        "⚠️ Unusable talk {} in {}: title '{}', start '{}'",
                        talk.id,
                        talk.room,
                        talk.title,
                        talk.start_time
                    );
                } else {
                    tracing::debug!("⏭️ Not due: '{}' at {}", talk.title, talk.start_time);
                }
                due
            })
            .collect()
    }

    fn consider_call(
        &mut self,
        talk: &TalkEvent,
        variant: Variant,
        now: DateTime<Utc>,
        enqueued: &mut HashSet<Fingerprint>,
        summary: &mut TickSummary,
    ) {
        let fingerprint = Fingerprint::compute(talk, variant);
        if enqueued.contains(&fingerprint) {
            summary.duplicates += 1;
            tracing::info!(
                "🔁 {} call for '{}' ({fingerprint}) listed twice this tick, skipping",
                variant,
                talk.title
            );
            return;
        }
        if self.store.is_duplicate(&fingerprint, now) {
            summary.duplicates += 1;
            tracing::info!(
                "🔁 Duplicate {} call for '{}' ({fingerprint}), skipping",
                variant,
                talk.title
            );
            return;
        }

        match self.builder.build(talk, variant) {
            Ok(call) => {
                tracing::info!(
                    "📨 Enqueued {} call {} → {}: {}",
                    variant,
                    call.fingerprint,
                    call.recipient_id,
                    call.text
                );
                enqueued.insert(fingerprint);
                self.queue.enqueue(call);
                summary.enqueued += 1;
            }
            Err(e) => {
                summary.skipped += 1;
                tracing::warn!("⚠️ Skipping {} call for talk {}: {e}", variant, talk.id);
            }
        }
    }
}

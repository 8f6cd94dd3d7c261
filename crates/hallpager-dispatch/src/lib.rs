//! # HallPager Dispatch
//!
//! The notification pipeline: decide which talks are due, suppress calls
//! that already went out, and deliver the rest one at a time to a
//! rate-limited paging API.
//!
//! ## Design Principles
//! - Run-to-completion per tick, invoked by an external scheduler
//! - One flat file of fingerprints is the only state between ticks
//! - Strictly sequential, paced delivery
//! - Store trouble means a possible duplicate page, never a lost tick
//!
//! ## Architecture
//! ```text
//! ScheduleSource (HTTP / file)
//!   └── talks → Dispatcher::run_tick
//!                 ├── LargeRoom filter
//!                 ├── WindowMatcher (tolerant | strict)
//!                 ├── FingerprintStore::is_duplicate  (room + broadcast variant)
//!                 ├── DeliveryQueue::drain → PagingTransport
//!                 │                            ├── Simulated (log only)
//!                 │                            └── Live (HTTP POST)
//!                 ├── FingerprintStore::mark_sent  (delivered only)
//!                 └── FingerprintStore::cleanup
//! ```

pub mod call;
pub mod fingerprint;
pub mod orchestrator;
pub mod queue;
pub mod schedule;
pub mod transport;
pub mod window;

pub use call::{CallBuilder, OutboundCall, RecipientDirectory};
pub use fingerprint::{Fingerprint, FingerprintStore};
pub use orchestrator::{Dispatcher, TickSummary};
pub use queue::{DeliveryQueue, EntryStatus, QueueEntry, QueueSettings, QueueStats};
pub use schedule::{FileScheduleSource, HttpScheduleSource, ScheduleSource};
pub use transport::{DeliveryOutcome, LiveTransport, PagingTransport, SimulatedTransport};
pub use window::WindowMatcher;

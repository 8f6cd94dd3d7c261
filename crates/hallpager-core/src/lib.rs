//! # HallPager Core
//!
//! Shared building blocks for the paging pipeline: talk records, the
//! large-room set, configuration and the error type every crate returns.

pub mod config;
pub mod error;
pub mod types;

pub use config::HallPagerConfig;
pub use error::{HallPagerError, Result};
pub use types::{LargeRoom, TalkEvent, Variant};

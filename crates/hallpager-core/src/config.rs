//! HallPager configuration system.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use crate::error::{HallPagerError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HallPagerConfig {
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub call: CallConfig,
    #[serde(default)]
    pub recipients: RecipientsConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl HallPagerConfig {
    /// Load config from the default path (~/.hallpager/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HallPagerError::Config(format!("Failed to read config {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Parse config from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| HallPagerError::Config(format!("Failed to parse config: {e}")))
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the HallPager home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".hallpager")
    }

    /// Check the values a tick cannot run without.
    pub fn validate(&self) -> Result<()> {
        if self.schedule.url.trim().is_empty() && self.schedule.file.trim().is_empty() {
            return Err(HallPagerError::Config(
                "schedule.url or schedule.file must be set".into(),
            ));
        }
        if self.recipients.broadcast.trim().is_empty() {
            return Err(HallPagerError::Config(
                "recipients.broadcast must be set".into(),
            ));
        }
        if self.delivery.mode == TransportMode::Live && self.delivery.endpoint.trim().is_empty() {
            return Err(HallPagerError::Config(
                "delivery.endpoint is required in live mode".into(),
            ));
        }
        if !PRIORITY_RANGE.contains(&self.call.priority) {
            return Err(HallPagerError::Config(format!(
                "call.priority {} outside {}..={}",
                self.call.priority,
                PRIORITY_RANGE.start(),
                PRIORITY_RANGE.end()
            )));
        }
        if !EXPIRATION_RANGE.contains(&self.call.expiration_secs) {
            return Err(HallPagerError::Config(format!(
                "call.expiration_secs {} outside {}..={}",
                self.call.expiration_secs,
                EXPIRATION_RANGE.start(),
                EXPIRATION_RANGE.end()
            )));
        }
        if self.window.lead_minutes == 0 {
            return Err(HallPagerError::Config(
                "window.lead_minutes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Expand `~` in a configured path.
pub fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

fn bool_true() -> bool { true }

/// Where the talk list comes from. `url` wins when both are set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub file: String,
    #[serde(default = "default_schedule_timeout")]
    pub timeout_secs: u64,
}

fn default_schedule_timeout() -> u64 { 30 }

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            file: String::new(),
            timeout_secs: default_schedule_timeout(),
        }
    }
}

/// How "due" is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowMode {
    /// Any time within `lead_minutes` before the start, up to the start itself.
    #[default]
    Tolerant,
    /// Only within `tolerance_secs` of exactly `lead_minutes` before the start.
    Strict,
}

/// Notification window configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_lead_minutes")]
    pub lead_minutes: u32,
    #[serde(default)]
    pub mode: WindowMode,
    #[serde(default = "default_tolerance_secs")]
    pub tolerance_secs: u32,
}

fn default_lead_minutes() -> u32 { 15 }
fn default_tolerance_secs() -> u32 { 30 }

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            lead_minutes: default_lead_minutes(),
            mode: WindowMode::default(),
            tolerance_secs: default_tolerance_secs(),
        }
    }
}

/// Which paging transport to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Log calls and report success without touching the network.
    #[default]
    Simulated,
    /// POST calls to the paging API.
    Live,
}

/// When the extra broadcast delay is inserted between two sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastDelayPolicy {
    /// The call just sent went to the broadcast recipient.
    Previous,
    /// The call about to be sent goes to the broadcast recipient.
    Next,
    /// Both of them do.
    #[default]
    Both,
}

impl BroadcastDelayPolicy {
    /// Whether the extra delay applies between `previous` and `next`.
    pub fn applies(&self, previous_is_broadcast: bool, next_is_broadcast: bool) -> bool {
        match self {
            BroadcastDelayPolicy::Previous => previous_is_broadcast,
            BroadcastDelayPolicy::Next => next_is_broadcast,
            BroadcastDelayPolicy::Both => previous_is_broadcast && next_is_broadcast,
        }
    }
}

/// Delivery queue and transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default)]
    pub mode: TransportMode,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_inter_message_delay")]
    pub inter_message_delay_ms: u64,
    #[serde(default = "default_broadcast_extra_delay")]
    pub broadcast_extra_delay_ms: u64,
    #[serde(default)]
    pub broadcast_policy: BroadcastDelayPolicy,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_max_retries() -> u32 { 3 }
fn default_retry_delay() -> u64 { 2000 }
fn default_inter_message_delay() -> u64 { 1000 }
fn default_broadcast_extra_delay() -> u64 { 2000 }
fn default_request_timeout() -> u64 { 10 }

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            mode: TransportMode::default(),
            endpoint: String::new(),
            api_key: String::new(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
            inter_message_delay_ms: default_inter_message_delay(),
            broadcast_extra_delay_ms: default_broadcast_extra_delay(),
            broadcast_policy: BroadcastDelayPolicy::default(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Accepted call priorities.
pub const PRIORITY_RANGE: RangeInclusive<u8> = 1..=5;
/// Accepted call expiration, in seconds.
pub const EXPIRATION_RANGE: RangeInclusive<u32> = 60..=86_400;

/// Parameters stamped onto every outbound call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallConfig {
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default = "default_expiration")]
    pub expiration_secs: u32,
    #[serde(default)]
    pub flags: u32,
    #[serde(default = "default_max_text_len")]
    pub max_text_len: usize,
}

fn default_priority() -> u8 { 3 }
fn default_expiration() -> u32 { 1800 }
fn default_max_text_len() -> usize { 160 }

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            priority: default_priority(),
            expiration_secs: default_expiration(),
            flags: 0,
            max_text_len: default_max_text_len(),
        }
    }
}

/// Static room → recipient mapping plus the broadcast recipient.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipientsConfig {
    #[serde(default)]
    pub broadcast: String,
    #[serde(default)]
    pub rooms: HashMap<String, String>,
}

/// Fingerprint store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
    #[serde(default = "default_retention")]
    pub retention_secs: u64,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
}

fn default_store_path() -> String { "~/.hallpager/sent.log".into() }
fn default_retention() -> u64 { 3 * 60 * 60 }
fn default_max_bytes() -> u64 { 1024 * 1024 }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            retention_secs: default_retention(),
            max_bytes: default_max_bytes(),
        }
    }
}

/// Per-invocation switches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    /// Match the first large-room talk regardless of time (manual checks).
    #[serde(default)]
    pub bootstrap: bool,
    /// RFC 3339 instant used instead of the wall clock.
    #[serde(default)]
    pub simulated_now: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Append log lines here instead of stderr.
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub json: bool,
    #[serde(default = "bool_true")]
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: None,
            json: false,
            ansi: true,
        }
    }
}

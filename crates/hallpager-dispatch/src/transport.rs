//! Paging transports — actually deliver a call to the paging network.
//! Supports: a simulated transport (dry runs, tests) and the live HTTP API.
//!
//! Every transport reports one of four outcomes; the delivery queue keys its
//! retry policy on them, so HTTP details never leak past this module.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use hallpager_core::config::{DeliveryConfig, TransportMode};
use hallpager_core::{HallPagerError, Result};

use crate::call::OutboundCall;

/// What the paging network said about one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Accepted.
    Success,
    /// The call already exists downstream. Retrying cannot help.
    Conflict,
    /// Throttled by the API.
    RateLimited,
    /// Anything else: timeout, 5xx, network error, unexpected status.
    Failure(String),
}

/// A paging transport delivers one call at a time.
#[async_trait]
pub trait PagingTransport: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, call: &OutboundCall) -> DeliveryOutcome;
}

/// Map an HTTP status to a delivery outcome.
pub fn classify_status(status: reqwest::StatusCode) -> DeliveryOutcome {
    if status.is_success() {
        DeliveryOutcome::Success
    } else if status == reqwest::StatusCode::CONFLICT {
        DeliveryOutcome::Conflict
    } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        DeliveryOutcome::RateLimited
    } else {
        DeliveryOutcome::Failure(format!("HTTP {status}"))
    }
}

/// Build the transport selected in config.
pub fn transport_from_config(config: &DeliveryConfig) -> Result<Box<dyn PagingTransport>> {
    match config.mode {
        TransportMode::Simulated => Ok(Box::new(SimulatedTransport::new())),
        TransportMode::Live => Ok(Box::new(LiveTransport::new(
            &config.endpoint,
            &config.api_key,
            Duration::from_secs(config.request_timeout_secs),
        )?)),
    }
}

// ─── Simulated ──────────────────────────────────────────────

/// Logs calls instead of sending them.
///
/// Outcomes can be scripted; once the script runs out every attempt
/// succeeds. Every attempt is recorded.
#[derive(Default)]
pub struct SimulatedTransport {
    script: Mutex<VecDeque<DeliveryOutcome>>,
    attempts: Mutex<Vec<OutboundCall>>,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the first attempts with `outcomes`, in order.
    pub fn with_script(outcomes: Vec<DeliveryOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            attempts: Mutex::new(Vec::new()),
        }
    }

    /// Every call handed to `deliver`, in order.
    pub fn attempts(&self) -> Vec<OutboundCall> {
        self.attempts
            .lock()
            .map(|a| a.clone())
            .unwrap_or_default()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().map(|a| a.len()).unwrap_or(0)
    }
}

#[async_trait]
impl PagingTransport for SimulatedTransport {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn deliver(&self, call: &OutboundCall) -> DeliveryOutcome {
        if let Ok(mut attempts) = self.attempts.lock() {
            attempts.push(call.clone());
        }
        let outcome = self
            .script
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .unwrap_or(DeliveryOutcome::Success);
        tracing::info!(
            "🧪 [simulated] → {} (prio {}, exp {}s): {} => {:?}",
            call.recipient_id,
            call.priority,
            call.expiration_secs,
            call.text,
            outcome
        );
        outcome
    }
}

// ─── Live ───────────────────────────────────────────────────

/// POSTs calls as JSON to the paging API.
pub struct LiveTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl LiveTransport {
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        if endpoint.trim().is_empty() {
            return Err(HallPagerError::Config("paging endpoint is empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HallPagerError::Transport(format!("HTTP client init failed: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim().to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl PagingTransport for LiveTransport {
    fn name(&self) -> &str {
        "live"
    }

    async fn deliver(&self, call: &OutboundCall) -> DeliveryOutcome {
        let mut req = self.client.post(&self.endpoint).json(&serde_json::json!({
            "recipient": call.recipient_id,
            "text": call.text,
            "priority": call.priority,
            "expiration": call.expiration_secs,
            "flags": call.flags,
        }));
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }

        match req.send().await {
            Ok(resp) => {
                let status = resp.status();
                let outcome = classify_status(status);
                if let DeliveryOutcome::Failure(_) = outcome {
                    let body = resp.text().await.unwrap_or_default();
                    let body: String = body.chars().take(200).collect();
                    return DeliveryOutcome::Failure(format!("HTTP {status}: {body}"));
                }
                outcome
            }
            Err(e) if e.is_timeout() => DeliveryOutcome::Failure(format!("timeout: {e}")),
            Err(e) => DeliveryOutcome::Failure(format!("send failed: {e}")),
        }
    }
}

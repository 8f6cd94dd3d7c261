//! Schedule sources — where the talk list for a tick comes from.
//!
//! Understands two JSON shapes:
//! ```text
//! [ {"id": "t1", "title": "...", "room": "One", "startTime": "2026-12-27T11:00:00+01:00"}, ... ]
//!
//! {"schedule": {"conference": {"days": [
//!     {"rooms": {"One": [ {"id": 123, "title": "...", "room": "One", "date": "..."} ]}}
//! ]}}}
//! ```
//! Records with missing fields are kept (as empty strings) so the window
//! matcher can reject and log them individually.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use hallpager_core::config::{ScheduleConfig, expand_path};
use hallpager_core::{HallPagerError, Result, TalkEvent};
use serde_json::Value;

/// Something that can produce the current talk list.
#[async_trait]
pub trait ScheduleSource: Send + Sync {
    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<Vec<TalkEvent>>;
}

/// Build the source selected in config. A URL wins over a file.
pub fn source_from_config(config: &ScheduleConfig) -> Result<Box<dyn ScheduleSource>> {
    if !config.url.trim().is_empty() {
        return Ok(Box::new(HttpScheduleSource::new(
            config.url.trim(),
            Duration::from_secs(config.timeout_secs),
        )?));
    }
    if !config.file.trim().is_empty() {
        return Ok(Box::new(FileScheduleSource::new(&expand_path(config.file.trim()))));
    }
    Err(HallPagerError::Config("no schedule source configured".into()))
}

/// Fetches the schedule JSON over HTTP.
pub struct HttpScheduleSource {
    client: reqwest::Client,
    url: String,
}

impl HttpScheduleSource {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HallPagerError::Schedule(format!("HTTP client init failed: {e}")))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl ScheduleSource for HttpScheduleSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<Vec<TalkEvent>> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| HallPagerError::Schedule(format!("GET {} failed: {e}", self.url)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(HallPagerError::Schedule(format!(
                "GET {} returned {status}",
                self.url
            )));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| HallPagerError::Schedule(format!("Reading schedule body failed: {e}")))?;
        parse_schedule(&body)
    }
}

/// Reads the schedule JSON from disk.
pub struct FileScheduleSource {
    path: PathBuf,
}

impl FileScheduleSource {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

#[async_trait]
impl ScheduleSource for FileScheduleSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<Vec<TalkEvent>> {
        let body = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            HallPagerError::Schedule(format!("Failed to read {}: {e}", self.path.display()))
        })?;
        parse_schedule(&body)
    }
}

/// Parse either a flat talk list or a frab-style schedule document.
pub fn parse_schedule(body: &str) -> Result<Vec<TalkEvent>> {
    let doc: Value = serde_json::from_str(body)
        .map_err(|e| HallPagerError::Schedule(format!("Invalid schedule JSON: {e}")))?;

    if let Some(items) = doc.as_array() {
        return Ok(items.iter().map(|item| talk_from_value(item, None)).collect());
    }

    let Some(days) = doc["schedule"]["conference"]["days"].as_array() else {
        return Err(HallPagerError::Schedule(
            "Unrecognized schedule document (no list, no schedule.conference.days)".into(),
        ));
    };

    let mut talks = Vec::new();
    for day in days {
        let Some(rooms) = day["rooms"].as_object() else {
            continue;
        };
        for (room, events) in rooms {
            for event in events.as_array().into_iter().flatten() {
                talks.push(talk_from_value(event, Some(room.as_str())));
            }
        }
    }
    Ok(talks)
}

fn talk_from_value(value: &Value, room_hint: Option<&str>) -> TalkEvent {
    let room = text_field(value, &["room"]);
    TalkEvent {
        id: text_field(value, &["id", "guid"]),
        title: text_field(value, &["title"]),
        room: if room.is_empty() {
            room_hint.unwrap_or_default().to_string()
        } else {
            room
        },
        start_time: text_field(value, &["startTime", "start_time", "date"]),
    }
}

/// First of `keys` holding a string or number, as text.
fn text_field(value: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| match &value[*key] {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

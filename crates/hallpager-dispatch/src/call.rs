//! Outbound calls — what gets handed to the paging network.
//!
//! A call carries a short ASCII text ("HH:MM, Room, Title"), the resolved
//! recipient and the delivery parameters. Out-of-range parameters are
//! rejected here, before anything reaches the queue.

use std::collections::HashMap;

use hallpager_core::config::{CallConfig, RecipientsConfig};
use hallpager_core::{HallPagerError, Result, TalkEvent, Variant};
use serde::Serialize;

use crate::fingerprint::Fingerprint;

pub use hallpager_core::config::{EXPIRATION_RANGE, PRIORITY_RANGE};

const ELLIPSIS: &str = "...";

/// A single paging call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundCall {
    pub recipient_id: String,
    pub text: String,
    pub priority: u8,
    pub expiration_secs: u32,
    pub flags: u32,
    #[serde(skip)]
    pub variant: Variant,
    #[serde(skip)]
    pub fingerprint: Fingerprint,
}

impl OutboundCall {
    /// Build a call, validating every parameter.
    pub fn new(
        recipient_id: &str,
        text: &str,
        priority: u8,
        expiration_secs: u32,
        flags: u32,
        variant: Variant,
        fingerprint: Fingerprint,
    ) -> Result<Self> {
        if !PRIORITY_RANGE.contains(&priority) {
            return Err(HallPagerError::Call(format!(
                "priority {priority} outside {}..={}",
                PRIORITY_RANGE.start(),
                PRIORITY_RANGE.end()
            )));
        }
        if !EXPIRATION_RANGE.contains(&expiration_secs) {
            return Err(HallPagerError::Call(format!(
                "expiration {expiration_secs}s outside {}..={}",
                EXPIRATION_RANGE.start(),
                EXPIRATION_RANGE.end()
            )));
        }
        if !is_valid_recipient(recipient_id) {
            return Err(HallPagerError::Call(format!("invalid recipient '{recipient_id}'")));
        }
        if text.is_empty() {
            return Err(HallPagerError::Call("empty text".into()));
        }
        Ok(Self {
            recipient_id: recipient_id.to_string(),
            text: text.to_string(),
            priority,
            expiration_secs,
            flags,
            variant,
            fingerprint,
        })
    }

    pub fn is_broadcast(&self) -> bool {
        self.variant == Variant::Broadcast
    }
}

/// Static room → recipient mapping plus the broadcast recipient.
#[derive(Debug, Clone, Default)]
pub struct RecipientDirectory {
    rooms: HashMap<String, String>,
    broadcast: String,
}

impl RecipientDirectory {
    pub fn new(rooms: HashMap<String, String>, broadcast: &str) -> Self {
        Self {
            rooms,
            broadcast: broadcast.to_string(),
        }
    }

    pub fn from_config(config: &RecipientsConfig) -> Self {
        Self::new(config.rooms.clone(), &config.broadcast)
    }

    /// Recipient for `variant` of a talk held in `room`. `None` when the room
    /// has no mapping or the configured id is not usable.
    pub fn resolve(&self, room: &str, variant: Variant) -> Option<&str> {
        let id = match variant {
            Variant::Room => self.rooms.get(room)?.as_str(),
            Variant::Broadcast => self.broadcast.as_str(),
        };
        is_valid_recipient(id).then_some(id)
    }
}

/// Recipient ids are non-empty ASCII alphanumerics, `-` or `_`.
pub fn is_valid_recipient(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Builds calls for talks with the configured parameters.
#[derive(Debug, Clone)]
pub struct CallBuilder {
    directory: RecipientDirectory,
    priority: u8,
    expiration_secs: u32,
    flags: u32,
    max_text_len: usize,
}

impl CallBuilder {
    pub fn new(directory: RecipientDirectory, config: &CallConfig) -> Self {
        Self {
            directory,
            priority: config.priority,
            expiration_secs: config.expiration_secs,
            flags: config.flags,
            max_text_len: config.max_text_len,
        }
    }

    /// Build the `variant` call for `talk`.
    pub fn build(&self, talk: &TalkEvent, variant: Variant) -> Result<OutboundCall> {
        let text = format_call_text(talk)
            .ok_or_else(|| HallPagerError::Call(format!("unparseable start time '{}'", talk.start_time)))?;
        let recipient = self.directory.resolve(&talk.room, variant).ok_or_else(|| {
            HallPagerError::Call(format!("no usable {variant} recipient for room '{}'", talk.room))
        })?;
        OutboundCall::new(
            recipient,
            &sanitize(&text, self.max_text_len),
            self.priority,
            self.expiration_secs,
            self.flags,
            variant,
            Fingerprint::compute(talk, variant),
        )
    }
}

/// `"HH:MM, Room, Title"` in the talk's own offset.
pub fn format_call_text(talk: &TalkEvent) -> Option<String> {
    let start = talk.start()?;
    Some(format!(
        "{}, {}, {}",
        start.format("%H:%M"),
        talk.room.trim(),
        talk.title.trim()
    ))
}

/// Reduce `text` to printable ASCII of at most `max` chars.
///
/// Umlauts and common typographic marks are transliterated, anything else
/// outside printable ASCII is dropped, whitespace runs collapse to one space.
/// Over-long text is cut and ends in `...`.
pub fn sanitize(text: &str, max: usize) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        let mapped: &str = match c {
            'ä' => "ae",
            'ö' => "oe",
            'ü' => "ue",
            'Ä' => "Ae",
            'Ö' => "Oe",
            'Ü' => "Ue",
            'ß' => "ss",
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{00B4}' => "'",
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{00AB}' | '\u{00BB}' => "\"",
            '\u{2013}' | '\u{2014}' | '\u{2212}' => "-",
            '\u{2026}' => "...",
            c if c.is_ascii_graphic() => {
                if pending_space {
                    out.push(' ');
                    pending_space = false;
                }
                out.push(c);
                continue;
            }
            _ => continue,
        };
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push_str(mapped);
    }
    truncate(out, max)
}

fn truncate(text: String, max: usize) -> String {
    // Pure ASCII from here on, so byte and char counts agree.
    if text.len() <= max {
        return text;
    }
    if max <= ELLIPSIS.len() {
        return ELLIPSIS[..max].to_string();
    }
    let mut cut = text[..max - ELLIPSIS.len()].trim_end().to_string();
    cut.push_str(ELLIPSIS);
    cut
}

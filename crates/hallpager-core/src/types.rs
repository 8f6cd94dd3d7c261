//! Talk records and the fixed vocabulary of rooms and call variants.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// A talk as delivered by the schedule source.
///
/// Fields the source omits deserialize to empty strings; the window matcher
/// treats such records as never due instead of failing the whole tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TalkEvent {
    /// Opaque identifier from the schedule.
    pub id: String,
    /// Talk title as published.
    pub title: String,
    /// Room name as published.
    pub room: String,
    /// Start time, RFC 3339 with offset.
    #[serde(rename = "startTime", alias = "start_time", alias = "date")]
    pub start_time: String,
}

impl TalkEvent {
    pub fn new(id: &str, title: &str, room: &str, start_time: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            room: room.to_string(),
            start_time: start_time.to_string(),
        }
    }

    /// Parsed start time, keeping the offset the schedule published it in.
    /// `None` when the field is empty or not RFC 3339.
    pub fn start(&self) -> Option<DateTime<FixedOffset>> {
        let raw = self.start_time.trim();
        if raw.is_empty() {
            return None;
        }
        DateTime::parse_from_rfc3339(raw).ok()
    }

    /// The large room this talk is held in, if any.
    pub fn large_room(&self) -> Option<LargeRoom> {
        LargeRoom::from_name(&self.room)
    }
}

/// Rooms eligible for paging announcements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LargeRoom {
    One,
    Ground,
    Zero,
    Fuse,
}

impl LargeRoom {
    pub const ALL: [LargeRoom; 4] = [
        LargeRoom::One,
        LargeRoom::Ground,
        LargeRoom::Zero,
        LargeRoom::Fuse,
    ];

    /// Name as it appears in the published schedule.
    pub fn name(&self) -> &'static str {
        match self {
            LargeRoom::One => "One",
            LargeRoom::Ground => "Ground",
            LargeRoom::Zero => "Zero",
            LargeRoom::Fuse => "Fuse",
        }
    }

    /// Exact, case-sensitive lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|room| room.name() == name)
    }
}

impl std::fmt::Display for LargeRoom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Which of the two calls issued per talk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    /// Addressed to the recipient of the talk's own room.
    Room,
    /// Addressed to the all-rooms broadcast recipient.
    Broadcast,
}

impl Variant {
    pub const BOTH: [Variant; 2] = [Variant::Room, Variant::Broadcast];

    /// Tag mixed into the fingerprint so both calls dedupe independently.
    pub fn tag(&self) -> &'static str {
        match self {
            Variant::Room => "room",
            Variant::Broadcast => "broadcast",
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_large_room_lookup() {
        assert_eq!(LargeRoom::from_name("One"), Some(LargeRoom::One));
        assert_eq!(LargeRoom::from_name("Fuse"), Some(LargeRoom::Fuse));
        assert_eq!(LargeRoom::from_name("one"), None);
        assert_eq!(LargeRoom::from_name("Workshop 3"), None);
    }

    #[test]
    fn test_start_keeps_offset() {
        let talk = TalkEvent::new("t1", "Opening", "One", "2026-12-27T11:00:00+01:00");
        let start = talk.start().unwrap();
        assert_eq!(start.hour(), 11);
        assert_eq!(start.offset().local_minus_utc(), 3600);
    }

    #[test]
    fn test_start_rejects_garbage() {
        assert!(TalkEvent::new("t1", "x", "One", "").start().is_none());
        assert!(TalkEvent::new("t1", "x", "One", "tomorrow-ish").start().is_none());
        assert!(TalkEvent::new("t1", "x", "One", "2026-12-27 11:00").start().is_none());
    }

    #[test]
    fn test_deserialize_tolerates_extra_and_missing_fields() {
        let json = r#"{"id":"t9","room":"Zero","startTime":"2026-12-27T11:00:00Z","track":"CCC"}"#;
        let talk: TalkEvent = serde_json::from_str(json).unwrap();
        assert_eq!(talk.id, "t9");
        assert_eq!(talk.title, "");
        assert_eq!(talk.large_room(), Some(LargeRoom::Zero));
    }

    #[test]
    fn test_date_alias() {
        let json = r#"{"id":"1","title":"A","room":"One","date":"2026-12-27T11:00:00+01:00"}"#;
        let talk: TalkEvent = serde_json::from_str(json).unwrap();
        assert_eq!(talk.start_time, "2026-12-27T11:00:00+01:00");
    }

    #[test]
    fn test_variant_tags_differ() {
        assert_ne!(Variant::Room.tag(), Variant::Broadcast.tag());
    }
}

//! Window matcher — decides whether a talk is due for its announcement.
//!
//! Tolerant mode (default) matches the whole half-open interval
//! `(start - lead, start]`, so a tick that runs a few minutes late still
//! fires. Strict mode only matches within `tolerance` of `start - lead`.

use chrono::{DateTime, Duration, Utc};
use hallpager_core::TalkEvent;
use hallpager_core::config::{WindowConfig, WindowMode};

/// Window matcher bound to one lead time and mode.
#[derive(Debug, Clone)]
pub struct WindowMatcher {
    lead: Duration,
    mode: WindowMode,
    tolerance: Duration,
}

impl WindowMatcher {
    pub fn new(lead_minutes: u32, mode: WindowMode, tolerance_secs: u32) -> Self {
        Self {
            lead: Duration::minutes(lead_minutes as i64),
            mode,
            tolerance: Duration::seconds(tolerance_secs as i64),
        }
    }

    pub fn from_config(config: &WindowConfig) -> Self {
        Self::new(config.lead_minutes, config.mode, config.tolerance_secs)
    }

    /// Whether `talk` should be announced at `now`.
    pub fn is_due(&self, talk: &TalkEvent, now: DateTime<Utc>) -> bool {
        let Some(start) = usable_start(talk) else {
            return false;
        };
        match self.mode {
            WindowMode::Tolerant => in_tolerant_window(start, now, self.lead),
            WindowMode::Strict => in_strict_window(start, now, self.lead, self.tolerance),
        }
    }
}

/// Tolerant check with an explicit lead time.
pub fn is_due(talk: &TalkEvent, now: DateTime<Utc>, lead_minutes: u32) -> bool {
    usable_start(talk)
        .is_some_and(|start| in_tolerant_window(start, now, Duration::minutes(lead_minutes as i64)))
}

/// Start time of a talk with all fields the announcement needs, else `None`.
fn usable_start(talk: &TalkEvent) -> Option<DateTime<Utc>> {
    if talk.title.trim().is_empty() || talk.room.trim().is_empty() {
        return None;
    }
    talk.start().map(|s| s.with_timezone(&Utc))
}

fn in_tolerant_window(start: DateTime<Utc>, now: DateTime<Utc>, lead: Duration) -> bool {
    now <= start && now > start - lead
}

fn in_strict_window(
    start: DateTime<Utc>,
    now: DateTime<Utc>,
    lead: Duration,
    tolerance: Duration,
) -> bool {
    let target = start - lead;
    now >= target - tolerance && now <= target + tolerance && now <= start
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 12, 27, 10, 0, 0).unwrap()
    }

    fn talk_at(at: DateTime<Utc>) -> TalkEvent {
        TalkEvent::new("t1", "Grand opening", "One", &at.to_rfc3339())
    }

    #[test]
    fn test_tolerant_window_bounds() {
        let talk = talk_at(start());
        let lead = 15;
        // Too early: exactly lead before, and earlier.
        assert!(!is_due(&talk, start() - Duration::minutes(15), lead));
        assert!(!is_due(&talk, start() - Duration::minutes(40), lead));
        // Inside.
        assert!(is_due(&talk, start() - Duration::minutes(15) + Duration::seconds(1), lead));
        assert!(is_due(&talk, start() - Duration::minutes(10), lead));
        assert!(is_due(&talk, start() - Duration::seconds(1), lead));
        assert!(is_due(&talk, start(), lead));
        // Already started.
        assert!(!is_due(&talk, start() + Duration::seconds(1), lead));
        assert!(!is_due(&talk, start() + Duration::hours(1), lead));
    }

    #[test]
    fn test_offset_is_respected() {
        // 11:00 at +01:00 is 10:00 UTC.
        let talk = TalkEvent::new("t1", "Talk", "One", "2026-12-27T11:00:00+01:00");
        assert!(is_due(&talk, start() - Duration::minutes(5), 15));
        assert!(!is_due(&talk, start() + Duration::minutes(55), 15));
    }

    #[test]
    fn test_fails_closed_on_bad_fields() {
        let now = start() - Duration::minutes(5);
        let mut talk = talk_at(start());
        talk.title.clear();
        assert!(!is_due(&talk, now, 15));

        let mut talk = talk_at(start());
        talk.room = "  ".into();
        assert!(!is_due(&talk, now, 15));

        let mut talk = talk_at(start());
        talk.start_time = "27.12.2026 10:00".into();
        assert!(!is_due(&talk, now, 15));
    }

    #[test]
    fn test_strict_window() {
        let matcher = WindowMatcher::new(15, WindowMode::Strict, 30);
        let talk = talk_at(start());
        let target = start() - Duration::minutes(15);
        assert!(matcher.is_due(&talk, target));
        assert!(matcher.is_due(&talk, target - Duration::seconds(30)));
        assert!(matcher.is_due(&talk, target + Duration::seconds(30)));
        assert!(!matcher.is_due(&talk, target + Duration::seconds(31)));
        // Late tick no longer matches in strict mode.
        assert!(!matcher.is_due(&talk, start() - Duration::minutes(5)));
    }

    #[test]
    fn test_strict_window_never_matches_started_talk() {
        // Tolerance wider than the lead would otherwise reach past the start.
        let matcher = WindowMatcher::new(1, WindowMode::Strict, 120);
        let talk = talk_at(start());
        assert!(matcher.is_due(&talk, start() - Duration::minutes(1)));
        assert!(matcher.is_due(&talk, start()));
        assert!(!matcher.is_due(&talk, start() + Duration::seconds(1)));
        assert!(!matcher.is_due(&talk, start() + Duration::seconds(60)));
    }

    #[test]
    fn test_matcher_tolerant_agrees_with_free_fn() {
        let matcher = WindowMatcher::new(15, WindowMode::Tolerant, 30);
        let talk = talk_at(start());
        for offset in [-20, -15, -14, -1, 0, 1] {
            let now = start() + Duration::minutes(offset);
            assert_eq!(matcher.is_due(&talk, now), is_due(&talk, now, 15), "offset {offset}");
        }
    }
}

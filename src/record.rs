use crate::session::{FingerMode, ModeKind, SessionSnapshot};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Result of one finished session, as stored on a leaderboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Elapsed seconds in time attack, final tap count in tap challenge
    pub value: f64,
    pub date: DateTime<Local>,
    pub had_false_start: bool,
    /// Reserved for retry tickets; never set yet
    #[serde(default)]
    pub used_ticket: bool,
    pub finger_mode: FingerMode,
}

impl Record {
    pub fn new(value: f64, date: DateTime<Local>, had_false_start: bool, finger_mode: FingerMode) -> Self {
        Self {
            value,
            date,
            had_false_start,
            used_ticket: false,
            finger_mode,
        }
    }

    /// Builds a record from a finished session, `None` while still in progress
    pub fn from_snapshot(snapshot: &SessionSnapshot, date: DateTime<Local>) -> Option<Self> {
        if !snapshot.is_finished() {
            return None;
        }
        Some(Self::new(
            snapshot.score(),
            date,
            snapshot.had_false_start,
            snapshot.finger_mode,
        ))
    }

    pub fn beats(&self, other: &Record, mode_kind: ModeKind) -> bool {
        mode_kind.is_better(self.value, other.value)
    }

    pub fn display_value(&self, mode_kind: ModeKind) -> String {
        match mode_kind {
            ModeKind::TimeAttack => format!("{:.2}s", self.value),
            ModeKind::TapChallenge => format!("{} taps", self.value as i64),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

/// One of the four independent boards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeaderboardKey {
    pub finger_mode: FingerMode,
    pub mode_kind: ModeKind,
}

impl LeaderboardKey {
    pub fn new(finger_mode: FingerMode, mode_kind: ModeKind) -> Self {
        Self {
            finger_mode,
            mode_kind,
        }
    }

    pub fn for_record(record: &Record, mode_kind: ModeKind) -> Self {
        Self::new(record.finger_mode, mode_kind)
    }

    pub fn slug(&self) -> String {
        format!("{}_{}", self.mode_kind.slug(), self.finger_mode.as_u8())
    }

    pub fn all() -> [LeaderboardKey; 4] {
        [
            Self::new(FingerMode::One, ModeKind::TimeAttack),
            Self::new(FingerMode::Two, ModeKind::TimeAttack),
            Self::new(FingerMode::One, ModeKind::TapChallenge),
            Self::new(FingerMode::Two, ModeKind::TapChallenge),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Phase;
    use chrono::TimeZone;
    use std::time::Duration;

    fn date() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
    }

    fn snapshot(phase: Phase, mode_kind: ModeKind) -> SessionSnapshot {
        SessionSnapshot {
            finger_mode: FingerMode::Two,
            mode_kind,
            phase,
            tap_count: 57,
            invalid_tap_count: 3,
            last_tap_side: None,
            had_false_start: true,
            elapsed: Duration::from_millis(12_345),
            tap_rate: 0.0,
            effect_level: 1,
            is_in_penalty: false,
            penalty_remaining: Duration::ZERO,
            invalid_tap_side: None,
            time_remaining: None,
        }
    }

    #[test]
    fn json_uses_camel_case_and_integer_finger_mode() {
        let record = Record::new(9.87, date(), true, FingerMode::Two);
        let json: serde_json::Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();

        assert_eq!(json["value"], 9.87);
        assert_eq!(json["hadFalseStart"], true);
        assert_eq!(json["usedTicket"], false);
        assert_eq!(json["fingerMode"], 2);
        assert!(json["date"].as_str().unwrap().starts_with("2024-05-01T12:30:00"));
    }

    #[test]
    fn json_without_ticket_field_parses() {
        let record = Record::from_json(
            r#"{"value":42.0,"date":"2024-05-01T12:30:00+00:00","hadFalseStart":false,"fingerMode":1}"#,
        )
        .unwrap();
        assert!(!record.used_ticket);
        assert_eq!(record.finger_mode, FingerMode::One);
        assert_eq!(record.value, 42.0);
    }

    #[test]
    fn json_rejects_unknown_finger_mode() {
        let err = Record::from_json(
            r#"{"value":1.0,"date":"2024-05-01T12:30:00+00:00","hadFalseStart":false,"fingerMode":3}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn only_finished_snapshots_make_records() {
        assert!(Record::from_snapshot(&snapshot(Phase::Playing, ModeKind::TimeAttack), date()).is_none());

        let ta = Record::from_snapshot(&snapshot(Phase::Finished, ModeKind::TimeAttack), date()).unwrap();
        assert!((ta.value - 12.345).abs() < 1e-9);
        assert!(ta.had_false_start);
        assert_eq!(ta.finger_mode, FingerMode::Two);

        let tc = Record::from_snapshot(&snapshot(Phase::Finished, ModeKind::TapChallenge), date()).unwrap();
        assert_eq!(tc.value, 57.0);
    }

    #[test]
    fn beats_follows_mode_direction() {
        let fast = Record::new(10.0, date(), false, FingerMode::One);
        let slow = Record::new(12.0, date(), false, FingerMode::One);
        assert!(fast.beats(&slow, ModeKind::TimeAttack));
        assert!(slow.beats(&fast, ModeKind::TapChallenge));
    }

    #[test]
    fn display_value_formats_per_mode() {
        let r = Record::new(11.256, date(), false, FingerMode::One);
        assert_eq!(r.display_value(ModeKind::TimeAttack), "11.26s");
        let r = Record::new(-3.0, date(), true, FingerMode::One);
        assert_eq!(r.display_value(ModeKind::TapChallenge), "-3 taps");
    }

    #[test]
    fn board_slugs_are_distinct() {
        let slugs: std::collections::HashSet<_> =
            LeaderboardKey::all().iter().map(|k| k.slug()).collect();
        assert_eq!(slugs.len(), 4);
        assert_eq!(
            LeaderboardKey::new(FingerMode::One, ModeKind::TimeAttack).slug(),
            "time_attack_1"
        );
    }
}

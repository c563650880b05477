use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How many fingers the player uses: one center button, or strictly alternating left/right buttons
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum, strum_macros::Display,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum FingerMode {
    One,
    Two,
}

impl FingerMode {
    pub fn as_u8(self) -> u8 {
        match self {
            FingerMode::One => 1,
            FingerMode::Two => 2,
        }
    }
}

impl From<FingerMode> for u8 {
    fn from(mode: FingerMode) -> Self {
        mode.as_u8()
    }
}

impl TryFrom<u8> for FingerMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(FingerMode::One),
            2 => Ok(FingerMode::Two),
            other => Err(format!("finger mode must be 1 or 2, got {other}")),
        }
    }
}

/// What is being measured: time to a fixed tap count, or taps within a fixed time
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum ModeKind {
    TimeAttack,
    TapChallenge,
}

impl ModeKind {
    pub fn slug(self) -> &'static str {
        match self {
            ModeKind::TimeAttack => "time_attack",
            ModeKind::TapChallenge => "tap_challenge",
        }
    }

    /// Whether `candidate` beats `current` on this mode's board.
    /// Equal values do not count, so the earlier record keeps its place.
    pub fn is_better(self, candidate: f64, current: f64) -> bool {
        match self {
            ModeKind::TimeAttack => candidate < current,
            ModeKind::TapChallenge => candidate > current,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Phase {
    Ready,
    OnYourMark,
    Set,
    Playing,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Timing and scoring constants of a session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub on_your_mark_ms: u64,
    pub set_min_ms: u64,
    pub set_max_ms: u64,
    pub tick_ms: u64,
    pub time_attack_target: i32,
    pub tap_challenge_ms: u64,
    pub false_start_lockout_ms: u64,
    pub false_start_tap_penalty: i32,
    pub invalid_feedback_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            on_your_mark_ms: 1500,
            set_min_ms: 1500,
            set_max_ms: 3000,
            tick_ms: 10,
            time_attack_target: 100,
            tap_challenge_ms: 10_000,
            false_start_lockout_ms: 3000,
            false_start_tap_penalty: 10,
            invalid_feedback_ms: 200,
        }
    }
}

impl SessionConfig {
    /// Clamp values that would stall or never finish a session
    pub fn sanitized(mut self) -> Self {
        self.tick_ms = self.tick_ms.max(1);
        self.set_max_ms = self.set_max_ms.max(self.set_min_ms);
        self.time_attack_target = self.time_attack_target.max(1);
        self.false_start_tap_penalty = self.false_start_tap_penalty.max(0);
        self
    }

    pub fn on_your_mark(&self) -> Duration {
        Duration::from_millis(self.on_your_mark_ms)
    }

    pub fn set_range(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.set_min_ms),
            Duration::from_millis(self.set_max_ms),
        )
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn tap_challenge_window(&self) -> Duration {
        Duration::from_millis(self.tap_challenge_ms)
    }

    pub fn false_start_lockout(&self) -> Duration {
        Duration::from_millis(self.false_start_lockout_ms)
    }

    pub fn invalid_feedback(&self) -> Duration {
        Duration::from_millis(self.invalid_feedback_ms)
    }
}

/// Read-only view of a session handed to the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub finger_mode: FingerMode,
    pub mode_kind: ModeKind,
    pub phase: Phase,
    pub tap_count: i32,
    pub invalid_tap_count: u32,
    pub last_tap_side: Option<Side>,
    pub had_false_start: bool,
    pub elapsed: Duration,
    pub tap_rate: f64,
    pub effect_level: u8,
    pub is_in_penalty: bool,
    pub penalty_remaining: Duration,
    pub invalid_tap_side: Option<Side>,
    // Tap challenge only
    pub time_remaining: Option<Duration>,
}

impl SessionSnapshot {
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// The score this snapshot would be recorded with
    pub fn score(&self) -> f64 {
        match self.mode_kind {
            ModeKind::TimeAttack => self.elapsed.as_secs_f64(),
            ModeKind::TapChallenge => f64::from(self.tap_count),
        }
    }
}

use crate::session::FingerMode;
use std::collections::VecDeque;
use std::time::Duration;

pub const WINDOW_SPAN: Duration = Duration::from_millis(2000);
pub const WINDOW_CAPACITY: usize = 10;

pub const MIN_EFFECT_LEVEL: u8 = 1;
pub const MAX_EFFECT_LEVEL: u8 = 5;

// Lower bounds in taps/sec for levels 5, 4, 3, 2
const ONE_FINGER_THRESHOLDS: [f64; 4] = [13.0, 11.0, 8.0, 5.0];
// Alternating two fingers roughly doubles the rate for the same effort
const TWO_FINGER_THRESHOLDS: [f64; 4] = [23.0, 20.0, 15.0, 10.0];

/// Sliding window over the play-relative timestamps of the most recent valid taps
#[derive(Debug, Clone, Default)]
pub struct TapRateWindow {
    stamps: VecDeque<Duration>,
}

impl TapRateWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a tap and return the rate over the updated window
    pub fn push(&mut self, at: Duration) -> f64 {
        self.stamps.push_back(at);

        while let Some(&oldest) = self.stamps.front() {
            if at.saturating_sub(oldest) > WINDOW_SPAN {
                self.stamps.pop_front();
            } else {
                break;
            }
        }

        while self.stamps.len() > WINDOW_CAPACITY {
            self.stamps.pop_front();
        }

        self.rate()
    }

    /// Taps per second between the oldest and newest entry
    pub fn rate(&self) -> f64 {
        match (self.stamps.front(), self.stamps.back()) {
            (Some(&oldest), Some(&newest)) if self.stamps.len() >= 2 => {
                // a burst inside one millisecond still counts as a finite rate
                let span = newest
                    .saturating_sub(oldest)
                    .max(Duration::from_millis(1));
                (self.stamps.len() - 1) as f64 / span.as_secs_f64()
            }
            _ => 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn clear(&mut self) {
        self.stamps.clear();
    }
}

/// Map a tap rate onto the 1-5 intensity tier used for visual feedback
pub fn effect_level(rate: f64, finger_mode: FingerMode) -> u8 {
    let thresholds = match finger_mode {
        FingerMode::One => &ONE_FINGER_THRESHOLDS,
        FingerMode::Two => &TWO_FINGER_THRESHOLDS,
    };

    thresholds
        .iter()
        .position(|&min_rate| rate >= min_rate)
        .map_or(MIN_EFFECT_LEVEL, |idx| MAX_EFFECT_LEVEL - idx as u8)
}

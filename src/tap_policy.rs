use crate::session::{FingerMode, Phase, Side};

/// Outcome of judging a single tap against the current session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapVerdict {
    /// Not a tappable phase; nothing changes
    Ignored,
    /// Tapped during "Set": play starts now, with the mode's penalty
    FalseStart,
    /// Inside the post-false-start lockout
    Penalized,
    /// Same side as the previous counted tap in two-finger mode
    InvalidAlternation(Side),
    Counted,
}

impl TapVerdict {
    pub fn is_counted(self) -> bool {
        self == TapVerdict::Counted
    }
}

/// The parts of a session a tap is judged against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapContext {
    pub phase: Phase,
    pub finger_mode: FingerMode,
    pub in_penalty: bool,
    pub last_tap_side: Option<Side>,
}

/// Rules are checked in order; the first that matches wins.
pub fn judge_tap(ctx: &TapContext, side: Option<Side>) -> TapVerdict {
    match ctx.phase {
        Phase::Ready | Phase::OnYourMark | Phase::Finished => return TapVerdict::Ignored,
        Phase::Set => return TapVerdict::FalseStart,
        Phase::Playing => {}
    }

    if ctx.in_penalty {
        return TapVerdict::Penalized;
    }

    if ctx.finger_mode == FingerMode::Two {
        match side {
            // two-finger input always names a button
            None => return TapVerdict::Ignored,
            Some(s) if ctx.last_tap_side == Some(s) => return TapVerdict::InvalidAlternation(s),
            Some(_) => {}
        }
    }

    TapVerdict::Counted
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn ctx(phase: Phase, finger_mode: FingerMode) -> TapContext {
        TapContext {
            phase,
            finger_mode,
            in_penalty: false,
            last_tap_side: None,
        }
    }

    #[test]
    fn untappable_phases_are_ignored() {
        for phase in [Phase::Ready, Phase::OnYourMark, Phase::Finished] {
            assert_eq!(
                judge_tap(&ctx(phase, FingerMode::One), None),
                TapVerdict::Ignored
            );
        }
    }

    #[test]
    fn set_phase_is_false_start_regardless_of_side() {
        let c = TapContext {
            last_tap_side: Some(Side::Left),
            ..ctx(Phase::Set, FingerMode::Two)
        };
        assert_eq!(judge_tap(&c, Some(Side::Left)), TapVerdict::FalseStart);
    }

    #[test]
    fn penalty_wins_over_alternation() {
        let c = TapContext {
            in_penalty: true,
            last_tap_side: Some(Side::Left),
            ..ctx(Phase::Playing, FingerMode::Two)
        };
        assert_eq!(judge_tap(&c, Some(Side::Left)), TapVerdict::Penalized);
    }

    #[test]
    fn same_side_twice_is_invalid() {
        let c = TapContext {
            last_tap_side: Some(Side::Right),
            ..ctx(Phase::Playing, FingerMode::Two)
        };
        assert_matches!(
            judge_tap(&c, Some(Side::Right)),
            TapVerdict::InvalidAlternation(Side::Right)
        );
        assert!(judge_tap(&c, Some(Side::Left)).is_counted());
    }

    #[test]
    fn first_two_finger_tap_counts_on_either_side() {
        let c = ctx(Phase::Playing, FingerMode::Two);
        assert!(judge_tap(&c, Some(Side::Left)).is_counted());
        assert!(judge_tap(&c, Some(Side::Right)).is_counted());
    }

    #[test]
    fn two_finger_tap_without_side_is_ignored() {
        let c = ctx(Phase::Playing, FingerMode::Two);
        assert_eq!(judge_tap(&c, None), TapVerdict::Ignored);
    }

    #[test]
    fn one_finger_never_checks_alternation() {
        let c = TapContext {
            last_tap_side: Some(Side::Left),
            ..ctx(Phase::Playing, FingerMode::One)
        };
        assert!(judge_tap(&c, Some(Side::Left)).is_counted());
        assert!(judge_tap(&c, None).is_counted());
    }
}

use crate::notifier::{ListenerId, Notifier};
use crate::random::RandomSource;
use crate::record::Record;
use crate::scheduler::{Clock, Scheduler, TimerId, TimerKind};
use crate::session::{FingerMode, ModeKind, Phase, SessionConfig, SessionSnapshot, Side};
use crate::tap_policy::{judge_tap, TapContext, TapVerdict};
use crate::tap_rate::{effect_level, TapRateWindow, MIN_EFFECT_LEVEL};
use chrono::{DateTime, Local};
use std::time::Duration;
use tracing::{debug, info, trace};

/// One attempt at the game: countdown, play, result.
///
/// All state changes happen inside a command (`start_sequence`, `handle_tap`,
/// `reset`) or inside `pump`, which fires the session's own timers. Every
/// timer callback runs at its due instant, so the outcome only depends on
/// when events happened, not on how often `pump` is called.
pub struct Session {
    finger_mode: FingerMode,
    mode_kind: ModeKind,
    config: SessionConfig,

    phase: Phase,
    tap_count: i32,
    invalid_tap_count: u32,
    last_tap_side: Option<Side>,
    had_false_start: bool,
    play_started_at: Option<Duration>,
    finished_elapsed: Option<Duration>,
    rate_window: TapRateWindow,
    tap_rate: f64,
    effect_level: u8,
    invalid_tap_side: Option<Side>,

    clock: Box<dyn Clock>,
    random: Box<dyn RandomSource>,
    scheduler: Scheduler,
    sequence_timer: Option<TimerId>,
    tick_timer: Option<TimerId>,
    deadline_timer: Option<TimerId>,
    feedback_timer: Option<TimerId>,

    listeners: Notifier<SessionSnapshot>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("finger_mode", &self.finger_mode)
            .field("mode_kind", &self.mode_kind)
            .field("phase", &self.phase)
            .field("tap_count", &self.tap_count)
            .field("had_false_start", &self.had_false_start)
            .field("pending_timers", &self.scheduler.len())
            .finish()
    }
}

impl Session {
    pub fn new(
        finger_mode: FingerMode,
        mode_kind: ModeKind,
        clock: Box<dyn Clock>,
        random: Box<dyn RandomSource>,
    ) -> Self {
        Self::with_config(finger_mode, mode_kind, SessionConfig::default(), clock, random)
    }

    pub fn with_config(
        finger_mode: FingerMode,
        mode_kind: ModeKind,
        config: SessionConfig,
        clock: Box<dyn Clock>,
        random: Box<dyn RandomSource>,
    ) -> Self {
        Self {
            finger_mode,
            mode_kind,
            config: config.sanitized(),
            phase: Phase::Ready,
            tap_count: 0,
            invalid_tap_count: 0,
            last_tap_side: None,
            had_false_start: false,
            play_started_at: None,
            finished_elapsed: None,
            rate_window: TapRateWindow::new(),
            tap_rate: 0.0,
            effect_level: MIN_EFFECT_LEVEL,
            invalid_tap_side: None,
            clock,
            random,
            scheduler: Scheduler::new(),
            sequence_timer: None,
            tick_timer: None,
            deadline_timer: None,
            feedback_timer: None,
            listeners: Notifier::new(),
        }
    }

    // ---- commands ----

    /// Begin the "on your mark, set, go" countdown. Ignored unless Ready.
    pub fn start_sequence(&mut self) {
        self.pump();
        if self.phase != Phase::Ready {
            return;
        }
        let now = self.clock.now();
        self.phase = Phase::OnYourMark;
        self.sequence_timer = Some(
            self.scheduler
                .schedule_once(now + self.config.on_your_mark(), TimerKind::EnterSet),
        );
        debug!(finger_mode = %self.finger_mode, mode_kind = %self.mode_kind, "on your mark");
        self.notify(now);
    }

    /// Register a tap. Returns true only when it counted as progress.
    pub fn handle_tap(&mut self, side: Option<Side>) -> bool {
        self.pump();
        let now = self.clock.now();

        let ctx = TapContext {
            phase: self.phase,
            finger_mode: self.finger_mode,
            in_penalty: self.is_in_penalty_at(now),
            last_tap_side: self.last_tap_side,
        };
        let verdict = judge_tap(&ctx, side);
        trace!(?verdict, ?side, phase = %self.phase, "tap");

        match verdict {
            TapVerdict::Ignored | TapVerdict::Penalized => {}
            TapVerdict::FalseStart => {
                self.had_false_start = true;
                if let Some(id) = self.sequence_timer.take() {
                    self.scheduler.cancel(id);
                }
                debug!(mode_kind = %self.mode_kind, "false start");
                self.begin_play(now);
            }
            TapVerdict::InvalidAlternation(side) => {
                self.invalid_tap_count += 1;
                self.invalid_tap_side = Some(side);
                if let Some(id) = self.feedback_timer.take() {
                    self.scheduler.cancel(id);
                }
                self.feedback_timer = Some(self.scheduler.schedule_once(
                    now + self.config.invalid_feedback(),
                    TimerKind::ClearInvalidTap,
                ));
                self.notify(now);
            }
            TapVerdict::Counted => {
                self.tap_count += 1;
                self.last_tap_side = side;
                self.tap_rate = self.rate_window.push(self.elapsed_at(now));
                self.effect_level = effect_level(self.tap_rate, self.finger_mode);

                if self.mode_kind == ModeKind::TimeAttack
                    && self.tap_count >= self.config.time_attack_target
                {
                    self.finish(now);
                }
                self.notify(now);
            }
        }
        verdict.is_counted()
    }

    /// Back to a fresh Ready session. Pending timers are dropped; listeners stay.
    pub fn reset(&mut self) {
        self.scheduler.cancel_all();
        self.sequence_timer = None;
        self.tick_timer = None;
        self.deadline_timer = None;
        self.feedback_timer = None;

        self.phase = Phase::Ready;
        self.tap_count = 0;
        self.invalid_tap_count = 0;
        self.last_tap_side = None;
        self.had_false_start = false;
        self.play_started_at = None;
        self.finished_elapsed = None;
        self.rate_window.clear();
        self.tap_rate = 0.0;
        self.effect_level = MIN_EFFECT_LEVEL;
        self.invalid_tap_side = None;

        debug!("session reset");
        let now = self.clock.now();
        self.notify(now);
    }

    /// Fire every timer that is due by now. Returns how many fired.
    pub fn pump(&mut self) -> usize {
        let now = self.clock.now();
        let mut fired = 0;
        while let Some(timer) = self.scheduler.pop_due(now) {
            fired += 1;
            self.on_timer(timer.id, timer.kind, timer.at);
        }
        fired
    }

    // ---- observation ----

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&SessionSnapshot) + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_at(self.clock.now())
    }

    /// The leaderboard entry for this attempt, once finished
    pub fn record(&self, date: DateTime<Local>) -> Option<Record> {
        Record::from_snapshot(&self.snapshot(), date)
    }

    pub fn finger_mode(&self) -> FingerMode {
        self.finger_mode
    }

    pub fn mode_kind(&self) -> ModeKind {
        self.mode_kind
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn tap_count(&self) -> i32 {
        self.tap_count
    }

    pub fn invalid_tap_count(&self) -> u32 {
        self.invalid_tap_count
    }

    pub fn last_tap_side(&self) -> Option<Side> {
        self.last_tap_side
    }

    pub fn invalid_tap_side(&self) -> Option<Side> {
        self.invalid_tap_side
    }

    pub fn had_false_start(&self) -> bool {
        self.had_false_start
    }

    pub fn effect_level(&self) -> u8 {
        self.effect_level
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed_at(self.clock.now())
    }

    pub fn is_in_penalty(&self) -> bool {
        self.is_in_penalty_at(self.clock.now())
    }

    pub fn pending_timers(&self) -> usize {
        self.scheduler.len()
    }

    pub fn next_timer_due(&self) -> Option<Duration> {
        self.scheduler.next_due()
    }

    // ---- internals ----

    fn on_timer(&mut self, id: TimerId, kind: TimerKind, at: Duration) {
        match kind {
            TimerKind::EnterSet => {
                self.sequence_timer = None;
                if self.phase == Phase::OnYourMark {
                    self.enter_set(at);
                }
            }
            TimerKind::StartPlay => {
                self.sequence_timer = None;
                if self.phase == Phase::Set {
                    self.begin_play(at);
                }
            }
            TimerKind::Tick => self.on_tick(id, at),
            TimerKind::Deadline => {
                self.deadline_timer = None;
                if self.phase == Phase::Playing {
                    self.finish(at);
                    self.notify(at);
                }
            }
            TimerKind::ClearInvalidTap => {
                self.feedback_timer = None;
                if self.invalid_tap_side.take().is_some() {
                    self.notify(at);
                }
            }
        }
    }

    fn enter_set(&mut self, at: Duration) {
        let (min, max) = self.config.set_range();
        let delay = self.random.duration_between(min, max);
        self.phase = Phase::Set;
        self.sequence_timer = Some(self.scheduler.schedule_once(at + delay, TimerKind::StartPlay));
        debug!(delay_ms = delay.as_millis() as u64, "set");
        self.notify(at);
    }

    /// Enter Playing at `at`. A false start has already been flagged by the caller.
    fn begin_play(&mut self, at: Duration) {
        self.phase = Phase::Playing;
        self.play_started_at = Some(at);
        self.tap_count = if self.had_false_start && self.mode_kind == ModeKind::TapChallenge {
            -self.config.false_start_tap_penalty
        } else {
            0
        };
        self.tick_timer = Some(self.scheduler.schedule_every(
            at + self.config.tick(),
            self.config.tick(),
            TimerKind::Tick,
        ));
        if self.mode_kind == ModeKind::TapChallenge {
            self.deadline_timer = Some(self.scheduler.schedule_once(
                at + self.config.tap_challenge_window(),
                TimerKind::Deadline,
            ));
        }
        debug!(had_false_start = self.had_false_start, tap_count = self.tap_count, "go");
        self.notify(at);
    }

    fn on_tick(&mut self, id: TimerId, at: Duration) {
        if self.phase != Phase::Playing {
            self.scheduler.cancel(id);
            return;
        }
        self.notify(at);
    }

    fn finish(&mut self, at: Duration) {
        let elapsed = self.elapsed_at(at);
        self.finished_elapsed = Some(elapsed);
        self.phase = Phase::Finished;
        for id in [self.tick_timer.take(), self.deadline_timer.take()]
            .into_iter()
            .flatten()
        {
            self.scheduler.cancel(id);
        }
        info!(
            finger_mode = %self.finger_mode,
            mode_kind = %self.mode_kind,
            tap_count = self.tap_count,
            elapsed_ms = elapsed.as_millis() as u64,
            had_false_start = self.had_false_start,
            "finished"
        );
    }

    fn elapsed_at(&self, at: Duration) -> Duration {
        match (self.finished_elapsed, self.play_started_at) {
            (Some(frozen), _) => frozen,
            (None, Some(start)) => at.saturating_sub(start),
            (None, None) => Duration::ZERO,
        }
    }

    fn penalty_remaining_at(&self, at: Duration) -> Duration {
        if self.phase != Phase::Playing
            || !self.had_false_start
            || self.mode_kind != ModeKind::TimeAttack
        {
            return Duration::ZERO;
        }
        self.config
            .false_start_lockout()
            .saturating_sub(self.elapsed_at(at))
    }

    fn is_in_penalty_at(&self, at: Duration) -> bool {
        !self.penalty_remaining_at(at).is_zero()
    }

    fn snapshot_at(&self, at: Duration) -> SessionSnapshot {
        let elapsed = self.elapsed_at(at);
        let penalty_remaining = self.penalty_remaining_at(at);
        SessionSnapshot {
            finger_mode: self.finger_mode,
            mode_kind: self.mode_kind,
            phase: self.phase,
            tap_count: self.tap_count,
            invalid_tap_count: self.invalid_tap_count,
            last_tap_side: self.last_tap_side,
            had_false_start: self.had_false_start,
            elapsed,
            tap_rate: self.tap_rate,
            effect_level: self.effect_level,
            is_in_penalty: !penalty_remaining.is_zero(),
            penalty_remaining,
            invalid_tap_side: self.invalid_tap_side,
            time_remaining: match self.mode_kind {
                ModeKind::TapChallenge => {
                    Some(self.config.tap_challenge_window().saturating_sub(elapsed))
                }
                ModeKind::TimeAttack => None,
            },
        }
    }

    fn notify(&mut self, at: Duration) {
        if self.listeners.is_empty() {
            return;
        }
        let snapshot = self.snapshot_at(at);
        self.listeners.notify(&snapshot);
    }
}

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Monotonic time source, reported as an offset from an arbitrary origin
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Production clock backed by `Instant`
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    pub fn set(&self, to: Duration) {
        self.now.set(to);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Cancellation handle returned by every scheduling call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// What a timer does when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// OnYourMark -> Set
    EnterSet,
    /// Set -> Playing
    StartPlay,
    /// Periodic refresh while playing
    Tick,
    /// End of the tap challenge window
    Deadline,
    /// Drop the transient invalid-side highlight
    ClearInvalidTap,
}

/// A timer that came due
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired {
    pub id: TimerId,
    pub kind: TimerKind,
    pub at: Duration,
}

#[derive(Debug, Clone)]
struct Entry {
    id: TimerId,
    due: Duration,
    period: Option<Duration>,
    kind: TimerKind,
}

/// Pending one-shot and periodic timers, fired in due order by the owner
#[derive(Debug, Default)]
pub struct Scheduler {
    next_id: u64,
    pending: Vec<Entry>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_once(&mut self, due: Duration, kind: TimerKind) -> TimerId {
        self.insert(due, None, kind)
    }

    /// Fire first at `first_due`, then every `period` until cancelled
    pub fn schedule_every(
        &mut self,
        first_due: Duration,
        period: Duration,
        kind: TimerKind,
    ) -> TimerId {
        // a zero period would never let pop_due drain
        let period = period.max(Duration::from_millis(1));
        self.insert(first_due, Some(period), kind)
    }

    fn insert(&mut self, due: Duration, period: Option<Duration>, kind: TimerKind) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.push(Entry {
            id,
            due,
            period,
            kind,
        });
        id
    }

    /// Returns false if the timer already fired or was cancelled
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|e| e.id != id);
        self.pending.len() != before
    }

    pub fn cancel_all(&mut self) {
        self.pending.clear();
    }

    /// Remove and return the earliest timer due at or before `now`.
    /// Ties go to the timer scheduled first. Periodic timers are re-armed
    /// one period after their due time, keeping their id.
    pub fn pop_due(&mut self, now: Duration) -> Option<Fired> {
        let idx = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, e)| e.due <= now)
            .min_by_key(|(_, e)| (e.due, e.id))
            .map(|(idx, _)| idx)?;

        let fired = {
            let entry = &self.pending[idx];
            Fired {
                id: entry.id,
                kind: entry.kind,
                at: entry.due,
            }
        };

        match self.pending[idx].period {
            Some(period) => self.pending[idx].due += period,
            None => {
                self.pending.swap_remove(idx);
            }
        }

        Some(fired)
    }

    pub fn next_due(&self) -> Option<Duration> {
        self.pending.iter().map(|e| e.due).min()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::session::{FingerMode, Phase, Side};

/// What the runner hands to the main loop
#[derive(Clone, Debug)]
pub enum GameEvent {
    Key(KeyEvent),
    Resize,
    Tick,
}

/// What the player asked the session to do
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Tap(Option<Side>),
    Reset,
    Quit,
}

/// Translate a key press into a session command for the given finger mode.
///
/// Space starts from Ready and taps afterwards in one-finger mode;
/// two-finger mode taps with `f`/Left and `j`/Right.
pub fn command_for_key(key: KeyEvent, finger_mode: FingerMode, phase: Phase) -> Option<Command> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Command::Quit);
    }

    match key.code {
        KeyCode::Esc => Some(Command::Quit),
        KeyCode::Char('r') => Some(Command::Reset),
        KeyCode::Enter if phase == Phase::Ready => Some(Command::Start),
        KeyCode::Char(' ') if phase == Phase::Ready => Some(Command::Start),
        KeyCode::Char(' ') if finger_mode == FingerMode::One => Some(Command::Tap(None)),
        KeyCode::Char('f') | KeyCode::Left if finger_mode == FingerMode::Two => {
            Some(Command::Tap(Some(Side::Left)))
        }
        KeyCode::Char('j') | KeyCode::Right if finger_mode == FingerMode::Two => {
            Some(Command::Tap(Some(Side::Right)))
        }
        _ => None,
    }
}

/// Where the runner gets its events from
pub trait GameEventSource {
    /// Next event, or None when nothing arrived within `timeout`
    fn poll(&self, timeout: Duration) -> Option<GameEvent>;
}

/// Events delivered over a channel
pub struct ChannelEventSource {
    rx: Receiver<GameEvent>,
}

impl ChannelEventSource {
    pub fn new(rx: Receiver<GameEvent>) -> Self {
        Self { rx }
    }

    /// Feed the channel from a crossterm reader thread. Only key presses and
    /// resizes are forwarded; the thread stops once the receiver is dropped.
    pub fn terminal() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            while let Ok(ev) = event::read() {
                let ev = match ev {
                    CtEvent::Key(key) if key.kind == KeyEventKind::Press => GameEvent::Key(key),
                    CtEvent::Resize(_, _) => GameEvent::Resize,
                    _ => continue,
                };
                if tx.send(ev).is_err() {
                    break;
                }
            }
        });
        Self::new(rx)
    }
}

impl GameEventSource for ChannelEventSource {
    fn poll(&self, timeout: Duration) -> Option<GameEvent> {
        self.rx.recv_timeout(timeout).ok()
    }
}

/// Pulls one event per step, or a `Tick` once a frame passes without input
pub struct Runner<E: GameEventSource> {
    source: E,
    frame: Duration,
}

impl<E: GameEventSource> Runner<E> {
    pub fn new(source: E, frame: Duration) -> Self {
        Self {
            source,
            frame: frame.max(Duration::from_millis(1)),
        }
    }

    pub fn frame(&self) -> Duration {
        self.frame
    }

    pub fn step(&self) -> GameEvent {
        self.source.poll(self.frame).unwrap_or(GameEvent::Tick)
    }
}

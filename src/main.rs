mod ui;

use chrono::Local;
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use renda::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    logging::init_logging,
    random::{RandomSource, SeededRandom, ThreadRandom},
    record::{LeaderboardKey, Record},
    runtime::{command_for_key, ChannelEventSource, Command, GameEvent, Runner},
    scheduler::{Clock, MonotonicClock},
    store::{MemoryRecordStore, RecordStore, SqliteRecordStore},
    FingerMode, ModeKind, Phase, Session,
};
use std::{
    cell::Cell,
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    rc::Rc,
    time::Duration,
};
use tracing::{info, warn};

/// How often the terminal is polled and redrawn while nothing else happens
const FRAME_MS: u64 = 16;

/// terminal button-mashing game: beat the countdown, not the gun
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A reaction tapping game. Wait for GO, then hammer the button: race to 100 taps in time attack, or tap as often as you can in 10 seconds in tap challenge. Tapping during SET is a false start and costs you."
)]
pub struct Cli {
    /// one center button, or strictly alternating left/right buttons
    #[clap(short = 'f', long, value_enum)]
    fingers: Option<FingerMode>,

    /// time attack (100 taps, fastest wins) or tap challenge (most taps in 10s)
    #[clap(short = 'm', long, value_enum)]
    mode: Option<ModeKind>,

    /// print the best and recent records of the selected board as JSON and exit
    #[clap(long)]
    history: bool,

    /// delete every record of the selected board and exit
    #[clap(long, conflicts_with_all = ["history", "clear_all"])]
    clear: bool,

    /// delete the records of all four boards and exit
    #[clap(long, conflicts_with = "history")]
    clear_all: bool,

    /// seed the "set" delay for reproducible starts
    #[clap(long)]
    seed: Option<u64>,

    /// record database to use instead of the default location
    #[clap(long)]
    db: Option<PathBuf>,

    /// more log output (-v info, -vv debug, -vvv trace)
    #[clap(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Flags override what was saved last time
    fn apply_to(&self, config: &mut Config) {
        if let Some(fingers) = self.fingers {
            config.finger_mode = fingers;
        }
        if let Some(mode) = self.mode {
            config.mode_kind = mode;
        }
    }

    fn random_source(&self) -> Box<dyn RandomSource> {
        match self.seed {
            Some(seed) => Box::new(SeededRandom::new(seed)),
            None => Box::new(ThreadRandom),
        }
    }
}

pub struct App {
    pub session: Session,
    pub store: Box<dyn RecordStore>,
    pub best: Option<Record>,
    pub history: Vec<Record>,
    /// The record saved for the current attempt, if it finished
    pub last_record: Option<Record>,
    pub new_best: bool,
    dirty: Rc<Cell<bool>>,
}

impl App {
    pub fn new(
        config: &Config,
        clock: Box<dyn Clock>,
        random: Box<dyn RandomSource>,
        store: Box<dyn RecordStore>,
    ) -> Self {
        let mut session = Session::with_config(
            config.finger_mode,
            config.mode_kind,
            config.session,
            clock,
            random,
        );

        let dirty = Rc::new(Cell::new(true));
        let flag = Rc::clone(&dirty);
        session.subscribe(move |_| flag.set(true));

        let mut app = Self {
            session,
            store,
            best: None,
            history: Vec::new(),
            last_record: None,
            new_best: false,
            dirty,
        };
        app.refresh_board();
        app
    }

    pub fn board(&self) -> LeaderboardKey {
        LeaderboardKey::new(self.session.finger_mode(), self.session.mode_kind())
    }

    /// Returns false when the player wants to leave
    pub fn apply(&mut self, command: Command) -> bool {
        match command {
            Command::Start => self.session.start_sequence(),
            Command::Tap(side) => {
                self.session.handle_tap(side);
            }
            Command::Reset => {
                self.session.reset();
                self.last_record = None;
                self.new_best = false;
            }
            Command::Quit => return false,
        }
        true
    }

    /// Save the attempt once it has finished
    pub fn sync_results(&mut self) {
        if self.last_record.is_some() || self.session.phase() != Phase::Finished {
            return;
        }
        let Some(record) = self.session.record(Local::now()) else {
            return;
        };

        match self.store.save(self.session.mode_kind(), &record) {
            Ok(best) => {
                self.new_best = best == record;
                info!(value = record.value, new_best = self.new_best, "attempt recorded");
            }
            Err(e) => warn!(error = %e, "could not save record"),
        }
        self.last_record = Some(record);
        self.refresh_board();
        self.dirty.set(true);
    }

    fn refresh_board(&mut self) {
        let key = self.board();
        match (self.store.best(key), self.store.history(key)) {
            (Ok(best), Ok(history)) => {
                self.best = best;
                self.history = history;
            }
            (Err(e), _) | (_, Err(e)) => warn!(board = %key.slug(), error = %e, "could not load board"),
        }
    }

    /// True once since the last call if anything visible changed
    pub fn take_dirty(&self) -> bool {
        self.dirty.replace(false)
    }

    pub fn mark_dirty(&self) {
        self.dirty.set(true);
    }
}

fn open_store(db: Option<&PathBuf>) -> Box<dyn RecordStore> {
    let opened = match db {
        Some(path) => SqliteRecordStore::open(path),
        None => SqliteRecordStore::open_default(),
    };
    match opened {
        Ok(store) => Box::new(store),
        Err(e) => {
            warn!(error = %e, "record database unavailable, results will not be kept");
            Box::new(MemoryRecordStore::new())
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config_store = FileConfigStore::new();
    let mut config = config_store.load();
    cli.apply_to(&mut config);

    if cli.history || cli.clear || cli.clear_all {
        init_logging(cli.verbose, None)?;
        let mut store = open_store(cli.db.as_ref());
        let key = LeaderboardKey::new(config.finger_mode, config.mode_kind);
        if cli.history {
            println!("{}", store.export_json(key)?);
        } else if cli.clear {
            let removed = store.clear_board(key)?;
            println!("removed {removed} records from {}", key.slug());
        } else {
            let removed = store.clear_all()?;
            println!("removed {removed} records");
        }
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    init_logging(cli.verbose, AppDirs::log_path().as_deref())?;
    if let Err(e) = config_store.save(&config) {
        warn!(error = %e, "could not save config");
    }

    let mut app = App::new(
        &config,
        Box::new(MonotonicClock::new()),
        cli.random_source(),
        open_store(cli.db.as_ref()),
    );

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(ChannelEventSource::terminal(), Duration::from_millis(FRAME_MS));

    loop {
        if app.take_dirty() {
            terminal.draw(|f| ui(app, f))?;
        }

        match runner.step() {
            GameEvent::Tick => {
                app.session.pump();
            }
            GameEvent::Resize => {
                app.session.pump();
                app.mark_dirty();
            }
            GameEvent::Key(key) => {
                let command = command_for_key(key, app.session.finger_mode(), app.session.phase());
                if let Some(command) = command {
                    if !app.apply(command) {
                        break;
                    }
                }
            }
        }

        app.sync_results();
    }

    Ok(())
}

fn ui(app: &mut App, f: &mut Frame) {
    f.render_widget(&*app, f.area());
}

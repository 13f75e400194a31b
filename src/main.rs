pub mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use lanetap::{
    analytics::{FeedbackRatings, SessionSummary},
    app_dirs::AppDirs,
    clock::{MonotonicTimeSource, TimeSource},
    config::{Config, ConfigStore, FileConfigStore, SinkKind},
    difficulty::TraversalMode,
    error::{EngineError, SinkError},
    logging,
    runtime::{AppEvent, CrosstermEventSource, EngineInput, FixedTicker, KeyMap, Runner, Ticker},
    session::{ControlEvent, LevelStatus, Session, SessionParams, SessionStatus},
    sink::{CsvSink, EventSink, MemorySink, SessionTag, SqliteSink},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::Duration,
};

const FRAMES_PER_SECOND: u32 = 60;
const MAX_NAME_LEN: usize = 32;
/// Lane keys for layouts other than the default four lanes.
const NUMBER_ROW: &str = "1234567890";

/// timed lane-press reaction exercise with per-level analytics
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Markers fall down lanes towards a judgment line; press the lane key while a marker overlaps the line. Every press, miss and per-level questionnaire is recorded as CSV or SQLite for later analysis."
)]
pub struct Cli {
    /// player name recorded with the session (asked for when absent)
    #[clap(short = 'n', long)]
    name: Option<String>,

    /// play levels slowest first, or in a random order with progress hidden
    #[clap(short = 'm', long, value_enum, default_value_t = TraversalMode::Sequential)]
    mode: TraversalMode,

    /// number of lanes
    #[clap(long)]
    lanes: Option<usize>,

    /// one key per lane, left to right
    #[clap(short = 'k', long)]
    keys: Option<String>,

    /// seconds per level
    #[clap(short = 'd', long)]
    duration: Option<f64>,

    /// number of levels in a session
    #[clap(short = 'l', long)]
    levels: Option<usize>,

    /// marker speed of the first level, in field units per frame
    #[clap(long)]
    base_speed: Option<f64>,

    /// speed added for each further level
    #[clap(long)]
    increment: Option<f64>,

    /// seconds between two markers
    #[clap(long)]
    spawn_interval: Option<f64>,

    /// where session records go
    #[clap(long, value_enum)]
    sink: Option<SinkKind>,

    /// directory for session records and the log file
    #[clap(long)]
    data_dir: Option<PathBuf>,

    /// seed for lane choice and level order, for reproducible runs
    #[clap(long)]
    seed: Option<u64>,

    /// store the resulting settings as the new defaults
    #[clap(long)]
    save_config: bool,
}

impl Cli {
    /// Layers the command line over the stored configuration.
    fn apply(&self, mut config: Config) -> Config {
        let engine = &mut config.engine;
        if let Some(lanes) = self.lanes {
            engine.lanes = lanes;
            if self.keys.is_none() {
                config.lane_keys = default_lane_keys(lanes);
            }
        }
        if let Some(keys) = &self.keys {
            config.lane_keys = keys.clone();
        }
        if let Some(duration) = self.duration {
            engine.level_duration_secs = duration;
        }
        if let Some(levels) = self.levels {
            engine.level_count = levels;
        }
        if let Some(speed) = self.base_speed {
            engine.base_speed = speed;
        }
        if let Some(increment) = self.increment {
            engine.speed_increment = increment;
        }
        if let Some(interval) = self.spawn_interval {
            engine.spawn_interval_secs = interval;
        }
        if self.seed.is_some() {
            engine.seed = self.seed;
        }
        if let Some(sink) = self.sink {
            config.sink = sink;
        }
        if self.data_dir.is_some() {
            config.data_dir = self.data_dir.clone();
        }
        config
    }
}

fn default_lane_keys(lanes: usize) -> String {
    if lanes == 4 {
        Config::default().lane_keys
    } else {
        NUMBER_ROW.chars().take(lanes).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    NameEntry,
    Playing,
    /// Level paused behind a yes/no prompt for a leaving control.
    Confirm(ControlEvent),
    Feedback,
    Results,
}

pub struct App {
    pub config: Config,
    pub mode: TraversalMode,
    pub data_dir: PathBuf,
    pub keymap: KeyMap,
    pub name: String,
    pub state: AppState,
    pub session: Option<Session<Box<dyn EventSink>>>,
    pub answers: Vec<u8>,
    pub summaries: Vec<SessionSummary>,
    pub notice: Option<String>,
    pub should_quit: bool,
    exit_via: Option<ControlEvent>,
    resume_after_confirm: bool,
    time: Box<dyn TimeSource>,
    tick_interval: Duration,
    last_tick: Duration,
}

impl App {
    pub fn new(
        config: Config,
        mode: TraversalMode,
        name: Option<String>,
        data_dir: PathBuf,
        time: Box<dyn TimeSource>,
    ) -> Result<Self, Box<dyn Error>> {
        config.validate()?;
        let keymap = KeyMap::new(&config.lane_keys, config.engine.lanes)?;

        let mut app = Self {
            config,
            mode,
            data_dir,
            keymap,
            name: name.clone().unwrap_or_default(),
            state: AppState::NameEntry,
            session: None,
            answers: Vec::new(),
            summaries: Vec::new(),
            notice: None,
            should_quit: false,
            exit_via: None,
            resume_after_confirm: false,
            time,
            tick_interval: FixedTicker::per_second(FRAMES_PER_SECOND).interval(),
            last_tick: Duration::ZERO,
        };

        if name.is_some_and(|n| !n.trim().is_empty()) {
            app.start_session()?;
        }
        Ok(app)
    }

    fn open_sink(&self, tag: &SessionTag) -> Result<Box<dyn EventSink>, SinkError> {
        let sink: Box<dyn EventSink> = match self.config.sink {
            SinkKind::Csv => Box::new(CsvSink::create(&self.data_dir, tag)?),
            SinkKind::Sqlite => Box::new(SqliteSink::open(AppDirs::db_path(&self.data_dir), tag)?),
        };
        Ok(sink)
    }

    pub fn start_session(&mut self) -> Result<(), EngineError> {
        let params = SessionParams::new(self.name.trim(), self.mode);
        let tag = SessionTag::new(params.player.clone(), self.mode);

        let sink = self.open_sink(&tag).unwrap_or_else(|e| {
            log::error!("cannot open {:?} sink: {}", self.config.sink, e);
            self.notice = Some(format!("records are not being saved: {e}"));
            Box::new(MemorySink::new()) as Box<dyn EventSink>
        });

        let now = self.time.now();
        self.session = Some(Session::new(
            self.config.engine.clone(),
            params,
            sink,
            now,
        )?);
        self.summaries.clear();
        self.answers.clear();
        self.exit_via = None;
        self.last_tick = now;
        self.state = AppState::Playing;
        Ok(())
    }

    fn report_faults(&mut self, faults: Vec<SinkError>) {
        if faults.is_empty() {
            return;
        }
        for fault in &faults {
            log::warn!("record not saved yet: {}", fault);
        }
        self.notice = Some(format!(
            "{} record(s) could not be saved and will be retried",
            faults.len()
        ));
    }

    /// One engine step, at most once per frame interval.
    pub fn on_tick(&mut self) {
        if self.state != AppState::Playing {
            return;
        }
        let now = self.time.now();
        if now.saturating_sub(self.last_tick) < self.tick_interval {
            return;
        }
        self.last_tick = now;

        let Some(session) = self.session.as_mut() else {
            return;
        };
        let report = session.tick(now);
        if report.level_closed {
            self.answers.clear();
            self.state = AppState::Feedback;
        }
        self.report_faults(report.faults);
    }

    pub fn on_key(&mut self, key: KeyEvent) {
        let ctrl_c =
            key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c');

        match self.state {
            AppState::NameEntry => match key.code {
                _ if ctrl_c => self.should_quit = true,
                KeyCode::Esc => self.should_quit = true,
                KeyCode::Enter => {
                    if let Err(e) = self.start_session() {
                        log::error!("session did not start: {}", e);
                        self.notice = Some(e.to_string());
                    }
                }
                KeyCode::Backspace => {
                    self.name.pop();
                }
                KeyCode::Char(c) if !c.is_control() && self.name.chars().count() < MAX_NAME_LEN => {
                    self.name.push(c);
                }
                _ => {}
            },
            AppState::Playing => match self.keymap.decode(&key) {
                Some(EngineInput::Press(lane)) => self.press(lane),
                Some(EngineInput::Control(ControlEvent::PauseToggle)) => {
                    self.control(ControlEvent::PauseToggle)
                }
                // ctrl+c leaves without asking
                Some(EngineInput::Control(event)) if ctrl_c => self.control(event),
                Some(EngineInput::Control(event)) => self.ask_confirmation(event),
                None => {}
            },
            AppState::Confirm(event) => match key.code {
                KeyCode::Char('y') | KeyCode::Enter => self.control(event),
                KeyCode::Char('n') | KeyCode::Esc => {
                    if self.resume_after_confirm {
                        self.control(ControlEvent::PauseToggle);
                    }
                    self.state = AppState::Playing;
                }
                _ => {}
            },
            AppState::Feedback => match key.code {
                KeyCode::Char(c @ '1'..='5') => {
                    self.answers.push(c as u8 - b'0');
                    if self.answers.len() == FeedbackRatings::QUESTIONS.len() {
                        self.submit_feedback();
                    }
                }
                KeyCode::Backspace => {
                    self.answers.pop();
                }
                _ => {}
            },
            AppState::Results => match key.code {
                _ if ctrl_c => self.should_quit = true,
                KeyCode::Char('r') | KeyCode::Enter => {
                    if let Err(e) = self.start_session() {
                        self.notice = Some(e.to_string());
                    }
                }
                KeyCode::Char('m') => self.state = AppState::NameEntry,
                KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
                _ => {}
            },
        }
    }

    fn press(&mut self, lane: usize) {
        let now = self.time.now();
        if let Some(session) = self.session.as_mut() {
            session.press(lane, now);
            let faults = session.take_faults();
            self.report_faults(faults);
        }
    }

    /// Pauses the level while the participant decides.
    fn ask_confirmation(&mut self, event: ControlEvent) {
        let now = self.time.now();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        self.resume_after_confirm = session.level().status() == LevelStatus::Running;
        if self.resume_after_confirm {
            session.control(ControlEvent::PauseToggle, now);
        }
        self.state = AppState::Confirm(event);
    }

    fn control(&mut self, event: ControlEvent) {
        let now = self.time.now();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.control(event, now) {
            SessionStatus::AwaitingFeedback { .. } => {
                self.exit_via = Some(event);
                self.answers.clear();
                self.state = AppState::Feedback;
            }
            SessionStatus::Playing => {
                self.last_tick = now;
                self.state = AppState::Playing;
            }
            SessionStatus::Finished => self.finish_session(),
        }
    }

    fn submit_feedback(&mut self) {
        let now = self.time.now();
        let answers = std::mem::take(&mut self.answers);
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let result = FeedbackRatings::from_answers(&answers)
            .and_then(|ratings| session.submit_feedback(ratings, now));
        let faults = session.take_faults();
        let status = session.status();
        self.report_faults(faults);

        match result {
            Ok(summary) => self.summaries.push(summary),
            Err(e) => {
                log::error!("feedback rejected: {}", e);
                self.notice = Some(e.to_string());
            }
        }

        match status {
            SessionStatus::Playing => {
                self.last_tick = now;
                self.state = AppState::Playing;
            }
            SessionStatus::AwaitingFeedback { .. } => self.state = AppState::Feedback,
            SessionStatus::Finished => self.finish_session(),
        }
    }

    /// Releases the sink and picks the screen for how the session ended.
    fn finish_session(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.finish() {
                log::error!("closing the session sink failed: {}", e);
                self.notice = Some(format!("some records were not saved: {e}"));
            }
        }
        self.state = match self.exit_via.take() {
            Some(ControlEvent::Quit) => {
                self.should_quit = true;
                AppState::Results
            }
            Some(ControlEvent::ReturnToMenu) => AppState::NameEntry,
            _ => AppState::Results,
        };
    }

    /// Leaving mid-level still goes through abandonment before the sink is
    /// flushed.
    pub fn shutdown(&mut self) {
        let now = self.time.now();
        if let Some(session) = self.session.as_mut() {
            if session.status() == SessionStatus::Playing {
                session.control(ControlEvent::Quit, now);
            }
            if matches!(session.status(), SessionStatus::AwaitingFeedback { .. }) {
                log::warn!("session closed before the level feedback was given");
                match session.close_unanswered() {
                    Ok(summary) => self.summaries.push(summary),
                    Err(e) => log::error!("could not close the level: {}", e),
                }
            }
        }
        self.exit_via = Some(ControlEvent::Quit);
        self.finish_session();
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let store = FileConfigStore::new();
    let config = cli.apply(store.load());
    if let Err(e) = config.validate() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::ValueValidation, e).exit();
    }

    let data_dir = AppDirs::resolve(config.data_dir.as_deref());
    logging::init(&AppDirs::log_path(&data_dir))?;
    if cli.save_config {
        store.save(&config)?;
        log::info!("settings saved to {}", store.path().display());
    }

    let mut app = App::new(
        config,
        cli.mode,
        cli.name.clone(),
        data_dir,
        Box::new(MonotonicTimeSource::new()),
    )?;

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app);
    app.shutdown();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::per_second(FRAMES_PER_SECOND),
    );

    terminal.draw(|f| ui(app, f))?;
    while !app.should_quit {
        if let AppEvent::Key(key) = runner.step() {
            app.on_key(key);
        }
        app.on_tick();
        terminal.draw(|f| ui(app, f))?;
    }
    Ok(())
}

fn ui(app: &App, f: &mut Frame) {
    f.render_widget(app, f.area());
}
